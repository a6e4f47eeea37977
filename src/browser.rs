use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;

use crate::errors::EngineError;
use crate::http_client;

/// Headless-Chromium session for sources that only render listings
/// client-side.
///
/// The session is a scoped resource: one adapter run launches it, fetches,
/// and must call [`BrowserSession::close`] on every exit path so no Chromium
/// process outlives the run.
pub struct BrowserSession {
    browser: Browser,
    timeout: Duration,
}

impl BrowserSession {
    pub async fn launch(timeout: Duration) -> Result<Self, EngineError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080);

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--lang=en-US")
            .arg("--no-first-run")
            .build()
            .map_err(|e| EngineError::Fetch(format!("browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::Fetch(format!("failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self { browser, timeout })
    }

    /// Fetch the fully-rendered HTML for `url`.
    ///
    /// Navigation happens with a randomized user agent and a human-like
    /// pre-navigation pause. Content readiness is detected by trying each
    /// CSS selector in `wait_selectors` in priority order; if none matches
    /// within the budget the page gets a grace delay and we take whatever
    /// has rendered. Incremental scrolling triggers lazy-loaded content
    /// before the DOM is captured.
    pub async fn fetch_rendered(
        &self,
        url: &str,
        wait_selectors: &[&str],
    ) -> Result<String, EngineError> {
        let result = tokio::time::timeout(self.timeout, async {
            http_client::human_delay(1000, 3000).await;

            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| EngineError::Fetch(format!("failed to open page: {e}")))?;

            page.enable_stealth_mode()
                .await
                .map_err(|e| EngineError::Fetch(format!("failed to enable stealth mode: {e}")))?;

            page.set_user_agent(http_client::random_user_agent())
                .await
                .map_err(|e| EngineError::Fetch(format!("failed to set user agent: {e}")))?;

            page.goto(url)
                .await
                .map_err(|e| EngineError::Fetch(format!("failed to navigate to {url}: {e}")))?;

            let _ = page.wait_for_navigation().await;

            if !self.wait_for_any_selector(&page, wait_selectors).await {
                tracing::warn!(
                    "No readiness selector matched on {}, proceeding after grace delay",
                    url
                );
                tokio::time::sleep(Duration::from_secs(5)).await;
            }

            // Scroll gradually so lazy-loaded cards below the fold render too.
            for _ in 0..3 {
                let _ = page.evaluate("window.scrollBy(0, 1000)").await;
                http_client::human_delay(1000, 2000).await;
            }

            let html = page
                .content()
                .await
                .map_err(|e| EngineError::Fetch(format!("failed to read page content: {e}")))?;

            let _ = page.close().await;

            Ok::<String, EngineError>(html)
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(EngineError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Poll the selector candidates in priority order until one matches or
    /// the readiness budget runs out. Returns whether any matched.
    async fn wait_for_any_selector(&self, page: &chromiumoxide::Page, selectors: &[&str]) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);

        while tokio::time::Instant::now() < deadline {
            for selector in selectors {
                if page.find_element(*selector).await.is_ok() {
                    tracing::debug!("Content ready, matched selector: {}", selector);
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        false
    }

    /// Shut the Chromium process down. Must run on every exit path of an
    /// adapter, including after fetch errors.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
        let _ = self.browser.wait().await;
    }

    /// Locate a usable Chrome/Chromium binary.
    ///
    /// Snap-packaged Chromium exposes a wrapper that rejects standard Chrome
    /// CLI flags, so the real binary buried inside the snap is preferred.
    /// `CHROME_BIN` overrides everything; if nothing is found chromiumoxide
    /// does its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}
