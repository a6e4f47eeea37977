use anyhow::Result;
use rand::prelude::*;
use reqwest::{header, Client};
use std::time::Duration;

/// Pool of desktop user agents rotated across sessions to avoid looking like
/// a single automated client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Pick a random user agent from the pool.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Sleep for a random duration within `[min_ms, max_ms]`, imitating a human
/// pause between navigations.
pub async fn human_delay(min_ms: u64, max_ms: u64) {
    let ms = rand::rng().random_range(min_ms..=max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Creates an HTTP client configured to look like a real browser session.
///
/// Cookie storage is enabled so a warm-up request against the site's home
/// page primes the session the way a browser visit would.
pub fn create_http_client(user_agent: &str) -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        header::ACCEPT_ENCODING,
        header::HeaderValue::from_static("gzip, deflate, br"),
    );
    headers.insert(header::DNT, header::HeaderValue::from_static("1"));
    headers.insert(
        header::CONNECTION,
        header::HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        "Upgrade-Insecure-Requests",
        header::HeaderValue::from_static("1"),
    );
    headers.insert(
        "Sec-Fetch-Dest",
        header::HeaderValue::from_static("document"),
    );
    headers.insert(
        "Sec-Fetch-Mode",
        header::HeaderValue::from_static("navigate"),
    );
    headers.insert("Sec-Fetch-Site", header::HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", header::HeaderValue::from_static("?1"));
    headers.insert(
        "Cache-Control",
        header::HeaderValue::from_static("max-age=0"),
    );

    let client = Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_secs(30))
        .build()?;

    Ok(client)
}

/// Prime the session by visiting the site's home page before the target
/// page, collecting whatever cookies the site hands out. Failures are
/// non-fatal; the target request may still succeed without the warm-up.
pub async fn warm_up(client: &Client, base_url: &str) {
    match client.get(base_url).send().await {
        Ok(response) => {
            tracing::debug!("Warm-up request to {} returned {}", base_url, response.status());
        }
        Err(e) => {
            tracing::debug!("Warm-up request to {} failed: {}", base_url, e);
        }
    }
}
