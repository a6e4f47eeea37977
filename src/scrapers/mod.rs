mod bizquest;
mod dealstream;
mod sba;

pub use bizquest::BizQuestScraper;
pub use dealstream::DealStreamScraper;
pub use sba::SbaFeedScraper;
