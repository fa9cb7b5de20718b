pub mod names;
pub mod parser;
pub mod scraper;
pub mod types;
pub mod utils;

pub use parser::ParseError;
pub use scraper::{ScraperError, WebScraper};
