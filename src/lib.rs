pub mod models;
pub mod scraper;
pub mod storage;
pub mod utils;
