pub mod scrape;
pub mod clean;
pub mod init;
pub mod stats;
