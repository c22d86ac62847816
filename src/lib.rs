pub mod bruinwalk;
pub mod catalog;
pub mod checkpoint;
pub mod crawl;
pub mod data;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod paginate;
pub mod review;
pub mod sentiment;

pub use data::{Dataset, ReviewRecord};
pub use error::CrawlerError;
