pub mod feed;
pub mod wire;

pub use feed::{FeedConfig, FeedFetcher};
