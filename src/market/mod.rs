pub mod feed;
pub mod ticker;
