pub mod client;
pub mod context;
pub mod payload;
pub mod scanner;
