pub mod bot;
pub mod chains;
pub mod cli;
pub mod config;
pub mod core;
pub mod market;
pub mod storage;
pub mod telegram;
pub mod utils;
pub mod watch;
