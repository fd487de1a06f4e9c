pub mod chain;
pub mod chat;
pub mod dictionary;
pub mod market;
pub mod scanner;
pub mod storage;
pub mod table;
pub mod types;
