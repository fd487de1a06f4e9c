pub mod aggregator;
pub mod dispatcher;
pub mod governance;
pub mod state;
