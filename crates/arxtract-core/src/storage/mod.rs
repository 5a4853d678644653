pub mod cards;
pub mod run_log;
