pub mod config;
pub mod error;
pub mod models;
pub mod queries;
pub mod storage;

pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use models::{Author, Paper};
pub use queries::{Example, Prompt, QueryEntry, QueryRegistry};
pub use storage::cards::{card_path, list_card_paths, load_card, save_card};
pub use storage::run_log::{NewRun, RunStore};
