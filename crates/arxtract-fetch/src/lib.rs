pub mod error;
pub mod feed;
pub mod fetcher;
pub mod http;
pub mod ledger;
pub mod store;

pub use error::{FetchError, Result};
pub use fetcher::IncrementalFetcher;
pub use http::RateLimitedClient;
pub use ledger::FetchLedger;
pub use store::{DocumentStore, relocate};
