mod paper;

pub use paper::{Author, Paper};
