pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{EnrichError, ExtractFailure};
pub use types::*;
