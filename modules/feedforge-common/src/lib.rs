pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, PipelineConfig};
pub use error::PipelineError;
pub use types::*;
