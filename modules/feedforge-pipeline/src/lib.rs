pub mod dedup;
pub mod grouper;
pub mod infra;
pub mod novelty;
pub mod orchestrator;
pub mod prompts;
pub mod similarity;
pub mod stats;
pub mod traits;
pub mod validator;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use orchestrator::Orchestrator;
