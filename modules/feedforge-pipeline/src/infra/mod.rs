//! Production adapters behind the orchestrator's trait seams.

pub mod ai;
pub mod publisher;
pub mod source;
pub mod store;

pub use ai::OpenAiService;
pub use publisher::FilePublisher;
pub use source::JsonFileSource;
pub use store::PgStore;
