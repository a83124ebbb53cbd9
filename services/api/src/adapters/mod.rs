pub mod content_llm;
pub mod store;
pub mod telemetry;

pub use content_llm::OpenAiContentAdapter;
pub use store::SqliteStore;
pub use telemetry::LogResultSink;
