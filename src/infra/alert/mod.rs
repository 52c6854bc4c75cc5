//! Administrative alert sinks.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlAlertSink;
pub use memory::InMemoryAlertSink;
