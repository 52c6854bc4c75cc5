//! In-memory and file-backed collaborator implementations.

pub mod alert;
pub mod directory;
pub mod notify;
pub mod store;

pub use alert::{InMemoryAlertSink, JsonlAlertSink};
pub use directory::InMemoryDirectory;
pub use notify::{InMemoryOutbox, OutboundMessage};
pub use store::InMemoryStore;
