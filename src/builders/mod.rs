//! Builders that assemble an engine from configuration and collaborators.

pub mod engine_builder;

pub use engine_builder::EngineBuilder;
