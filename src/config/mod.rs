//! Configuration models for the dispatch engine.

pub mod dispatch;

pub use dispatch::{DispatchConfig, OfferLifetimeConfig, RankingWeights, WindowConfig};
