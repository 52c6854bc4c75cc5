//! Runtime adapters and API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod sweeper;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{handle, DispatchRequest, DispatchResponse};
#[cfg(feature = "tokio-runtime")]
pub use sweeper::{spawn_expiry_sweeper, SweeperHandle};
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::{Spawn, TokioSpawner};
