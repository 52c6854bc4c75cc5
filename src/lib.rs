//! # Prometheus Dispatch
//!
//! Offer dispatch engine for a gig-work marketplace.
//!
//! A job that needs a driver is offered to exactly one candidate at a time.
//! The candidate answers through a signed deep link (or by replying from their
//! registered contact handle). Declines and expiries cascade to the next best
//! candidate until someone accepts or the pool is exhausted, at which point an
//! administrator is alerted.
//!
//! ## Guarantees
//!
//! - At most one `sent` offer per job at any moment
//! - At most one booking per job, and no overlapping bookings per driver
//! - Concurrent accepts for the same job produce a single winner
//! - Integration failures (notifications, dispatch sync) never undo a
//!   committed acceptance
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use prometheus_dispatch::builders::EngineBuilder;
//! use prometheus_dispatch::config::DispatchConfig;
//! use prometheus_dispatch::core::OfferAction;
//! use prometheus_dispatch::infra::{InMemoryAlertSink, InMemoryDirectory, InMemoryOutbox, InMemoryStore};
//!
//! let engine = EngineBuilder::new(DispatchConfig::from_env()?)
//!     .with_store(Arc::new(InMemoryStore::new()))
//!     .with_directory(Arc::new(InMemoryDirectory::new()))
//!     .with_notifier(Arc::new(InMemoryOutbox::new()))
//!     .with_alerts(Arc::new(InMemoryAlertSink::new()))
//!     .build()?;
//!
//! engine.create_offer(&job_id).await?;
//! let response = engine.respond_to_offer(&token, OfferAction::Accept).await?;
//! ```
//!
//! Periodic expiry runs through [`runtime::sweeper::spawn_expiry_sweeper`]
//! when the `tokio-runtime` feature is enabled.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Dispatch domain: offers, cascade, acceptance, expiry and reassignment.
pub mod core;
/// Engine configuration.
pub mod config;
/// Builders that assemble an engine from configuration and collaborators.
pub mod builders;
/// In-memory and file-backed collaborator implementations.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
