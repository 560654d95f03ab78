//! State-transition monitoring engine.
//!
//! Watches a registered set of product listings and shipment orders,
//! re-resolves their remote state on a schedule, and pushes exactly one
//! notification per meaningful transition: a product flipping back to in
//! stock, or an order status changing at all.
//!
//! The moving parts:
//!
//! - [`WatchRegistry`] holds the live watch set behind async locks.
//! - [`WatchStore`] persists identifiers (never resolved state) with an
//!   atomic rewrite.
//! - [`WatchService`] ties registration, removal, and persistence
//!   together; registration resolves synchronously, so a watch is never
//!   visible half-built.
//! - [`WatchMonitor`] runs a check pass: resolve, commit, decide, notify.
//! - [`Scheduler`] drives passes on a fixed period, first one immediate.

pub mod config;
pub mod entities;
pub mod errors;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::EngineConfig;
pub use entities::{WatchId, WatchedOrder, WatchedProduct};
pub use errors::{EngineError, EngineResult, StoreError};
pub use monitor::{PassSummary, WatchMonitor};
pub use registry::WatchRegistry;
pub use scheduler::Scheduler;
pub use service::WatchService;
pub use store::{OrderKey, WatchFile, WatchStore};
