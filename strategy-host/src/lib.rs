//! # Strategy Host Service
//!
//! Runs exactly one strategy against the bus: book snapshots and position
//! updates come in, orders go out through a local engine wired to the
//! bus-forwarding adapter, and lifecycle events come back through the
//! engine's event tap.
//!
//! ## Modules
//! - `cache`: Last-value store for position and balance snapshots.
//! - `config`: The service's JSON configuration.
//! - `container`: Subscriber threads and strategy-action execution.
//! - `strategies`: Strategy implementations.

pub mod cache;
pub mod config;
pub mod container;
pub mod strategies;
