//! # Tickbus Core Library
//!
//! Shared foundation for the tickbus trading services.
//!
//! ## Modules
//! - `codec`: Fixed-layout binary frames for orders, order events and book snapshots.
//! - `comms`: Generic ZMQ publish/subscribe transport with an in-process test backend.
//! - `oms`: Order state tracking and the reusable trading engine.
//! - `config`: JSON process configuration shared by every service.
//! - `args`: Standardized argument parsing.
//! - `signal`: POSIX shutdown flag wiring.

pub mod args;
pub mod codec;
pub mod comms;
pub mod config;
pub mod oms;
pub mod signal;
