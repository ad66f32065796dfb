//! # Trading Engine Service
//!
//! Runs the reusable engine from `tickbus-core` against a simulated
//! exchange: orders arrive on the order topic, lifecycle events leave on the
//! event topic.
//!
//! ## Modules
//! - `adapter`: Exchange adapters available to this service.
//! - `config`: The service's JSON configuration.

pub mod adapter;
pub mod config;
