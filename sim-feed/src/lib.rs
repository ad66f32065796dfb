//! # Simulated Feed Service
//!
//! Publishes synthetic order book snapshots on the market-data topic and a
//! position snapshot every few books on the position topic. Strategies built
//! against it run unchanged against a real feed.
//!
//! ## Modules
//! - `config`: The service's JSON configuration.
//! - `sim`: Random-walk book and position generators.

pub mod config;
pub mod sim;
