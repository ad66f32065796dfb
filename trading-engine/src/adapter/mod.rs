//! Exchange adapters available to the engine service.

pub mod sim;

pub use self::sim::{SimAdapter, SimAdapterConfig};
