pub mod adapter;
pub mod strategy;

pub use adapter::ExchangeAdapter;
pub use strategy::{OrderAction, Strategy};
