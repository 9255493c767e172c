//! Tradovate REST integration
//!
//! Token lifecycle management and the broker adapter implementation used in
//! live trading. The strategy only ever sees the `BrokerAdapter` trait.

pub mod client;
pub mod models;

pub use client::{TokenManager, TradovateBroker, TradovateConfig};
