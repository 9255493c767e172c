// Library crate - exports shared types and the trading engine core

pub mod api;
pub mod broker;
pub mod dispatcher;
pub mod hours;
pub mod store;
pub mod strategy;
pub mod tradovate;
pub mod types;

// Re-export commonly used types
pub use broker::{BrokerAdapter, NoopBroker};
pub use dispatcher::BarDispatcher;
pub use hours::{CmeTradingHours, MarketStatus};
pub use store::StateStore;
pub use strategy::{Strategy, StrategyConfig, StrategyError};
pub use types::{AppState, Bar};
