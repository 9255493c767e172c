//! Level-retracement strategy
//!
//! Components of the per-strategy state machine:
//! - Static-level ladder with retrace annotations
//! - Open-trade and history records
//! - Per-strategy configuration
//! - The bar-driven state machine itself

pub mod config;
pub mod ladder;
pub mod machine;
pub mod trades;

// Re-export commonly used types
pub use config::{load_strategy_configs, ticks_to_price, DateRange, StrategyConfig, TICKS_PER_POINT};
pub use ladder::{CrossDirection, LevelLadder};
pub use machine::{Strategy, StrategyError, StrategyState, SummaryStats};
pub use trades::{OpenTrade, TradeKind, TradeRecord, TradeSide};
