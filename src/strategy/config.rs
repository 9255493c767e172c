//! Per-strategy configuration
//!
//! Strategies are configured from a JSON file holding an array of these
//! records. Offsets whose name ends in `_offset` are in ticks; the strategy
//! converts them to price at construction (ES/MES tick = 0.25).

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Ticks per 1.0 of price for ES/MES (0.25 tick size)
pub const TICKS_PER_POINT: f64 = 4.0;

/// Convert a tick-denominated offset to price
pub fn ticks_to_price(ticks: f64) -> f64 {
    ticks / TICKS_PER_POINT
}

/// Inclusive datetime range used for optional entry gating
#[derive(Debug, Clone, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

fn default_true() -> bool {
    true
}

fn default_symbol_size() -> f64 {
    // ES: $50 per 1.0 price move per contract
    50.0
}

/// Configuration for one level-retracement strategy
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Unique name; also the persistence key
    pub name: String,
    /// Ticks above (long) / below (short) a level at which the entry arms
    pub entry_offset: f64,
    /// Take-profit distance from entry, in ticks
    pub take_profit_offset: f64,
    /// Stop-loss distance from entry, in ticks
    pub stop_loss_offset: f64,
    /// Ladder steps beyond the entry level that arm the trailing stop
    pub trail_trigger: usize,
    /// Ladder-index offset to the level whose prior cross arms an entry
    pub re_entry_distance: usize,
    /// Maximum simultaneously open trade units
    pub max_open_trades: usize,
    /// Contracts entered per triggered signal
    pub max_contracts_per_trade: usize,
    /// Dollar value of a 1.0 price move per contract
    #[serde(default = "default_symbol_size")]
    pub symbol_size: f64,
    /// Long-only when true, short-only when false
    #[serde(default = "default_true")]
    pub is_trading_long: bool,
    /// Enforce CME hours (flatten before close, no entries while closed)
    #[serde(default = "default_true")]
    pub use_trading_hours: bool,
    /// Date -> (hour, minute) early closes in Chicago time
    #[serde(default)]
    pub early_close_calendar: HashMap<NaiveDate, (u32, u32)>,
    /// The static level ladder; sorted at load
    pub static_levels: Vec<f64>,
    /// When non-empty, long entries only fire inside these ranges
    #[serde(default)]
    pub long_date_ranges: Vec<DateRange>,
    /// When non-empty, short entries only fire inside these ranges
    #[serde(default)]
    pub short_date_ranges: Vec<DateRange>,
}

/// Load the array of strategy configs from a JSON file
pub fn load_strategy_configs(path: &Path) -> Result<Vec<StrategyConfig>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read strategy config {}", path.display()))?;
    let configs: Vec<StrategyConfig> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse strategy config {}", path.display()))?;
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_conversion() {
        assert_eq!(ticks_to_price(4.0), 1.0);
        assert_eq!(ticks_to_price(40.0), 10.0);
        assert_eq!(ticks_to_price(100.0), 25.0);
    }

    #[test]
    fn parses_minimal_config() {
        let json = r#"[{
            "name": "Swing Long",
            "entry_offset": 8,
            "take_profit_offset": 40,
            "stop_loss_offset": 100,
            "trail_trigger": 2,
            "re_entry_distance": 2,
            "max_open_trades": 3,
            "max_contracts_per_trade": 3,
            "static_levels": [4945, 5003.5, 5062]
        }]"#;
        let configs: Vec<StrategyConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(configs.len(), 1);
        let cfg = &configs[0];
        assert_eq!(cfg.name, "Swing Long");
        assert!(cfg.is_trading_long);
        assert!(cfg.use_trading_hours);
        assert_eq!(cfg.symbol_size, 50.0);
        assert!(cfg.long_date_ranges.is_empty());
    }

    #[test]
    fn parses_calendar_and_ranges() {
        let json = r#"[{
            "name": "Short Scalper",
            "entry_offset": 4,
            "take_profit_offset": 40,
            "stop_loss_offset": 20,
            "trail_trigger": 2,
            "re_entry_distance": 1,
            "max_open_trades": 1,
            "max_contracts_per_trade": 1,
            "symbol_size": 5,
            "is_trading_long": false,
            "early_close_calendar": {"2024-11-29": [12, 15]},
            "static_levels": [100, 105, 110],
            "short_date_ranges": [
                {"start": "2024-01-01T00:00:00", "end": "2024-06-30T23:59:59"}
            ]
        }]"#;
        let configs: Vec<StrategyConfig> = serde_json::from_str(json).unwrap();
        let cfg = &configs[0];
        assert!(!cfg.is_trading_long);
        let date = NaiveDate::from_ymd_opt(2024, 11, 29).unwrap();
        assert_eq!(cfg.early_close_calendar.get(&date), Some(&(12, 15)));
        let inside = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert!(cfg.short_date_ranges[0].contains(inside));
        let outside = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert!(!cfg.short_date_ranges[0].contains(outside));
    }
}
