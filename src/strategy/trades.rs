//! Trade records for the level-retracement strategy

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of an open trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Long,
    Short,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => write!(f, "LONG"),
            TradeSide::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LONG" => Ok(TradeSide::Long),
            "SHORT" => Ok(TradeSide::Short),
            other => Err(format!("unknown trade side: {other}")),
        }
    }
}

/// Kind of a trade-history event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    /// Long entry
    Buy,
    /// Short entry
    Sell,
    /// Stop, trailing-stop or take-profit exit
    Exit,
    /// Forced close ahead of the daily halt
    Flatten,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "BUY"),
            TradeKind::Sell => write!(f, "SELL"),
            TradeKind::Exit => write!(f, "EXIT"),
            TradeKind::Flatten => write!(f, "FLATTEN"),
        }
    }
}

impl FromStr for TradeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TradeKind::Buy),
            "SELL" => Ok(TradeKind::Sell),
            "EXIT" => Ok(TradeKind::Exit),
            "FLATTEN" => Ok(TradeKind::Flatten),
            other => Err(format!("unknown trade kind: {other}")),
        }
    }
}

/// An open position unit owned by one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrade {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    /// Fixed stop on the losing side of the entry
    pub stop_level: f64,
    /// Armed lazily once price clears the trail-trigger level
    pub trailing_stop: Option<f64>,
    /// The ladder level whose retrace triggered this entry
    pub triggering_level: f64,
    /// Target on the winning side of the entry
    pub take_profit_level: f64,
    pub side: TradeSide,
}

impl OpenTrade {
    /// Side implied by the price geometry. The explicit `side` field is
    /// authoritative; this is asserted against it at entry and checked on
    /// restore from storage.
    pub fn implied_side(&self) -> TradeSide {
        if self.entry_price < self.take_profit_level {
            TradeSide::Long
        } else {
            TradeSide::Short
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == TradeSide::Long
    }
}

/// One row of the append-only per-strategy trade history
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub time: NaiveDateTime,
    pub kind: TradeKind,
    pub price: f64,
    /// Realized pnl; zero for entry records
    pub pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn implied_side_matches_geometry() {
        let long = OpenTrade {
            entry_time: t0(),
            entry_price: 500.0,
            stop_level: 495.0,
            trailing_stop: None,
            triggering_level: 500.0,
            take_profit_level: 510.0,
            side: TradeSide::Long,
        };
        assert_eq!(long.implied_side(), TradeSide::Long);
        assert!(long.is_long());

        let short = OpenTrade {
            entry_price: 500.0,
            stop_level: 505.0,
            take_profit_level: 490.0,
            side: TradeSide::Short,
            ..long
        };
        assert_eq!(short.implied_side(), TradeSide::Short);
    }

    #[test]
    fn kind_round_trips_through_string() {
        for kind in [TradeKind::Buy, TradeKind::Sell, TradeKind::Exit, TradeKind::Flatten] {
            assert_eq!(kind.to_string().parse::<TradeKind>().unwrap(), kind);
        }
        assert!("HOLD".parse::<TradeKind>().is_err());
    }

    #[test]
    fn side_round_trips_through_string() {
        for side in [TradeSide::Long, TradeSide::Short] {
            assert_eq!(side.to_string().parse::<TradeSide>().unwrap(), side);
        }
        assert!("FLAT".parse::<TradeSide>().is_err());
    }
}
