//! Durable strategy state
//!
//! SQLite persistence for everything a strategy must recover after a crash:
//! scalar bookkeeping, append-only trade history and cumulative pnl,
//! replace-on-write open trades and retrace annotations, and the write-once
//! static levels. One connection guarded by a mutex; every save is a single
//! transaction that rolls back wholesale on error.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::strategy::{
    CrossDirection, OpenTrade, StrategyState, TradeKind, TradeRecord, TradeSide,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS strategy_state (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_name TEXT UNIQUE NOT NULL,
    current_cash_value REAL,
    open_trade_count INTEGER,
    total_pnl REAL,
    price REAL,
    last_price REAL,
    high_price REAL,
    low_price REAL,
    last_index TEXT,
    winrate REAL,
    avg_winner REAL,
    avg_loser REAL,
    total_trade INTEGER,
    reward_to_risk REAL,
    max_losing_streak INTEGER,
    last_entry_time TEXT,
    entries_this_bar TEXT,
    last_bar_index TEXT,
    last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS trade_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_name TEXT NOT NULL,
    trade_index TEXT NOT NULL,
    trade_type TEXT NOT NULL,
    price REAL NOT NULL,
    pnl REAL NOT NULL,
    FOREIGN KEY (strategy_name) REFERENCES strategy_state(strategy_name)
);

CREATE TABLE IF NOT EXISTS open_trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_name TEXT NOT NULL,
    trade_time TEXT NOT NULL,
    entry_price REAL NOT NULL,
    stop_level REAL NOT NULL,
    trailing_stop REAL,
    traded_level REAL NOT NULL,
    take_profit_level REAL NOT NULL,
    side TEXT NOT NULL,
    FOREIGN KEY (strategy_name) REFERENCES strategy_state(strategy_name)
);

CREATE TABLE IF NOT EXISTS retrace_levels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_name TEXT NOT NULL,
    level_index INTEGER NOT NULL,
    direction TEXT,
    FOREIGN KEY (strategy_name) REFERENCES strategy_state(strategy_name),
    UNIQUE(strategy_name, level_index)
);

CREATE TABLE IF NOT EXISTS cumulative_pnl (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_name TEXT NOT NULL,
    sequence_number INTEGER NOT NULL,
    pnl_value REAL NOT NULL,
    FOREIGN KEY (strategy_name) REFERENCES strategy_state(strategy_name)
);

CREATE TABLE IF NOT EXISTS static_levels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_name TEXT NOT NULL,
    level_value REAL NOT NULL,
    level_index INTEGER NOT NULL,
    FOREIGN KEY (strategy_name) REFERENCES strategy_state(strategy_name),
    UNIQUE(strategy_name, level_index)
);
";

/// Canonical storage format for timestamps (microsecond precision)
pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Lenient parser accepting the formats the store has ever written
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_optional_timestamp(value: Option<String>, column: &str) -> Result<Option<NaiveDateTime>> {
    match value {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| anyhow!("unparseable {column} timestamp: {s}")),
    }
}

/// Mutex-guarded SQLite store for per-strategy state
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open state database {}", path.display()))?;
        conn.execute_batch(SCHEMA)
            .context("failed to initialize state database schema")?;
        info!("state database initialized at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.execute_batch(SCHEMA)
            .context("failed to initialize state database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist a full strategy snapshot in one transaction
    pub fn save(&self, name: &str, state: &StrategyState) -> Result<()> {
        match self.save_inner(name, state) {
            Ok(()) => {
                debug!("saved state for strategy {name}");
                Ok(())
            }
            Err(e) => {
                error!("failed to save strategy state for {name}: {e:#}");
                Err(e)
            }
        }
    }

    fn save_inner(&self, name: &str, state: &StrategyState) -> Result<()> {
        let mut conn = self.conn.lock().expect("state store mutex poisoned");
        let tx = conn.transaction()?;

        let entries_json = serde_json::to_string(&state.entries_this_bar)
            .context("failed to encode entries_this_bar")?;

        tx.execute(
            "INSERT OR REPLACE INTO strategy_state
             (strategy_name, current_cash_value, open_trade_count, total_pnl,
              price, last_price, high_price, low_price, last_index,
              winrate, avg_winner, avg_loser, total_trade, reward_to_risk,
              max_losing_streak, last_entry_time, entries_this_bar, last_bar_index,
              last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, CURRENT_TIMESTAMP)",
            params![
                name,
                state.current_cash_value,
                state.open_trade_count as i64,
                state.total_pnl,
                state.price,
                state.last_price,
                state.high_price,
                state.low_price,
                state.bar_time.as_ref().map(format_timestamp),
                state.stats.winrate,
                state.stats.avg_winner,
                state.stats.avg_loser,
                state.stats.total_trades,
                state.stats.reward_to_risk,
                state.stats.max_losing_streak,
                state.last_entry_time.as_ref().map(format_timestamp),
                entries_json,
                state.last_bar_index.as_ref().map(format_timestamp),
            ],
        )?;

        // Trade history is append-only: insert only the suffix past what is
        // already stored.
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM trade_history WHERE strategy_name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        let new_trades = state
            .trade_history
            .get(existing as usize..)
            .unwrap_or_default();
        for record in new_trades {
            tx.execute(
                "INSERT INTO trade_history (strategy_name, trade_index, trade_type, price, pnl)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    format_timestamp(&record.time),
                    record.kind.to_string(),
                    record.price,
                    record.pnl
                ],
            )?;
        }

        // Open trades are replaced wholesale
        tx.execute(
            "DELETE FROM open_trades WHERE strategy_name = ?1",
            params![name],
        )?;
        for trade in &state.open_trade_list {
            tx.execute(
                "INSERT INTO open_trades
                 (strategy_name, trade_time, entry_price, stop_level,
                  trailing_stop, traded_level, take_profit_level, side)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    name,
                    format_timestamp(&trade.entry_time),
                    trade.entry_price,
                    trade.stop_level,
                    trade.trailing_stop,
                    trade.triggering_level,
                    trade.take_profit_level,
                    trade.side.to_string()
                ],
            )?;
        }

        for (idx, annotation) in state.retrace_annotations.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO retrace_levels (strategy_name, level_index, direction)
                 VALUES (?1, ?2, ?3)",
                params![name, idx as i64, annotation.map(|d| d.to_string())],
            )?;
        }

        let existing_pnl: i64 = tx.query_row(
            "SELECT COUNT(*) FROM cumulative_pnl WHERE strategy_name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        for (seq, value) in state
            .cumulative_pnl
            .iter()
            .enumerate()
            .skip(existing_pnl as usize)
        {
            tx.execute(
                "INSERT INTO cumulative_pnl (strategy_name, sequence_number, pnl_value)
                 VALUES (?1, ?2, ?3)",
                params![name, seq as i64, value],
            )?;
        }

        // Static levels are immutable after the first save
        if !state.static_levels.is_empty() {
            let existing_levels: i64 = tx.query_row(
                "SELECT COUNT(*) FROM static_levels WHERE strategy_name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            if existing_levels == 0 {
                for (idx, level) in state.static_levels.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO static_levels (strategy_name, level_value, level_index)
                         VALUES (?1, ?2, ?3)",
                        params![name, level, idx as i64],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Load the full state for a strategy, or None when it was never saved
    pub fn load(&self, name: &str) -> Result<Option<StrategyState>> {
        let conn = self.conn.lock().expect("state store mutex poisoned");

        struct ScalarRow {
            current_cash_value: f64,
            open_trade_count: i64,
            total_pnl: f64,
            price: Option<f64>,
            last_price: Option<f64>,
            high_price: Option<f64>,
            low_price: Option<f64>,
            last_index: Option<String>,
            winrate: f64,
            avg_winner: f64,
            avg_loser: f64,
            total_trade: i64,
            reward_to_risk: f64,
            max_losing_streak: i64,
            last_entry_time: Option<String>,
            entries_this_bar: Option<String>,
            last_bar_index: Option<String>,
        }

        let scalar = conn
            .query_row(
                "SELECT current_cash_value, open_trade_count, total_pnl,
                        price, last_price, high_price, low_price, last_index,
                        winrate, avg_winner, avg_loser, total_trade,
                        reward_to_risk, max_losing_streak,
                        last_entry_time, entries_this_bar, last_bar_index
                 FROM strategy_state WHERE strategy_name = ?1",
                params![name],
                |row| {
                    Ok(ScalarRow {
                        current_cash_value: row.get(0)?,
                        open_trade_count: row.get(1)?,
                        total_pnl: row.get(2)?,
                        price: row.get(3)?,
                        last_price: row.get(4)?,
                        high_price: row.get(5)?,
                        low_price: row.get(6)?,
                        last_index: row.get(7)?,
                        winrate: row.get(8)?,
                        avg_winner: row.get(9)?,
                        avg_loser: row.get(10)?,
                        total_trade: row.get(11)?,
                        reward_to_risk: row.get(12)?,
                        max_losing_streak: row.get(13)?,
                        last_entry_time: row.get(14)?,
                        entries_this_bar: row.get(15)?,
                        last_bar_index: row.get(16)?,
                    })
                },
            )
            .optional()?;

        let Some(scalar) = scalar else {
            info!("no saved state found for strategy {name}");
            return Ok(None);
        };

        let mut state = StrategyState {
            current_cash_value: scalar.current_cash_value,
            open_trade_count: scalar.open_trade_count.max(0) as usize,
            total_pnl: scalar.total_pnl,
            price: scalar.price,
            last_price: scalar.last_price,
            high_price: scalar.high_price,
            low_price: scalar.low_price,
            bar_time: parse_optional_timestamp(scalar.last_index, "last_index")?,
            last_entry_time: parse_optional_timestamp(scalar.last_entry_time, "last_entry_time")?,
            last_bar_index: parse_optional_timestamp(scalar.last_bar_index, "last_bar_index")?,
            ..Default::default()
        };
        state.stats.winrate = scalar.winrate;
        state.stats.avg_winner = scalar.avg_winner;
        state.stats.avg_loser = scalar.avg_loser;
        state.stats.total_trades = scalar.total_trade;
        state.stats.reward_to_risk = scalar.reward_to_risk;
        state.stats.max_losing_streak = scalar.max_losing_streak;
        state.entries_this_bar = match scalar.entries_this_bar {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(&raw).context("failed to decode entries_this_bar")?
            }
            _ => Vec::new(),
        };

        let mut stmt = conn.prepare(
            "SELECT trade_index, trade_type, price, pnl
             FROM trade_history WHERE strategy_name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        for row in rows {
            let (time, kind, price, pnl) = row?;
            let time = parse_timestamp(&time)
                .ok_or_else(|| anyhow!("unparseable trade_history timestamp: {time}"))?;
            let kind = kind.parse::<TradeKind>().map_err(anyhow::Error::msg)?;
            state.trade_history.push(TradeRecord {
                time,
                kind,
                price,
                pnl,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT trade_time, entry_price, stop_level, trailing_stop,
                    traded_level, take_profit_level, side
             FROM open_trades WHERE strategy_name = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        for row in rows {
            let (time, entry_price, stop_level, trailing_stop, traded_level, take_profit_level, side) =
                row?;
            let entry_time = parse_timestamp(&time)
                .ok_or_else(|| anyhow!("unparseable open_trades timestamp: {time}"))?;
            let side = side.parse::<TradeSide>().map_err(anyhow::Error::msg)?;
            let trade = OpenTrade {
                entry_time,
                entry_price,
                stop_level,
                trailing_stop,
                triggering_level: traded_level,
                take_profit_level,
                side,
            };
            // The stored side is authoritative; the price-geometry inference
            // must agree with it after a restore.
            if trade.implied_side() != trade.side {
                warn!(
                    "open trade for {name} stored as {} but priced as {} (entry {}, target {}); keeping stored side",
                    trade.side,
                    trade.implied_side(),
                    trade.entry_price,
                    trade.take_profit_level
                );
            }
            state.open_trade_list.push(trade);
        }

        let mut stmt = conn.prepare(
            "SELECT level_index, direction
             FROM retrace_levels WHERE strategy_name = ?1 ORDER BY level_index",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        let mut annotations: Vec<(usize, Option<CrossDirection>)> = Vec::new();
        for row in rows {
            let (idx, direction) = row?;
            let direction = direction
                .map(|d| d.parse::<CrossDirection>().map_err(anyhow::Error::msg))
                .transpose()?;
            annotations.push((idx.max(0) as usize, direction));
        }
        let len = annotations.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        state.retrace_annotations = vec![None; len];
        for (idx, direction) in annotations {
            state.retrace_annotations[idx] = direction;
        }

        let mut stmt = conn.prepare(
            "SELECT pnl_value
             FROM cumulative_pnl WHERE strategy_name = ?1 ORDER BY sequence_number",
        )?;
        let rows = stmt.query_map(params![name], |row| row.get::<_, f64>(0))?;
        for row in rows {
            state.cumulative_pnl.push(row?);
        }

        let mut stmt = conn.prepare(
            "SELECT level_value
             FROM static_levels WHERE strategy_name = ?1 ORDER BY level_index",
        )?;
        let rows = stmt.query_map(params![name], |row| row.get::<_, f64>(0))?;
        for row in rows {
            state.static_levels.push(row?);
        }

        debug!(
            "loaded state for strategy {name}: {} history rows, {} open trades, {} pnl values",
            state.trade_history.len(),
            state.open_trade_list.len(),
            state.cumulative_pnl.len()
        );
        Ok(Some(state))
    }

    /// Remove every row belonging to a strategy
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("state store mutex poisoned");
        let tx = conn.transaction()?;
        for table in [
            "trade_history",
            "open_trades",
            "retrace_levels",
            "cumulative_pnl",
            "static_levels",
            "strategy_state",
        ] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE strategy_name = ?1"),
                params![name],
            )?;
        }
        tx.commit()?;
        info!("deleted state for strategy {name}");
        Ok(())
    }

    /// Names of every stored strategy, in first-save order
    pub fn list(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("state store mutex poisoned");
        let mut stmt = conn.prepare("SELECT strategy_name FROM strategy_state ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Wall-clock timestamp of the last save for a strategy
    pub fn last_update_time(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("state store mutex poisoned");
        let row = conn
            .query_row(
                "SELECT last_updated FROM strategy_state WHERE strategy_name = ?1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SummaryStats;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample_state() -> StrategyState {
        StrategyState {
            current_cash_value: -2500.0,
            open_trade_count: 1,
            total_pnl: 550.0,
            price: Some(511.0),
            last_price: Some(500.0),
            high_price: Some(511.5),
            low_price: Some(500.0),
            bar_time: Some(ts(11, 0)),
            stats: SummaryStats {
                winrate: 100.0,
                avg_winner: 550.0,
                avg_loser: 0.0,
                total_trades: 1,
                reward_to_risk: 550.0,
                max_losing_streak: 0,
            },
            trade_history: vec![
                TradeRecord {
                    time: ts(10, 30),
                    kind: TradeKind::Buy,
                    price: 500.0,
                    pnl: 0.0,
                },
                TradeRecord {
                    time: ts(11, 0),
                    kind: TradeKind::Exit,
                    price: 511.0,
                    pnl: 550.0,
                },
            ],
            open_trade_list: vec![OpenTrade {
                entry_time: ts(10, 45),
                entry_price: 505.0,
                stop_level: 500.0,
                trailing_stop: Some(510.0),
                triggering_level: 505.0,
                take_profit_level: 515.0,
                side: TradeSide::Long,
            }],
            retrace_annotations: vec![None, Some(CrossDirection::Down), None, Some(CrossDirection::Up), None],
            cumulative_pnl: vec![550.0],
            static_levels: vec![495.0, 500.0, 505.0, 510.0, 515.0],
            last_entry_time: Some(ts(10, 45)),
            entries_this_bar: vec![1, 2],
            last_bar_index: Some(ts(11, 0)),
        }
    }

    #[test]
    fn save_load_round_trip() {
        let store = StateStore::in_memory().unwrap();
        let state = sample_state();
        store.save("alpha", &state).unwrap();
        let loaded = store.load("alpha").unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn missing_strategy_loads_none() {
        let store = StateStore::in_memory().unwrap();
        assert!(store.load("ghost").unwrap().is_none());
    }

    #[test]
    fn repeated_saves_append_only_the_suffix() {
        let store = StateStore::in_memory().unwrap();
        let mut state = sample_state();
        store.save("alpha", &state).unwrap();
        // Saving the identical snapshot must not duplicate rows
        store.save("alpha", &state).unwrap();
        let loaded = store.load("alpha").unwrap().unwrap();
        assert_eq!(loaded.trade_history.len(), 2);
        assert_eq!(loaded.cumulative_pnl.len(), 1);

        // A new closing event extends both append-only tables by one
        state.trade_history.push(TradeRecord {
            time: ts(12, 0),
            kind: TradeKind::Exit,
            price: 505.0,
            pnl: -100.0,
        });
        state.cumulative_pnl.push(450.0);
        state.total_pnl = 450.0;
        store.save("alpha", &state).unwrap();
        let loaded = store.load("alpha").unwrap().unwrap();
        assert_eq!(loaded.trade_history.len(), 3);
        assert_eq!(loaded.cumulative_pnl, vec![550.0, 450.0]);
        assert_eq!(loaded.trade_history.last().unwrap().pnl, -100.0);
    }

    #[test]
    fn static_levels_are_write_once() {
        let store = StateStore::in_memory().unwrap();
        let mut state = sample_state();
        store.save("alpha", &state).unwrap();

        state.static_levels = vec![1.0, 2.0, 3.0];
        store.save("alpha", &state).unwrap();

        let loaded = store.load("alpha").unwrap().unwrap();
        assert_eq!(loaded.static_levels, vec![495.0, 500.0, 505.0, 510.0, 515.0]);
    }

    #[test]
    fn open_trade_side_round_trips() {
        let store = StateStore::in_memory().unwrap();
        let mut state = sample_state();
        state.open_trade_list = vec![OpenTrade {
            entry_time: ts(10, 45),
            entry_price: 505.0,
            stop_level: 510.0,
            trailing_stop: None,
            triggering_level: 505.0,
            take_profit_level: 495.0,
            side: TradeSide::Short,
        }];
        store.save("beta", &state).unwrap();
        let loaded = store.load("beta").unwrap().unwrap();
        assert_eq!(loaded.open_trade_list[0].side, TradeSide::Short);
        assert_eq!(
            loaded.open_trade_list[0].implied_side(),
            loaded.open_trade_list[0].side
        );
    }

    #[test]
    fn stored_side_wins_over_price_geometry() {
        let store = StateStore::in_memory().unwrap();

        // A row whose stored side disagrees with its price geometry: the
        // stored side is authoritative, the divergence is only logged.
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO strategy_state
                 (strategy_name, current_cash_value, open_trade_count, total_pnl,
                  winrate, avg_winner, avg_loser, total_trade, reward_to_risk,
                  max_losing_streak)
                 VALUES (?1, 0, 1, 0, 0, 0, 0, 0, 0, 0)",
                params!["gamma"],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO open_trades
                 (strategy_name, trade_time, entry_price, stop_level,
                  trailing_stop, traded_level, take_profit_level, side)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    "gamma",
                    "2025-01-07 10:45:00.000000",
                    505.0,
                    500.0,
                    Option::<f64>::None,
                    505.0,
                    515.0,
                    "SHORT"
                ],
            )
            .unwrap();
        }

        let loaded = store.load("gamma").unwrap().unwrap();
        let trade = &loaded.open_trade_list[0];
        assert_eq!(trade.side, TradeSide::Short);
        assert_eq!(trade.implied_side(), TradeSide::Long);
    }

    #[test]
    fn delete_and_list() {
        let store = StateStore::in_memory().unwrap();
        store.save("alpha", &sample_state()).unwrap();
        store.save("beta", &sample_state()).unwrap();
        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);
        assert!(store.last_update_time("alpha").unwrap().is_some());

        store.delete("alpha").unwrap();
        assert_eq!(store.list().unwrap(), vec!["beta"]);
        assert!(store.load("alpha").unwrap().is_none());
        assert!(store.last_update_time("alpha").unwrap().is_none());
    }

    #[test]
    fn timestamp_round_trip_is_idempotent() {
        let canonical = "2025-01-07 10:30:00.000000";
        let parsed = parse_timestamp(canonical).unwrap();
        assert_eq!(format_timestamp(&parsed), canonical);

        // Older writers omitted the fraction; the parser must still accept it
        let legacy = parse_timestamp("2025-01-07 10:30:00").unwrap();
        assert_eq!(legacy, parsed);
        assert_eq!(
            parse_timestamp("2025-01-07T10:30:00.500000").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 7)
                .unwrap()
                .and_hms_micro_opt(10, 30, 0, 500_000)
                .unwrap()
        );
        assert!(parse_timestamp("not a time").is_none());
    }
}
