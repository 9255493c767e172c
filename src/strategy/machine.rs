//! Level-retracement strategy state machine
//!
//! Consumes bar updates and decides entries and exits by watching price move
//! through the static level ladder. Each update runs a fixed phase sequence:
//! trading-hours gate, per-bar reset, ladder annotation, entry evaluation,
//! exit evaluation, then a persistence snapshot. State survives restarts via
//! the persistence store and is restored field-for-field.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::broker::BrokerAdapter;
use crate::hours::{CmeTradingHours, MarketStatus};
use crate::store::StateStore;

use super::config::{ticks_to_price, DateRange, StrategyConfig};
use super::ladder::{CrossDirection, LevelLadder};
use super::trades::{OpenTrade, TradeKind, TradeRecord, TradeSide};

/// Minimum bar-time between consecutive entries
const MIN_ENTRY_INTERVAL_MINUTES: i64 = 5;

/// Margin reserved per contract, as the original bookkeeping defines it
/// (10% of notional at $12.50/tick, 4 ticks/point)
fn margin_for(entry_price: f64) -> f64 {
    entry_price * 0.1 * 4.0 * 12.5
}

/// Classified strategy failures
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("invalid bar data: close={close}, prev_close={prev_close}, high={high}, low={low}")]
    InvalidBar {
        close: f64,
        prev_close: f64,
        high: f64,
        low: f64,
    },
    #[error("triggering level {0} not found in ladder")]
    UnknownLevel(f64),
    #[error("ladder too short to arm trailing stop beyond level {level}")]
    LadderExhausted { level: f64 },
    #[error("state persistence failed: {0}")]
    Persistence(anyhow::Error),
}

impl StrategyError {
    /// Errors that permanently halt the strategy (misconfiguration)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StrategyError::LadderExhausted { .. } | StrategyError::UnknownLevel(_)
        )
    }
}

/// Summary statistics derived from the EXIT history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    pub winrate: f64,
    pub avg_winner: f64,
    pub avg_loser: f64,
    pub total_trades: i64,
    pub reward_to_risk: f64,
    pub max_losing_streak: i64,
}

/// Full persistable snapshot of a strategy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyState {
    pub current_cash_value: f64,
    pub open_trade_count: usize,
    pub total_pnl: f64,
    pub price: Option<f64>,
    pub last_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub bar_time: Option<NaiveDateTime>,
    pub stats: SummaryStats,
    pub trade_history: Vec<TradeRecord>,
    pub open_trade_list: Vec<OpenTrade>,
    pub retrace_annotations: Vec<Option<CrossDirection>>,
    pub cumulative_pnl: Vec<f64>,
    pub static_levels: Vec<f64>,
    pub last_entry_time: Option<NaiveDateTime>,
    pub entries_this_bar: Vec<usize>,
    pub last_bar_index: Option<NaiveDateTime>,
}

/// One configured level-retracement strategy
pub struct Strategy {
    name: String,
    is_trading: bool,

    // Offsets already converted from ticks to price
    entry_offset: f64,
    take_profit_offset: f64,
    stop_loss_offset: f64,
    trail_trigger: usize,
    re_entry_distance: usize,
    max_open_trades: usize,
    max_contracts_per_trade: usize,
    symbol_size: f64,
    is_trading_long: bool,
    long_date_ranges: Vec<DateRange>,
    short_date_ranges: Vec<DateRange>,

    ladder: LevelLadder,
    open_trades: Vec<OpenTrade>,
    open_trade_count: usize,
    trade_history: Vec<TradeRecord>,
    cumulative_pnl: Vec<f64>,
    current_cash_value: f64,
    total_pnl: f64,
    stats: SummaryStats,

    // Last observed market state
    price: Option<f64>,
    last_price: Option<f64>,
    high_price: Option<f64>,
    low_price: Option<f64>,
    bar_time: Option<NaiveDateTime>,

    // CME hours gating
    trading_hours: Option<CmeTradingHours>,
    positions_flattened_today: bool,
    last_flatten_date: Option<NaiveDate>,

    // Entry rate limiting
    entries_this_bar: HashSet<usize>,
    last_bar_index: Option<NaiveDateTime>,
    last_entry_time: Option<NaiveDateTime>,

    broker: Arc<dyn BrokerAdapter>,
    store: Option<Arc<StateStore>>,
}

impl Strategy {
    pub fn new(
        config: StrategyConfig,
        broker: Arc<dyn BrokerAdapter>,
        store: Option<Arc<StateStore>>,
    ) -> Self {
        let trading_hours = config
            .use_trading_hours
            .then(|| CmeTradingHours::new(config.early_close_calendar.clone()));

        Self {
            name: config.name,
            is_trading: true,
            entry_offset: ticks_to_price(config.entry_offset),
            take_profit_offset: ticks_to_price(config.take_profit_offset),
            stop_loss_offset: ticks_to_price(config.stop_loss_offset),
            trail_trigger: config.trail_trigger,
            re_entry_distance: config.re_entry_distance,
            max_open_trades: config.max_open_trades,
            max_contracts_per_trade: config.max_contracts_per_trade,
            symbol_size: config.symbol_size,
            is_trading_long: config.is_trading_long,
            long_date_ranges: config.long_date_ranges,
            short_date_ranges: config.short_date_ranges,
            ladder: LevelLadder::load(config.static_levels),
            open_trades: Vec::new(),
            open_trade_count: 0,
            trade_history: Vec::new(),
            cumulative_pnl: Vec::new(),
            current_cash_value: 0.0,
            total_pnl: 0.0,
            stats: SummaryStats::default(),
            price: None,
            last_price: None,
            high_price: None,
            low_price: None,
            bar_time: None,
            trading_hours,
            positions_flattened_today: false,
            last_flatten_date: None,
            entries_this_bar: HashSet::new(),
            last_bar_index: None,
            last_entry_time: None,
            broker,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// False once a fatal error halted this strategy
    pub fn is_trading(&self) -> bool {
        self.is_trading
    }

    pub fn turn_off_trading(&mut self) {
        self.is_trading = false;
    }

    pub fn open_trades(&self) -> &[OpenTrade] {
        &self.open_trades
    }

    pub fn trade_history(&self) -> &[TradeRecord] {
        &self.trade_history
    }

    pub fn cumulative_pnl(&self) -> &[f64] {
        &self.cumulative_pnl
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn stats(&self) -> &SummaryStats {
        &self.stats
    }

    /// Drive the state machine with one bar.
    ///
    /// `bar_time` is exchange-local (Chicago) wall time; `prev_close` is the
    /// previous bar's close as threaded by the dispatcher.
    pub async fn update(
        &mut self,
        bar_time: NaiveDateTime,
        close: f64,
        prev_close: f64,
        high: f64,
        low: f64,
    ) -> Result<(), StrategyError> {
        if !(close.is_finite() && prev_close.is_finite() && high.is_finite() && low.is_finite()) {
            return Err(StrategyError::InvalidBar {
                close,
                prev_close,
                high,
                low,
            });
        }

        self.price = Some(close);
        self.last_price = Some(prev_close);
        self.high_price = Some(high);
        self.low_price = Some(low);
        self.bar_time = Some(bar_time);

        // Phase A: trading-hours gate. Exits still clear while the market is
        // closed, but no annotation or entry work happens.
        if let Some(hours) = self.trading_hours.clone() {
            let date = bar_time.date();
            if self.last_flatten_date != Some(date) {
                self.positions_flattened_today = false;
            }

            let (status, reason) = hours.status_local(bar_time);
            match status {
                MarketStatus::FlattenWindow => {
                    if !self.positions_flattened_today && self.open_trade_count > 0 {
                        self.flatten_all_positions("CME daily close approaching").await;
                        self.positions_flattened_today = true;
                        self.last_flatten_date = Some(date);
                    }
                    self.check_exits(bar_time, close).await?;
                    self.snapshot()?;
                    return Ok(());
                }
                MarketStatus::Closed => {
                    debug!("{}: {}", self.name, reason);
                    self.check_exits(bar_time, close).await?;
                    self.snapshot()?;
                    return Ok(());
                }
                MarketStatus::Open => {}
            }
        }

        // Phase B: per-bar reset
        if self.last_bar_index != Some(bar_time) {
            self.entries_this_bar.clear();
            if let Some(prev) = self.last_bar_index {
                if prev.date() != bar_time.date() {
                    self.positions_flattened_today = false;
                }
            }
            self.last_bar_index = Some(bar_time);
        }

        // Optional date-range pre-filter: outside the permitted ranges the
        // bar is fed for exit evaluation only.
        if self.entries_permitted(bar_time) {
            // Phases C + D
            self.annotate_crossings(close, high, low);
            self.run_entries(bar_time, close, prev_close).await;
        }

        // Phase E
        self.check_exits(bar_time, close).await?;

        // Phase F
        self.snapshot()?;
        Ok(())
    }

    fn entries_permitted(&self, bar_time: NaiveDateTime) -> bool {
        let ranges = if self.is_trading_long {
            &self.long_date_ranges
        } else {
            &self.short_date_ranges
        };
        ranges.is_empty() || ranges.iter().any(|r| r.contains(bar_time))
    }

    /// Phase C: record the direction of every level the bar's range crossed
    fn annotate_crossings(&mut self, close: f64, high: f64, low: f64) {
        for i in 0..self.ladder.len() {
            let level = self.ladder.level(i);
            if close <= level && level < high {
                info!(
                    "{}: price crossed DOWN through level {} (index {}), close={}, high={}",
                    self.name, level, i, close, high
                );
                self.ladder.annotate(i, CrossDirection::Down);
            } else if close >= level && level > low {
                info!(
                    "{}: price crossed UP through level {} (index {}), close={}, low={}",
                    self.name, level, i, close, low
                );
                self.ladder.annotate(i, CrossDirection::Up);
            }
        }
    }

    /// Phase D: evaluate the retracement entry rule at every ladder level
    async fn run_entries(&mut self, bar_time: NaiveDateTime, close: f64, prev_close: f64) {
        if self.open_trade_count >= self.max_open_trades {
            debug!(
                "{}: no room to trade (open: {}/{})",
                self.name, self.open_trade_count, self.max_open_trades
            );
            return;
        }

        for i in 0..self.ladder.len() {
            if self.open_trade_count >= self.max_open_trades {
                break;
            }
            let level = self.ladder.level(i);

            let (crossed_entry_band, re_entry_idx, armed) = if self.is_trading_long {
                let threshold = level + self.entry_offset;
                let crossed = close <= threshold && threshold < prev_close;
                let idx = i.checked_add(self.re_entry_distance).filter(|&j| j < self.ladder.len());
                let armed = idx
                    .map(|j| self.ladder.annotation(j) == Some(CrossDirection::Down))
                    .unwrap_or(false);
                (crossed, idx, armed)
            } else {
                let threshold = level - self.entry_offset;
                let crossed = close > threshold && threshold >= prev_close;
                let idx = i.checked_sub(self.re_entry_distance);
                let armed = idx
                    .map(|j| self.ladder.annotation(j) == Some(CrossDirection::Up))
                    .unwrap_or(false);
                (crossed, idx, armed)
            };

            if !crossed_entry_band || !armed {
                continue;
            }
            let re_entry_idx = match re_entry_idx {
                Some(j) => j,
                None => continue,
            };

            if self.entries_this_bar.contains(&i) {
                info!(
                    "{}: skipping entry at level {} - already entered this bar",
                    self.name, level
                );
                continue;
            }

            if let Some(last) = self.last_entry_time {
                let since = bar_time - last;
                if since < Duration::minutes(MIN_ENTRY_INTERVAL_MINUTES) {
                    info!(
                        "{}: skipping entry at level {} - only {}s since last entry (min: {} min)",
                        self.name,
                        level,
                        since.num_seconds(),
                        MIN_ENTRY_INTERVAL_MINUTES
                    );
                    continue;
                }
            }

            info!(
                "{}: *** ENTRY TRIGGERED *** at level {} (index {}, re-entry index {})",
                self.name, level, i, re_entry_idx
            );
            self.ladder.clear(re_entry_idx);
            self.enter_trades(bar_time, close, i, level).await;
        }
    }

    /// Open `max_contracts_per_trade` units at the current close, one broker
    /// order each. A rejected order leaves no trace in the open list.
    async fn enter_trades(&mut self, bar_time: NaiveDateTime, close: f64, level_idx: usize, level: f64) {
        let side = if self.is_trading_long {
            TradeSide::Long
        } else {
            TradeSide::Short
        };

        for _ in 0..self.max_contracts_per_trade {
            let (stop_level, take_profit_level) = match side {
                TradeSide::Long => (close - self.stop_loss_offset, close + self.take_profit_offset),
                TradeSide::Short => (close + self.stop_loss_offset, close - self.take_profit_offset),
            };
            let trade = OpenTrade {
                entry_time: bar_time,
                entry_price: close,
                stop_level,
                trailing_stop: None,
                triggering_level: level,
                take_profit_level,
                side,
            };
            debug_assert_eq!(trade.side, trade.implied_side());

            let kind = match side {
                TradeSide::Long => TradeKind::Buy,
                TradeSide::Short => TradeKind::Sell,
            };
            info!(
                "{}: [{}] {} ORDER SENT at {} (retraced to static level {}), stop {}",
                self.name, bar_time, kind, close, level, stop_level
            );

            let filled = match self.broker.enter_position(1, side == TradeSide::Long).await {
                Ok(filled) => filled,
                Err(e) => {
                    error!("{}: order placement error: {e:#}", self.name);
                    false
                }
            };

            if filled {
                self.trade_history.push(TradeRecord {
                    time: bar_time,
                    kind,
                    price: close,
                    pnl: 0.0,
                });
                self.open_trades.push(trade);
                self.open_trade_count += 1;
                self.current_cash_value -= margin_for(close);
                self.entries_this_bar.insert(level_idx);
                self.last_entry_time = Some(bar_time);
                info!(
                    "{}: order filled, open trades: {} (list size {})",
                    self.name,
                    self.open_trade_count,
                    self.open_trades.len()
                );
            } else {
                warn!("{}: order NOT filled, trade not added", self.name);
            }
        }
    }

    /// Phase E: manage trailing stops and close any trade whose exit fired
    async fn check_exits(&mut self, bar_time: NaiveDateTime, close: f64) -> Result<(), StrategyError> {
        let mut to_remove = Vec::new();

        for i in 0..self.open_trades.len() {
            let trade = self.open_trades[i].clone();
            let mut trailing = trade.trailing_stop;

            match trade.side {
                TradeSide::Long => {
                    if trailing.is_none() {
                        let j = self
                            .ladder
                            .index_of(trade.triggering_level)
                            .ok_or(StrategyError::UnknownLevel(trade.triggering_level))?;
                        if j + self.trail_trigger >= self.ladder.len() {
                            return Err(StrategyError::LadderExhausted {
                                level: trade.triggering_level,
                            });
                        }
                        let trigger_price = self.ladder.level(j + self.trail_trigger);
                        if close > trigger_price {
                            info!(
                                "{}: trailing stop activated for LONG at {}",
                                self.name, trigger_price
                            );
                            trailing = Some(trigger_price);
                        }
                    }
                    if let Some(t) = trailing {
                        trailing = Some(t.max(close - self.stop_loss_offset));
                    }
                    self.open_trades[i].trailing_stop = trailing;

                    let stop_hit = close <= trade.stop_level;
                    let trail_hit = trailing.is_some_and(|t| close <= t);
                    let target_hit = close >= trade.take_profit_level;
                    if stop_hit || trail_hit || target_hit {
                        let pnl = (close - trade.entry_price) * self.symbol_size;
                        self.record_close(bar_time, TradeKind::Exit, close, trade.entry_price, pnl);
                        self.open_trade_count = self.open_trade_count.saturating_sub(1);
                        to_remove.push(i);

                        match self.broker.net_position().await {
                            Ok(net) if net > 0 => {
                                if let Err(e) = self.broker.enter_position(1, false).await {
                                    warn!("{}: offsetting sell failed: {e:#}", self.name);
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("{}: net position lookup failed: {e:#}", self.name),
                        }

                        let reason = if trail_hit {
                            "Trailing stop"
                        } else if stop_hit {
                            "Stop loss"
                        } else {
                            "Take profit"
                        };
                        info!(
                            "{}: LONG EXIT - {} at {} | PnL: ${:.2} | entry {} | held {}",
                            self.name,
                            reason,
                            close,
                            pnl,
                            trade.entry_price,
                            bar_time - trade.entry_time
                        );
                    }
                }
                TradeSide::Short => {
                    if trailing.is_none() {
                        let j = self
                            .ladder
                            .index_of(trade.triggering_level)
                            .ok_or(StrategyError::UnknownLevel(trade.triggering_level))?;
                        if j < self.trail_trigger {
                            return Err(StrategyError::LadderExhausted {
                                level: trade.triggering_level,
                            });
                        }
                        let trigger_price = self.ladder.level(j - self.trail_trigger);
                        if close <= trigger_price {
                            info!(
                                "{}: trailing stop activated for SHORT at {}",
                                self.name, trigger_price
                            );
                            trailing = Some(trigger_price);
                        }
                    }
                    if let Some(t) = trailing {
                        trailing = Some(t.min(close + self.stop_loss_offset));
                    }
                    self.open_trades[i].trailing_stop = trailing;

                    let stop_hit = close >= trade.stop_level;
                    let trail_hit = trailing.is_some_and(|t| close >= t);
                    let target_hit = close <= trade.take_profit_level;
                    if stop_hit || trail_hit || target_hit {
                        let pnl = (trade.entry_price - close) * self.symbol_size;
                        self.record_close(bar_time, TradeKind::Exit, close, trade.entry_price, pnl);
                        self.open_trade_count = self.open_trade_count.saturating_sub(1);
                        to_remove.push(i);

                        match self.broker.net_position().await {
                            Ok(net) if net < 0 => {
                                if let Err(e) = self.broker.enter_position(1, true).await {
                                    warn!("{}: offsetting buy failed: {e:#}", self.name);
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("{}: net position lookup failed: {e:#}", self.name),
                        }

                        let reason = if trail_hit {
                            "Trailing stop"
                        } else if stop_hit {
                            "Stop loss"
                        } else {
                            "Take profit"
                        };
                        info!(
                            "{}: SHORT EXIT - {} at {} | PnL: ${:.2} | entry {} | held {}",
                            self.name,
                            reason,
                            close,
                            pnl,
                            trade.entry_price,
                            bar_time - trade.entry_time
                        );
                    }
                }
            }
        }

        for idx in to_remove.into_iter().rev() {
            self.open_trades.remove(idx);
        }

        // The counter duplicates authoritative data; reconcile rather than fail.
        if self.open_trade_count != self.open_trades.len() {
            warn!(
                "{}: open trade count {} does not match list size {}, reconciling",
                self.name,
                self.open_trade_count,
                self.open_trades.len()
            );
            self.open_trade_count = self.open_trades.len();
        }

        Ok(())
    }

    fn record_close(
        &mut self,
        time: NaiveDateTime,
        kind: TradeKind,
        price: f64,
        entry_price: f64,
        pnl: f64,
    ) {
        self.current_cash_value += pnl;
        self.current_cash_value += margin_for(entry_price);
        self.total_pnl += pnl;
        self.trade_history.push(TradeRecord {
            time,
            kind,
            price,
            pnl,
        });
        self.cumulative_pnl.push(self.total_pnl);
    }

    /// Close every open trade at the current close. Idempotent within a day
    /// through the flattened-today flag maintained by the hours gate.
    pub async fn flatten_all_positions(&mut self, reason: &str) {
        if self.open_trade_count == 0 {
            return;
        }
        let (Some(close), Some(bar_time)) = (self.price, self.bar_time) else {
            return;
        };

        info!("{}: FLATTENING ALL POSITIONS - {}", self.name, reason);
        info!("{}: closing {} open trades", self.name, self.open_trade_count);

        let mut total_flatten_pnl = 0.0;
        let trades = std::mem::take(&mut self.open_trades);
        for trade in &trades {
            let pnl = match trade.side {
                TradeSide::Long => (close - trade.entry_price) * self.symbol_size,
                TradeSide::Short => (trade.entry_price - close) * self.symbol_size,
            };
            total_flatten_pnl += pnl;
            self.record_close(bar_time, TradeKind::Flatten, close, trade.entry_price, pnl);

            // One offsetting order per unit
            let offset_is_long = !trade.is_long();
            if let Err(e) = self.broker.enter_position(1, offset_is_long).await {
                warn!("{}: flatten order failed: {e:#}", self.name);
            }

            info!(
                "{}: {} FLATTEN at {} | PnL: ${:.2} | entry {}",
                self.name, trade.side, close, pnl, trade.entry_price
            );
        }

        self.open_trade_count = 0;
        info!(
            "{}: all positions flattened, total flatten PnL: ${:.2}",
            self.name, total_flatten_pnl
        );
    }

    /// Recompute the summary block from EXIT history (flatten records count
    /// toward total pnl only, matching the stats' definition)
    pub fn recompute_stats(&mut self) {
        let wins: Vec<f64> = self
            .trade_history
            .iter()
            .filter(|r| r.kind == TradeKind::Exit && r.pnl > 0.0)
            .map(|r| r.pnl)
            .collect();
        let losses: Vec<f64> = self
            .trade_history
            .iter()
            .filter(|r| r.kind == TradeKind::Exit && r.pnl <= 0.0)
            .map(|r| r.pnl)
            .collect();

        let total = wins.len() + losses.len();
        self.stats.total_trades = total as i64;
        self.stats.winrate = wins.len() as f64 / total.max(1) as f64 * 100.0;
        self.stats.avg_winner = wins.iter().sum::<f64>() / wins.len().max(1) as f64;
        self.stats.avg_loser = losses.iter().sum::<f64>() / losses.len().max(1) as f64;
        self.stats.reward_to_risk = self.stats.avg_winner / self.stats.avg_loser.abs().max(1.0);

        let mut streak = 0i64;
        let mut max_streak = self.stats.max_losing_streak;
        for record in &self.trade_history {
            if record.kind != TradeKind::Exit {
                continue;
            }
            if record.pnl <= 0.0 {
                streak += 1;
                max_streak = max_streak.max(streak);
            } else {
                streak = 0;
            }
        }
        self.stats.max_losing_streak = max_streak;
    }

    /// Log the trade summary block (shutdown path)
    pub fn print_trade_stats(&mut self) {
        self.recompute_stats();
        info!("{} | trade statistics:", self.name);
        info!("  Total PnL: ${:.2}", self.total_pnl);
        info!("  Win %: {:.2}%", self.stats.winrate);
        info!("  Average winner: {:.2}", self.stats.avg_winner);
        info!("  Average loser: {:.2}", self.stats.avg_loser);
        info!("  Reward to risk: {:.2}", self.stats.reward_to_risk);
        info!("  Total trades made: {}", self.stats.total_trades);
        info!("  Highest consecutive losses: {}", self.stats.max_losing_streak);
    }

    /// Current state as a persistable snapshot
    pub fn state(&self) -> StrategyState {
        let mut entries: Vec<usize> = self.entries_this_bar.iter().copied().collect();
        entries.sort_unstable();
        StrategyState {
            current_cash_value: self.current_cash_value,
            open_trade_count: self.open_trade_count,
            total_pnl: self.total_pnl,
            price: self.price,
            last_price: self.last_price,
            high_price: self.high_price,
            low_price: self.low_price,
            bar_time: self.bar_time,
            stats: self.stats.clone(),
            trade_history: self.trade_history.clone(),
            open_trade_list: self.open_trades.clone(),
            retrace_annotations: self.ladder.annotations().to_vec(),
            cumulative_pnl: self.cumulative_pnl.clone(),
            static_levels: self.ladder.levels().to_vec(),
            last_entry_time: self.last_entry_time,
            entries_this_bar: entries,
            last_bar_index: self.last_bar_index,
        }
    }

    /// Restore from a persisted snapshot. The ladder itself stays as
    /// configured; only its annotations are restored.
    pub fn apply_state(&mut self, state: StrategyState) {
        self.current_cash_value = state.current_cash_value;
        self.open_trade_count = state.open_trade_count;
        self.total_pnl = state.total_pnl;
        self.price = state.price;
        self.last_price = state.last_price;
        self.high_price = state.high_price;
        self.low_price = state.low_price;
        self.bar_time = state.bar_time;
        self.stats = state.stats;
        self.trade_history = state.trade_history;
        self.open_trades = state.open_trade_list;
        self.ladder.restore_annotations(state.retrace_annotations);
        self.cumulative_pnl = state.cumulative_pnl;
        self.last_entry_time = state.last_entry_time;
        self.entries_this_bar = state.entries_this_bar.into_iter().collect();
        self.last_bar_index = state.last_bar_index;
    }

    /// Persist the current state if a store is attached
    pub fn save_state(&self) -> Result<(), StrategyError> {
        if let Some(store) = &self.store {
            store
                .save(&self.name, &self.state())
                .map_err(StrategyError::Persistence)?;
        }
        Ok(())
    }

    /// Load persisted state if present. Returns true when state was restored;
    /// a load failure logs and leaves the strategy fresh.
    pub fn load_state(&mut self) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        match store.load(&self.name) {
            Ok(Some(state)) => {
                info!(
                    "{}: loading state from DB: open trades={}, list size={}, pnl=${:.2}",
                    self.name,
                    state.open_trade_count,
                    state.open_trade_list.len(),
                    state.total_pnl
                );
                self.apply_state(state);
                let active = self
                    .ladder
                    .annotations()
                    .iter()
                    .filter(|a| a.is_some())
                    .count();
                info!(
                    "{}: state restored: open trades={}, active retraces={}",
                    self.name, self.open_trade_count, active
                );
                true
            }
            Ok(None) => {
                info!("{}: starting fresh - no saved state", self.name);
                false
            }
            Err(e) => {
                error!("{}: failed to load state: {e:#}", self.name);
                false
            }
        }
    }

    fn snapshot(&self) -> Result<(), StrategyError> {
        self.save_state()
    }
}
