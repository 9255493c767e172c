//! Inspect and manage the strategy state database.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use ladder_retrace::store::StateStore;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and manage the strategy state database")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the database file
    #[arg(long, default_value = "trading_bot_state.db")]
    db: PathBuf,

    /// Skip confirmation prompts
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all strategies stored in the database
    List,
    /// Show detailed state for a strategy
    Show { strategy: Option<String> },
    /// Delete a strategy's state
    Delete { strategy: Option<String> },
    /// Delete ALL strategies
    ResetAll,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let store = StateStore::open(&cli.db)?;

    match cli.command {
        Command::List => list(&store),
        Command::Show { strategy } => {
            let name = require_name(strategy, "show")?;
            show(&store, &name)
        }
        Command::Delete { strategy } => {
            let name = require_name(strategy, "delete")?;
            if !cli.yes && !confirm(&format!("Are you sure you want to delete '{name}'?")) {
                println!("Deletion cancelled.");
                return Ok(());
            }
            store.delete(&name)?;
            println!("Successfully deleted state for: {name}");
            Ok(())
        }
        Command::ResetAll => {
            if !cli.yes
                && !confirm("Are you sure you want to delete ALL strategies? This cannot be undone!")
            {
                println!("Reset cancelled.");
                return Ok(());
            }
            let strategies = store.list()?;
            for name in &strategies {
                store.delete(name)?;
                println!("Deleted: {name}");
            }
            println!("\nSuccessfully reset database. Deleted {} strategies.", strategies.len());
            Ok(())
        }
    }
}

fn require_name(name: Option<String>, command: &str) -> Result<String> {
    name.ok_or_else(|| anyhow!("strategy name is required for the '{command}' command"))
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} (yes/no): ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim().eq_ignore_ascii_case("yes")
}

fn list(store: &StateStore) -> Result<()> {
    let strategies = store.list()?;
    if strategies.is_empty() {
        println!("No strategies found in database.");
        return Ok(());
    }

    println!("\nFound {} strategy/strategies:\n", strategies.len());
    for name in strategies {
        let last_update = store.last_update_time(&name)?;
        println!("  - {name}");
        println!("    Last updated: {}", last_update.as_deref().unwrap_or("never"));
        println!();
    }
    Ok(())
}

fn show(store: &StateStore, name: &str) -> Result<()> {
    let Some(state) = store.load(name)? else {
        println!("No state found for strategy: {name}");
        return Ok(());
    };

    println!("\n=== State for {name} ===\n");
    println!("Current Cash Value: ${:.2}", state.current_cash_value);
    println!("Total PnL: ${:.2}", state.total_pnl);
    println!("Open Trade Count: {}", state.open_trade_count);
    println!("Total Trades: {}", state.stats.total_trades);
    println!("Win Rate: {:.2}%", state.stats.winrate);
    println!("Average Winner: ${:.2}", state.stats.avg_winner);
    println!("Average Loser: ${:.2}", state.stats.avg_loser);
    println!("Reward to Risk: {:.2}", state.stats.reward_to_risk);
    println!("Max Losing Streak: {}", state.stats.max_losing_streak);
    println!("\nLast Price: {:?}", state.last_price);
    println!("Last Bar: {:?}", state.bar_time);

    println!("\n--- Open Trades ---");
    if state.open_trade_list.is_empty() {
        println!("  No open trades");
    } else {
        for (i, trade) in state.open_trade_list.iter().enumerate() {
            println!("  Trade {}:", i + 1);
            println!("    Entry Time: {}", trade.entry_time);
            println!("    Entry Price: {}", trade.entry_price);
            println!("    Stop Level: {}", trade.stop_level);
            println!("    Trailing Stop: {:?}", trade.trailing_stop);
            println!("    Traded Level: {}", trade.triggering_level);
            println!("    Take Profit Level: {}", trade.take_profit_level);
        }
    }

    println!("\n--- Trade History (last 10) ---");
    if state.trade_history.is_empty() {
        println!("  No trade history");
    } else {
        let start = state.trade_history.len().saturating_sub(10);
        for record in &state.trade_history[start..] {
            println!(
                "  {}: {} @ {:.2}, PnL: ${:.2}",
                record.time, record.kind, record.price, record.pnl
            );
        }
    }

    println!("\n--- Retrace Levels ---");
    let down = state
        .retrace_annotations
        .iter()
        .filter(|a| matches!(a, Some(ladder_retrace::strategy::CrossDirection::Down)))
        .count();
    let up = state
        .retrace_annotations
        .iter()
        .filter(|a| matches!(a, Some(ladder_retrace::strategy::CrossDirection::Up)))
        .count();
    let none = state.retrace_annotations.iter().filter(|a| a.is_none()).count();
    println!("  Total levels: {}", state.retrace_annotations.len());
    println!("  Crossed DOWN: {down}");
    println!("  Crossed UP: {up}");
    println!("  Not crossed: {none}");

    if !state.static_levels.is_empty() {
        println!("\n--- Static Levels ---");
        println!("  Total static levels loaded: {}", state.static_levels.len());
        let min = state.static_levels.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = state.static_levels.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        println!("  Range: {min:.2} - {max:.2}");
    }

    Ok(())
}
