//! Command surface for the `shift` session telemetry binary.
//!
//! Commands execute against any [`SessionStore`] through [`run_command`];
//! [`run_cli`] wires in the `SQLite` store at the configured path.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shift_telemetry_core::{
    simulate, summarize, SessionInput, SessionRecord, SessionStore, SessionSummary,
};
use shift_telemetry_store_sqlite::SqliteSessionStore;
use time::OffsetDateTime;

const CHART_WIDTH: usize = 40;
const COMPARE_WIDTH: usize = 20;

#[derive(Debug, Parser)]
#[command(name = "shift")]
#[command(about = "Session telemetry recorder and dashboard")]
pub struct Cli {
    #[arg(long, default_value = "./shift_telemetry.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Draw synthetic sessions and append them to the log.
    Simulate(SimulateArgs),
    /// Append one manually entered session.
    Record(RecordArgs),
    /// Print every session, newest first.
    List(ListArgs),
    /// Print aggregate KPIs over the full log.
    Summary(SummaryArgs),
    /// Render KPIs, the score chart, and the sales vs errors comparison.
    Dashboard,
    /// Delete every session record.
    Reset,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[arg(long, default_value = simulate::BOT_ACTOR)]
    actor: String,
    #[arg(long, default_value_t = 1)]
    count: usize,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[arg(long)]
    actor: String,
    #[arg(long)]
    sales: u32,
    #[arg(long)]
    errors: u32,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[arg(long)]
    json: bool,
}

/// Executes the parsed CLI against the `SQLite` store at `--db`.
///
/// # Errors
/// Returns an error when the store cannot be opened/migrated or the requested
/// command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut store = SqliteSessionStore::open(&cli.db)?;
    run_command(cli.command, &mut store)
}

/// Executes a parsed command against any session store.
///
/// # Errors
/// Returns an error when input validation, persistence, or rendering fails.
pub fn run_command<S: SessionStore>(command: Command, store: &mut S) -> Result<()> {
    match command {
        Command::Simulate(args) => run_simulate(args, store),
        Command::Record(args) => {
            let input = SessionInput {
                actor: args.actor,
                sales: args.sales,
                errors: args.errors,
            };
            let record = store.append(&input)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::List(args) => run_list(args, store),
        Command::Summary(args) => run_summary(args, store),
        Command::Dashboard => run_dashboard(store),
        Command::Reset => {
            let removed = store.reset()?;
            println!("removed {removed} session record(s)");
            Ok(())
        }
    }
}

fn run_simulate<S: SessionStore>(args: SimulateArgs, store: &mut S) -> Result<()> {
    if args.count == 0 {
        return Err(anyhow!("--count must be >= 1"));
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut appended = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let (sales, errors) = simulate::draw(&mut rng);
        let input = SessionInput {
            actor: args.actor.clone(),
            sales,
            errors,
        };
        appended.push(store.append(&input)?);
    }

    println!("{}", serde_json::to_string_pretty(&appended)?);
    Ok(())
}

fn run_list<S: SessionStore>(args: ListArgs, store: &mut S) -> Result<()> {
    let records = store.list_all()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        print_empty_hint();
    } else {
        print_session_table(&records);
    }
    Ok(())
}

fn run_summary<S: SessionStore>(args: SummaryArgs, store: &mut S) -> Result<()> {
    let records = store.list_all()?;
    let summary = summarize(&records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        match summary {
            Some(summary) => print_summary(&summary),
            None => print_empty_hint(),
        }
    }
    Ok(())
}

fn run_dashboard<S: SessionStore>(store: &mut S) -> Result<()> {
    let records = store.list_all()?;
    let Some(summary) = summarize(&records) else {
        print_empty_hint();
        return Ok(());
    };

    print_summary(&summary);
    println!();
    print_score_chart(&records);
    println!();
    print_sales_errors_chart(&records);
    println!();
    print_session_table(&records);
    Ok(())
}

fn print_empty_hint() {
    println!("no sessions recorded");
    println!("hint=run `shift simulate` to log a synthetic session");
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "sessions_played={} best_score={} total_sales={} total_errors={} latest_actor={} latest_recorded_at={}",
        summary.sessions_played,
        summary.best_score,
        summary.total_sales,
        summary.total_errors,
        summary.latest_actor,
        timestamp_cell(summary.latest_recorded_at)
    );
}

fn print_session_table(records: &[SessionRecord]) {
    println!(
        "{:<6} {:<20} {:<16} {:>6} {:>7} {:>7}",
        "id", "recorded_at", "actor", "sales", "errors", "score"
    );
    println!("{}", "-".repeat(68));

    for record in records {
        println!(
            "{:<6} {:<20} {:<16} {:>6} {:>7} {:>7}",
            record.id,
            timestamp_cell(record.recorded_at),
            record.actor,
            record.sales,
            record.errors,
            record.score
        );
    }
}

fn print_score_chart(records: &[SessionRecord]) {
    let max_score = records.iter().map(|record| record.score).max().unwrap_or(0);

    println!("score per session (oldest first)");
    for record in records.iter().rev() {
        println!(
            "{:<6} {:<width$} {}",
            record.id,
            bar(record.score, max_score, CHART_WIDTH),
            record.score,
            width = CHART_WIDTH
        );
    }
}

fn print_sales_errors_chart(records: &[SessionRecord]) {
    let max_sales = records
        .iter()
        .map(|record| i64::from(record.sales))
        .max()
        .unwrap_or(0);
    let max_errors = records
        .iter()
        .map(|record| i64::from(record.errors))
        .max()
        .unwrap_or(0);

    println!("sales vs errors per session (oldest first)");
    println!("{:<6} {:<26} errors", "id", "sales");

    for record in records.iter().rev() {
        let sales_cell = format!(
            "{:<width$} {}",
            bar(i64::from(record.sales), max_sales, COMPARE_WIDTH),
            record.sales,
            width = COMPARE_WIDTH
        );
        let errors_cell = format!(
            "{:<width$} {}",
            bar(i64::from(record.errors), max_errors, COMPARE_WIDTH),
            record.errors,
            width = COMPARE_WIDTH
        );
        println!("{:<6} {:<26} {}", record.id, sales_cell, errors_cell);
    }
}

fn timestamp_cell(value: OffsetDateTime) -> String {
    shift_telemetry_core::format_timestamp(value)
        .unwrap_or_else(|_| "invalid timestamp".to_string())
}

fn bar(value: i64, max: i64, width: usize) -> String {
    "#".repeat(scaled_width(value, max, width))
}

fn scaled_width(value: i64, max: i64, width: usize) -> usize {
    if value <= 0 || max <= 0 {
        return 0;
    }

    let width_i64 = i64::try_from(width).unwrap_or(i64::MAX);
    let scaled = value.saturating_mul(width_i64) / max;
    // Nonzero values always get a visible mark.
    usize::try_from(scaled).unwrap_or(width).clamp(1, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_scale_to_the_largest_value() {
        assert_eq!(scaled_width(0, 100, 40), 0);
        assert_eq!(scaled_width(100, 100, 40), 40);
        assert_eq!(scaled_width(50, 100, 40), 20);
        assert_eq!(scaled_width(1, 1_000_000, 40), 1);
    }

    #[test]
    fn bars_handle_an_all_zero_column() {
        assert_eq!(scaled_width(0, 0, 40), 0);
        assert_eq!(bar(0, 0, 40), "");
    }
}
