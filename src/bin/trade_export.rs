//! Trade Export CLI
//!
//! Read-only operator tool over the daily `logs/trades-YYYY-MM-DD.jsonl`
//! files: prints a summary or exports a day's trades to CSV.
//!
//! Usage:
//!   trade-export --data-dir data --day 2026-07-27
//!   trade-export --data-dir data --day 2026-07-27 --output trades.csv
//!   trade-export --data-dir data --day 2026-07-27 --summary

use anyhow::{Context, Result};
use chrono::NaiveDate;
use dexarb_core::types::{LegState, TradeLogEntry};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_target(false).init();

    let args: Vec<String> = env::args().collect();
    let data_dir = parse_flag_value(&args, "--data-dir").unwrap_or_else(|| "data".to_string());
    let day = parse_flag_value(&args, "--day")
        .map(|s| s.parse::<NaiveDate>().context("invalid --day, expected YYYY-MM-DD"))
        .unwrap_or_else(|| Ok(chrono::Utc::now().date_naive()))?;

    let path = PathBuf::from(&data_dir).join("logs").join(format!("trades-{day}.jsonl"));
    let entries = read_entries(&path)?;

    if entries.is_empty() {
        info!(day = %day, "no trades recorded for this day");
        return Ok(());
    }

    if let Some(output) = parse_flag_value(&args, "--output") {
        let rows = export_csv(&entries, &output)?;
        info!(rows, output = %output, "exported trades to csv");
    } else {
        print_summary(&entries);
    }

    Ok(())
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

fn read_entries(path: &PathBuf) -> Result<Vec<TradeLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
    let mut entries = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TradeLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => error!(line = lineno + 1, error = %e, "skipping malformed trade log line"),
        }
    }
    Ok(entries)
}

fn print_summary(entries: &[TradeLogEntry]) {
    println!("{} trades", entries.len());
    let succeeded = entries
        .iter()
        .filter(|e| e.legs.iter().all(|l| l.state == LegState::Success))
        .count();
    let failed = entries.len() - succeeded;
    println!("  succeeded: {succeeded}");
    println!("  partial/failed: {failed}");

    let net_total: rust_decimal::Decimal = entries.iter().map(|e| e.expected_edge.net_edge).sum();
    println!("  sum of expected net edge: {net_total}");

    for entry in entries {
        let legs: Vec<String> = entry.legs.iter().map(|l| format!("{:?}:{:?}", l.venue, l.state)).collect();
        println!(
            "  {} {} {:?} net_edge={} legs=[{}]",
            entry.timestamp,
            entry.symbol,
            entry.direction,
            entry.expected_edge.net_edge,
            legs.join(", ")
        );
    }
}

fn export_csv(entries: &[TradeLogEntry], output: &str) -> Result<usize> {
    let mut file = fs::File::create(output).with_context(|| format!("failed to create {output}"))?;
    writeln!(
        file,
        "timestamp,mode,symbol,direction,net_edge,net_edge_bps,duration_ms,legs"
    )?;
    for entry in entries {
        let legs: Vec<String> = entry.legs.iter().map(|l| format!("{:?}:{:?}", l.venue, l.state)).collect();
        writeln!(
            file,
            "{},{:?},{},{:?},{},{},{},\"{}\"",
            entry.timestamp,
            entry.mode,
            entry.symbol,
            entry.direction,
            entry.expected_edge.net_edge,
            entry.expected_edge.net_edge_bps,
            entry.duration_ms,
            legs.join("; ")
        )?;
    }
    Ok(entries.len())
}
