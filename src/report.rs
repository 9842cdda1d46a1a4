//! Console summaries and file export
//!
//! All monetary values are rounded to 2 decimals here and nowhere earlier.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::stats::{RepeatedReport, Summary};
use crate::types::{EventKind, HistoryEntry, RepeatedRuns, SequenceOutcome, StageOutcome};

/// Round a monetary value for display or export
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Print one stage's result block
pub fn print_stage(outcome: &StageOutcome) {
    println!("\n{} - {}", outcome.name, outcome.result);
    println!("{}", "-".repeat(50));
    if let Some(reason) = outcome.fail_reason {
        println!("  Reason:           {}", reason);
    }
    println!("  Days:             {}", outcome.days_elapsed);
    println!("  Trades:           {}", outcome.trades);
    println!(
        "  Primary balance:  {:.2} ({:+.2}%)",
        outcome.final_balance, outcome.primary_return_pct
    );
    println!(
        "  Hedge balance:    {:.2} (P&L {:+.2})",
        outcome.final_hedge_balance, outcome.hedge_pnl
    );
    println!(
        "  Withdrawable:     {:.2} | Signup fee: {:.2}",
        outcome.withdrawable, outcome.signup_fee
    );
    println!("  Combined result:  {:+.2}", outcome.combined_result);
}

/// Print the per-event log of one stage
pub fn print_history(outcome: &StageOutcome) {
    println!("\n{} event log ({} entries)", outcome.name, outcome.history.len());
    for entry in &outcome.history {
        println!("  {}", format_entry(entry));
    }
}

pub fn format_entry(entry: &HistoryEntry) -> String {
    // Hedge stops keep 4 decimals on the move, everything else 2
    let move_str = match entry.kind {
        EventKind::HedgeStop => format!("{:+.4}%", entry.move_pct),
        _ => format!("{:+.2}%", entry.move_pct),
    };
    let mut line = format!(
        "day {:>4} | move {:>9} | primary {:>12.2} | hedge {:>10.2}",
        entry.day, move_str, entry.balance, entry.hedge_balance
    );
    if let Some(note) = &entry.note {
        line.push_str(" | ");
        line.push_str(note);
    }
    line
}

/// Print a full single-challenge summary
pub fn print_sequence(sequence: &SequenceOutcome, with_history: bool) {
    println!("\n{}", "=".repeat(60));
    println!("HEDGED CHALLENGE SIMULATION");
    println!("{}", "=".repeat(60));

    for outcome in &sequence.stages {
        print_stage(outcome);
        if with_history {
            print_history(outcome);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("TOTALS");
    println!("{}", "-".repeat(40));
    println!("  Withdrawable:     {:.2}", sequence.total_withdrawable);
    println!("  Hedge P&L:        {:+.2}", sequence.total_hedge_profit);
    println!("  Signup fees:      {:.2}", sequence.total_signup_fee);
    println!("  Total days:       {}", sequence.total_days);
    println!("  Combined result:  {:+.2}", sequence.combined_result);
    println!("{}", "=".repeat(60));
}

fn print_summary(label: &str, summary: &Summary, unit: &str) {
    println!(
        "  {:22} mean {:>10.2}{} | median {:>10.2}{} | n={}",
        label, summary.mean, unit, summary.median, unit, summary.count
    );
}

/// Print the distribution summary of a repeated run
pub fn print_repeated(report: &RepeatedReport) {
    println!("\n{}", "=".repeat(70));
    println!("MONTE CARLO SUMMARY ({} runs)", report.runs);
    println!("{}", "=".repeat(70));

    print_summary("Profit (raw)", &report.profit, "");
    print_summary(
        &format!("Profit (<= p{:.0})", report.trim_percentile),
        &report.trimmed_profit,
        "",
    );
    println!(
        "  {:22} min {:>11.2} | max {:>13.2}",
        "Profit range", report.profit.min, report.profit.max
    );
    print_summary("Days (raw)", &report.days, "d");
    print_summary(
        &format!("Days (<= p{:.0})", report.trim_percentile),
        &report.trimmed_days,
        "d",
    );

    println!("\n  {:20} {:>10} {:>10}", "Stopped at", "Runs", "Rate");
    println!("  {}", "-".repeat(42));
    for stage in &report.stages {
        println!("  {:20} {:>10} {:>9.2}%", stage.name, stage.count, stage.rate_pct);
    }
    println!("{}", "=".repeat(70));
}

#[derive(Serialize)]
struct RunRow<'a> {
    run: usize,
    combined_result: f64,
    total_days: u32,
    stopped_at: &'a str,
}

/// Write one CSV row per run
pub fn write_runs_csv(path: &Path, runs: &RepeatedRuns, stage_names: &[String]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    for (run, ((&combined, &days), &stopped_at)) in runs
        .combined_results
        .iter()
        .zip(runs.total_days.iter())
        .zip(runs.stopped_at.iter())
        .enumerate()
    {
        writer.serialize(RunRow {
            run,
            combined_result: round2(combined),
            total_days: days,
            stopped_at: stage_names.get(stopped_at).map(String::as_str).unwrap_or(""),
        })?;
    }

    writer.flush().with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Write any serializable result as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(13.80499), 13.8);
        assert_eq!(round2(-39.005001), -39.01);
        assert_eq!(round2(1200.0), 1200.0);
    }

    #[test]
    fn test_format_entry_precision() {
        let mut entry = HistoryEntry {
            day: 3,
            kind: EventKind::HedgeStop,
            move_pct: 1.234567,
            balance: 15123.456,
            hedge_balance: 1135.05,
            note: Some("hedge stop triggered".to_string()),
        };
        let line = format_entry(&entry);
        assert!(line.contains("+1.2346%"));
        assert!(line.contains("15123.46"));
        assert!(line.ends_with("hedge stop triggered"));

        entry.kind = EventKind::Trade;
        entry.note = None;
        let line = format_entry(&entry);
        assert!(line.contains("+1.23%"));
        assert!(line.ends_with("1135.05"));
    }

    #[test]
    fn test_write_runs_csv() {
        let runs = RepeatedRuns {
            combined_results: vec![-39.0, 1234.5678],
            total_days: vec![4, 120],
            stopped_at: vec![0, 2],
            stage_reached: vec![1, 0, 1],
        };
        let names = vec!["Phase 1".to_string(), "Phase 2".to_string(), "Funded".to_string()];
        let path = std::env::temp_dir().join(format!("hedge_sim_runs_{}.csv", std::process::id()));

        write_runs_csv(&path, &runs, &names).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "run,combined_result,total_days,stopped_at");
        assert_eq!(lines[1], "0,-39.0,4,Phase 1");
        assert_eq!(lines[2], "1,1234.57,120,Funded");
    }
}
