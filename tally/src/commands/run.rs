// tally/src/commands/run.rs
//
// USE CASE: Analyze the project source and seal the report.

use std::path::PathBuf;

use anyhow::Context;
use comfy_table::{Table, presets::UTF8_FULL};
use tally_core::application::{AnalysisOutcome, RunOptions, run_project};
use rust_decimal::Decimal;
use tally_core::domain::metrics::{Bucket, KpiSet, round_half_even};
use tally_core::infrastructure::config::load_project_config;

const TOP_FINDINGS: usize = 10;

pub async fn execute(
    project_dir: PathBuf,
    input: Option<PathBuf>,
    baseline: Option<PathBuf>,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    println!("Loading configuration...");
    let config = load_project_config(&project_dir).with_context(|| {
        format!(
            "Failed to load project configuration from {:?}",
            project_dir
        )
    })?;
    println!("   Project: {} (v{})", config.name, config.version);

    let options = RunOptions { input, baseline };
    match run_project(&project_dir, &config, &options).await {
        Ok((outcome, report_path)) => {
            print_outcome(&outcome);
            println!(
                "\nReport sealed in {:.2?}: {} (generation {})",
                start.elapsed(),
                report_path.display(),
                outcome.report.generation()
            );
            println!("   Hash: {}", outcome.report.content_hash());
        }
        Err(e) => {
            eprintln!("\nAnalysis failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let report = &outcome.report;
    let places = report.rounding_places();

    println!(
        "   Rows: {} read, {} analyzed, {} excluded",
        outcome.rows_seen,
        outcome.records,
        outcome.rejected.len()
    );
    for rejected in &outcome.rejected {
        println!("   - {}", rejected);
    }

    let mut kpis = Table::new();
    kpis.load_preset(UTF8_FULL).set_header(vec![
        "Segment", "Sales", "Profit", "Margin %", "Orders", "Loss orders",
    ]);
    for set in report.kpi_sets().iter().filter(|s| s.bucket == Bucket::All) {
        kpis.add_row(kpi_row(set, places));
    }
    println!("\n{kpis}");

    if report.findings().is_empty() {
        println!("\nNo leakage findings.");
        return;
    }

    let mut findings = Table::new();
    findings
        .load_preset(UTF8_FULL)
        .set_header(vec!["Finding", "Type", "Subject", "Severity"]);
    for f in report.findings().iter().take(TOP_FINDINGS) {
        findings.add_row(vec![
            f.finding_id.clone(),
            f.leakage_type.to_string(),
            f.subject.clone(),
            round_half_even(f.severity, places).to_string(),
        ]);
    }
    println!("\n{} leakage findings", report.findings().len());
    println!("{findings}");
}

fn kpi_row(set: &KpiSet, places: u32) -> Vec<String> {
    vec![
        set.key.to_string(),
        round_half_even(set.total_sales, places).to_string(),
        round_half_even(set.total_profit, places).to_string(),
        set.profit_margin
            .map(|m| round_half_even(m * Decimal::ONE_HUNDRED, 2).to_string())
            .unwrap_or_else(|| "n/a".to_string()),
        set.order_count.to_string(),
        set.loss_order_count.to_string(),
    ]
}
