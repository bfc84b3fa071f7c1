// tally/src/commands/summary.rs
//
// USE CASE: Print the guarded executive summary and the health tables of a report.

use std::path::PathBuf;

use anyhow::Context;
use comfy_table::{Table, presets::UTF8_FULL};
use rust_decimal::Decimal;
use tally_core::application::answer_question;
use tally_core::domain::metrics::round_half_even;
use tally_core::infrastructure::fs::load_report;
use tally_core::infrastructure::gateway::TemplateGateway;

pub async fn execute(report_path: PathBuf) -> anyhow::Result<()> {
    let report = load_report(&report_path)
        .with_context(|| format!("Failed to load report {:?}", report_path))?;
    let places = report.rounding_places();
    let fmt = |v: Decimal| round_half_even(v, places).to_string();
    let fmt_opt = |v: Option<Decimal>| v.map(fmt).unwrap_or_else(|| "n/a".to_string());

    let gateway = TemplateGateway::new()?;
    match answer_question(&gateway, &report, "executive summary").await {
        Ok(answer) => println!("{}\n", answer.text),
        Err(e) if e.is_guard_rejection() => {
            eprintln!("Summary withheld: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    let Some(summary) = report.summary() else {
        println!("Report {} carries no health tables.", report.content_hash());
        return Ok(());
    };

    let mut overview = Table::new();
    overview.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    overview.add_row(vec!["Total revenue".to_string(), fmt(summary.total_revenue)]);
    overview.add_row(vec!["Total profit".to_string(), fmt(summary.total_profit)]);
    overview.add_row(vec!["Profit margin %".to_string(), fmt_opt(summary.profit_margin_pct)]);
    overview.add_row(vec!["Orders".to_string(), summary.order_count.to_string()]);
    overview.add_row(vec!["Loss orders".to_string(), summary.loss_order_count.to_string()]);
    overview.add_row(vec!["Loss orders %".to_string(), fmt_opt(summary.loss_order_pct)]);
    overview.add_row(vec!["Health score".to_string(), fmt(summary.health_score)]);
    println!("{overview}");

    let mut worst = Table::new();
    worst
        .load_preset(UTF8_FULL)
        .set_header(vec!["Dimension", "Worst performer", "Profit", "Margin %"]);
    for w in &summary.worst_performers {
        worst.add_row(vec![
            w.dimension.to_string(),
            w.value.clone(),
            fmt(w.total_profit),
            fmt_opt(w.profit_margin_pct),
        ]);
    }
    println!("\n{worst}");

    let mut risk = Table::new();
    risk.load_preset(UTF8_FULL).set_header(vec![
        summary.risk.dimension.to_string(),
        "Periods".to_string(),
        "Loss periods".to_string(),
        "Avg loss ratio".to_string(),
        "Std loss ratio".to_string(),
        "Stability".to_string(),
    ]);
    for s in &summary.risk.segments {
        risk.add_row(vec![
            s.value.clone(),
            s.periods.to_string(),
            s.loss_periods.to_string(),
            fmt(s.avg_loss_ratio),
            fmt(s.std_loss_ratio),
            format!("{:?}", s.stability),
        ]);
    }
    println!("\n{risk}");
    println!("Risk classification: {}", summary.risk.risk_level);
    println!("Report: {} (generation {})", report.content_hash(), report.generation());

    Ok(())
}
