// tally/src/commands/verify.rs
//
// USE CASE: Check a single claimed value against a sealed report.

use std::path::PathBuf;

use anyhow::Context;
use rust_decimal::Decimal;
use tally_core::domain::guard::citation::parse_claimed_value;
use tally_core::domain::guard::verify_citation;
use tally_core::infrastructure::fs::load_report;

pub fn execute(report_path: PathBuf, subject: String, value: String) -> anyhow::Result<()> {
    let report = load_report(&report_path)
        .with_context(|| format!("Failed to load report {:?}", report_path))?;
    let claimed: Decimal =
        parse_claimed_value(&value).with_context(|| format!("Not a number: {:?}", value))?;

    if verify_citation(&report, claimed, &subject) {
        println!("VERIFIED {} = {}", subject, claimed);
        Ok(())
    } else {
        println!("REJECTED {} = {}", subject, claimed);
        std::process::exit(1);
    }
}
