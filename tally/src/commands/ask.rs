// tally/src/commands/ask.rs
//
// USE CASE: Answer a question from a sealed report through the citation guard.

use std::path::PathBuf;

use anyhow::Context;
use tally_core::application::answer_question;
use tally_core::infrastructure::fs::load_report;
use tally_core::infrastructure::gateway::TemplateGateway;

pub async fn execute(report_path: PathBuf, question: String) -> anyhow::Result<()> {
    let report = load_report(&report_path)
        .with_context(|| format!("Failed to load report {:?}", report_path))?;
    let gateway = TemplateGateway::new()?;

    match answer_question(&gateway, &report, &question).await {
        Ok(answer) => {
            println!("{}", answer.text);
            println!(
                "\n[{} citation(s) verified against report {} (generation {})]",
                answer.citations.len(),
                answer.report_hash,
                answer.generation
            );
        }
        Err(e) if e.is_guard_rejection() => {
            eprintln!("Answer withheld: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
