// tally/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=tally_core=debug tally run ... for the details
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            project_dir,
            input,
            baseline,
        } => commands::run::execute(project_dir, input, baseline).await,
        Commands::Ask { report, question } => commands::ask::execute(report, question).await,
        Commands::Verify {
            report,
            subject,
            value,
        } => commands::verify::execute(report, subject, value),
        Commands::Summary { report } => commands::summary::execute(report).await,
        Commands::Clean { project_dir } => commands::clean::execute(project_dir),
    }
}
