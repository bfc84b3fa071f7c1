// tally/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Deterministic profit-leakage metrics with a citation guard", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalizes the source, computes KPIs and findings, seals target/report.json
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Input file overriding `source` in tally.yaml (.csv, .tsv or .json)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Sealed report whose margins serve as erosion baselines
        #[arg(long)]
        baseline: Option<PathBuf>,
    },

    /// Answers a question from a sealed report; every number must be cited
    Ask {
        /// Path to a sealed report.json
        #[arg(long, short, default_value = "target/report.json")]
        report: PathBuf,

        /// Free-text question (ex: "Which category has the most loss?")
        question: String,
    },

    /// Checks one claimed value against a sealed report
    Verify {
        #[arg(long, short, default_value = "target/report.json")]
        report: PathBuf,

        /// Subject reference (ex: "region=West/total_profit" or "West region profit")
        #[arg(long, short)]
        subject: String,

        /// Claimed value (ex: "1,234.50", "19.2%")
        #[arg(long, short, allow_hyphen_values = true)]
        value: String,
    },

    /// Prints the guarded executive summary and health tables of a sealed report
    Summary {
        #[arg(long, short, default_value = "target/report.json")]
        report: PathBuf,
    },

    /// Cleans build artifacts (target/ folder)
    Clean {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}
