// tally-core/src/application/mod.rs

pub mod clean;
pub mod explain;
pub mod pipeline;
pub mod ports;

// --- RE-EXPORTS (FACADE) ---
// The CLI can write `use tally_core::application::{run_project, answer_question, clean_project};`

pub use clean::clean_project;
pub use explain::answer_question;
pub use pipeline::{AnalysisOutcome, RunOptions, run_analysis, run_project};
pub use ports::ReasoningGateway;
