// tally-core/src/application/ports/gateway.rs

use async_trait::async_trait;

use crate::domain::guard::ValidationReport;
use crate::error::TallyError;

/// Turns a sealed report and a question into explanatory text.
///
/// Implementations are untrusted. Every number they emit must be written as
/// `[[value|subject]]`; identifiers that contain digits go inside backticks.
/// Output is only released after `answer_question` has checked it.
#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    async fn explain(&self, report: &ValidationReport, question: &str) -> Result<String, TallyError>;

    fn gateway_name(&self) -> &str;
}
