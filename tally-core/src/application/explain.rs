// tally-core/src/application/explain.rs

use tracing::{info, instrument};

use crate::application::ports::ReasoningGateway;
use crate::domain::guard::{GuardedText, ValidationReport, guard_text};
use crate::error::TallyError;

/// Asks the gateway and releases its answer only if every number in it is a
/// verified citation of `report`.
#[instrument(skip(gateway, report), fields(gateway = gateway.gateway_name(), hash = %report.content_hash()))]
pub async fn answer_question(
    gateway: &dyn ReasoningGateway,
    report: &ValidationReport,
    question: &str,
) -> Result<GuardedText, TallyError> {
    let raw = gateway.explain(report, question).await?;
    let released = guard_text(report, &raw)?;
    info!(citations = released.citations.len(), "Answer released");
    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::guard::ValidationGuard;
    use crate::domain::metrics::{TimeBucket, compute};
    use crate::domain::record::transaction::fixtures::{line, record};
    use crate::infrastructure::gateway::TemplateGateway;
    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct Scripted(&'static str);

    #[async_trait]
    impl ReasoningGateway for Scripted {
        async fn explain(&self, _: &ValidationReport, _: &str) -> Result<String, TallyError> {
            Ok(self.0.to_string())
        }

        fn gateway_name(&self) -> &str {
            "scripted"
        }
    }

    fn report() -> Result<ValidationReport> {
        let records = vec![
            record(line("order1", dec!(20), dec!(-5))),
            record(line("order2", dec!(50), dec!(10))),
        ];
        let sets = compute(&records, &[], TimeBucket::None, 4);
        Ok(ValidationGuard::new(4).seal(sets, vec![])?)
    }

    #[tokio::test]
    async fn test_verified_answer_is_released_with_hash() -> Result<()> {
        let report = report()?;
        let answer = answer_question(&Scripted("Sales were [[70|*/total_sales]]."), &report, "q").await?;
        assert_eq!(answer.text, "Sales were 70.");
        assert_eq!(answer.report_hash, report.content_hash());
        assert_eq!(answer.generation, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_invented_number_is_a_hard_rejection() -> Result<()> {
        let report = report()?;
        let res = answer_question(&Scripted("Sales were [[75|*/total_sales]]."), &report, "q").await;
        assert!(res.as_ref().is_err_and(TallyError::is_guard_rejection));

        let res = answer_question(&Scripted("Sales were about 70."), &report, "q").await;
        assert!(res.as_ref().is_err_and(TallyError::is_guard_rejection));
        Ok(())
    }

    #[tokio::test]
    async fn test_template_gateway_answers_pass() -> Result<()> {
        let report = report()?;
        let gateway = TemplateGateway::new()?;
        let answer = answer_question(&gateway, &report, "executive summary").await?;
        assert!(answer.text.contains("Total sales: 70."), "{}", answer.text);
        Ok(())
    }
}
