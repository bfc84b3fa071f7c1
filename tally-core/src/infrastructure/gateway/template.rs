// tally-core/src/infrastructure/gateway/template.rs
//
// Deterministic reference gateway. Questions are routed by keyword to a
// minijinja template; numbers only enter the text through `cite(subject)`,
// which looks the subject up in the report and emits citation markup.

use async_trait::async_trait;
use minijinja::{Environment, context};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::application::ports::ReasoningGateway;
use crate::domain::guard::{Subject, ValidationReport};
use crate::domain::metrics::{MetricValue, round_half_even};
use crate::error::TallyError;
use crate::infrastructure::error::InfrastructureError;

const TOP_FINDINGS: usize = 3;

const SUMMARY_TMPL: &str = r#"{% if summary %}Business health score: {{ cite("summary/health_score") }}.
Overall profit margin stands at {{ cite("summary/profit_margin_pct") }}% on revenue of {{ cite("summary/total_revenue") }}.
However, {{ cite("summary/loss_order_pct") }}% of orders are loss-making.
{% if highest %}The highest structural inefficiency is observed in the `{{ highest }}` {{ risk_dimension }}, where approximately {{ cite("summary/highest_loss_ratio_pct") }}% of orders generate losses.
{% endif %}Risk classification: {{ risk_level }}.
{% else %}Total sales: {{ cite("*/total_sales") }}. Total profit: {{ cite("*/total_profit") }}.
{% endif %}{% if findings %}Top leakage findings:
{% for f in findings %}- `{{ f.id }}` {{ f.kind }} on `{{ f.subject }}`, severity {{ cite("finding:" ~ f.id ~ "/severity") }}
{% endfor %}{% else %}No leakage findings.
{% endif %}"#;

const HEALTH_TMPL: &str = r#"{% if summary %}The overall business health score is {{ cite("summary/health_score") }}.{% else %}This report carries no health summary.{% endif %}"#;

const MARGIN_TMPL: &str = r#"The current profit margin is {{ cite("*/profit_margin_pct") }}%."#;

const LOSS_CATEGORY_TMPL: &str = r#"{% if highest %}The {{ risk_dimension }} with the highest structural inefficiency is `{{ highest }}` with approximately {{ cite("summary/highest_loss_ratio_pct") }}% loss-making orders.{% else %}No structural risk profile is available.{% endif %}"#;

const RISK_TMPL: &str = r#"{% if summary %}Risk classification is: {{ risk_level }}.{% else %}This report carries no risk profile.{% endif %}"#;

const FINDINGS_TMPL: &str = r#"{% if findings %}{% for f in findings %}- `{{ f.id }}` {{ f.kind }} on `{{ f.subject }}`, severity {{ cite("finding:" ~ f.id ~ "/severity") }}
{% endfor %}{% else %}No leakage findings.{% endif %}"#;

const FALLBACK_TMPL: &str = "Question not recognized. Please ask about health, margin, risk, loss categories or leakage findings.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Summary,
    Health,
    Margin,
    LossCategory,
    Risk,
    Findings,
    Fallback,
}

impl Route {
    fn of(question: &str) -> Self {
        let q = question.to_lowercase();
        if q.contains("summary") || q.contains("overview") || q.contains("executive") {
            Self::Summary
        } else if q.contains("health") {
            Self::Health
        } else if q.contains("margin") {
            Self::Margin
        } else if q.contains("loss") && q.contains("category") {
            Self::LossCategory
        } else if q.contains("risk") {
            Self::Risk
        } else if q.contains("leak") || q.contains("finding") {
            Self::Findings
        } else {
            Self::Fallback
        }
    }

    fn template(self) -> &'static str {
        match self {
            Self::Summary => "summary.txt",
            Self::Health => "health.txt",
            Self::Margin => "margin.txt",
            Self::LossCategory => "loss_category.txt",
            Self::Risk => "risk.txt",
            Self::Findings => "findings.txt",
            Self::Fallback => "fallback.txt",
        }
    }
}

#[derive(Serialize)]
struct FindingView {
    id: String,
    kind: &'static str,
    subject: String,
}

pub struct TemplateGateway {
    env: Environment<'static>,
}

impl TemplateGateway {
    pub fn new() -> Result<Self, InfrastructureError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("summary.txt", SUMMARY_TMPL)?;
        env.add_template("health.txt", HEALTH_TMPL)?;
        env.add_template("margin.txt", MARGIN_TMPL)?;
        env.add_template("loss_category.txt", LOSS_CATEGORY_TMPL)?;
        env.add_template("risk.txt", RISK_TMPL)?;
        env.add_template("findings.txt", FINDINGS_TMPL)?;
        env.add_template("fallback.txt", FALLBACK_TMPL)?;
        Ok(Self { env })
    }

    /// Renders the answer with a `cite` function bound to `report`.
    pub fn render(&self, report: &ValidationReport, question: &str) -> Result<String, InfrastructureError> {
        let route = Route::of(question);
        debug!(?route, "Question routed");

        let shared = Arc::new(report.clone());
        let mut env = self.env.clone();
        env.add_function("cite", move |subject: String| cite(&shared, &subject));

        let findings: Vec<FindingView> = report
            .findings()
            .iter()
            .take(TOP_FINDINGS)
            .map(|f| FindingView {
                id: f.finding_id.clone(),
                kind: f.leakage_type.as_str(),
                subject: f.subject.clone(),
            })
            .collect();

        let summary = report.summary();
        let ctx = context! {
            question => question,
            summary => summary.is_some(),
            risk_level => summary.map(|s| s.risk.risk_level.to_string()),
            risk_dimension => summary.map(|s| s.risk.dimension.as_str()),
            highest => summary.and_then(|s| s.risk.highest()).map(|h| h.value.clone()),
            findings => findings,
        };

        let tmpl = env.get_template(route.template())?;
        Ok(tmpl.render(ctx)?.trim().to_string())
    }
}

fn cite(report: &ValidationReport, subject: &str) -> Result<String, minijinja::Error> {
    let parsed: Subject = subject.parse().map_err(|e: crate::domain::error::DomainError| {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
    })?;
    Ok(match parsed.resolve(report) {
        Some(MetricValue::Value(v)) => {
            format!("[[{}|{}]]", round_half_even(v, report.rounding_places()), parsed)
        }
        Some(MetricValue::Degenerate) | None => "n/a".to_string(),
    })
}

#[async_trait]
impl ReasoningGateway for TemplateGateway {
    #[instrument(skip(self, report), fields(hash = %report.content_hash()))]
    async fn explain(&self, report: &ValidationReport, question: &str) -> Result<String, TallyError> {
        Ok(self.render(report, question)?)
    }

    fn gateway_name(&self) -> &str {
        "template"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::guard::{ValidationGuard, guard_text};
    use crate::domain::insights::HealthSummary;
    use crate::domain::leakage::{RuleConfig, detect};
    use crate::domain::metrics::{TimeBucket, compute};
    use crate::domain::record::Dimension;
    use crate::domain::record::transaction::fixtures::{line, record};
    use anyhow::Result;
    use rust_decimal_macros::dec;

    fn report() -> Result<ValidationReport> {
        let records = vec![
            record(line("order1", dec!(20), dec!(-5))),
            record(line("order2", dec!(50), dec!(10))),
            record(line("order3", dec!(60), dec!(20))),
        ];
        let sets = compute(&records, &[Dimension::Category], TimeBucket::None, 4);
        let findings = detect(&records, &sets, &RuleConfig::default())?;
        let summary = HealthSummary::from_records(&records, Dimension::Category, 4);
        Ok(ValidationGuard::new(4).seal_with_summary(sets, findings, summary)?)
    }

    #[test]
    fn test_routing_follows_keywords() {
        assert_eq!(Route::of("Give me an executive summary"), Route::Summary);
        assert_eq!(Route::of("How healthy? health please"), Route::Health);
        assert_eq!(Route::of("What is the margin?"), Route::Margin);
        assert_eq!(Route::of("Which category has the most loss?"), Route::LossCategory);
        assert_eq!(Route::of("What is our risk?"), Route::Risk);
        assert_eq!(Route::of("Where do we leak money?"), Route::Findings);
        assert_eq!(Route::of("Tell me a joke"), Route::Fallback);
    }

    #[test]
    fn test_every_answer_passes_the_guard() -> Result<()> {
        let report = report()?;
        let gateway = TemplateGateway::new()?;
        for question in [
            "summary",
            "health",
            "margin",
            "loss by category",
            "risk",
            "leakage findings",
            "weather",
        ] {
            let raw = gateway.render(&report, question)?;
            let released = guard_text(&report, &raw);
            assert!(released.is_ok(), "{}: {:?}\n{}", question, released.err(), raw);
        }
        Ok(())
    }

    #[test]
    fn test_margin_answer_cites_top_level_set() -> Result<()> {
        let report = report()?;
        let raw = TemplateGateway::new()?.render(&report, "margin")?;
        // 25 / 130
        assert_eq!(raw, "The current profit margin is [[19.23|*/profit_margin_pct]]%.");
        Ok(())
    }
}
