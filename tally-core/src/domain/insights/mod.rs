// tally-core/src/domain/insights/mod.rs

pub mod health;

pub use health::{
    HealthSummary, RiskLevel, RiskProfile, SegmentRisk, Stability, WorstPerformer, health_score,
};
