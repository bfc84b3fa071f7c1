// tally-core/src/lib.rs

#![allow(missing_docs)]
// Memory safety
#![deny(unsafe_code)]
// Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// Performance
#![warn(clippy::perf)]

// --- HEXAGONAL MODULES ---

// 1. Ports: contracts the core needs from the outside (row sources).
pub mod ports;

// 2. Domain: records, metrics, leakage rules, insights and the validation guard.
// Depends on nothing else in the crate.
pub mod domain;

// 3. Infrastructure: config files, DuckDB/JSON row sources, template gateway, persistence.
pub mod infrastructure;

// 4. Application: pipeline, guarded explanations, clean.
pub mod application;

pub mod error;

// --- FACADE ---
pub use error::TallyError;
