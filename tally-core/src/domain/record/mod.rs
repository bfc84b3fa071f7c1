// tally-core/src/domain/record/mod.rs

pub mod normalizer;
pub mod raw;
pub mod transaction;

pub use normalizer::{InvalidRowPolicy, NormalizedBatch, Normalizer};
pub use raw::RawRow;
pub use transaction::{Dimension, LineItem, MAX_AMOUNT, MAX_AMOUNT_SCALE, TransactionRecord};
