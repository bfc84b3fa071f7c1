// tally/src/commands/mod.rs

pub mod ask;
pub mod clean;
pub mod run;
pub mod summary;
pub mod verify;
