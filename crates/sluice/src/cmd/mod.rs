//! Command implementations for the Sluice CLI

pub mod journal;
pub mod serve;
