//! CLI command implementations.

pub mod check;
pub mod config;
pub mod ingest;
pub mod output;
pub mod remove;
