//! Workload driver library for hierarchical memory pools.

pub mod app;
pub mod config;
pub mod errors;
pub mod report;
pub mod version;
pub mod workload;
