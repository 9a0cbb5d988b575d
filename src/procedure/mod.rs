//! Execution lifecycle of stored procedures: parameter binding, transaction demarcation and outcome reporting.

pub mod application;
pub mod domain;
pub mod error;
pub mod params;
pub mod registry;
