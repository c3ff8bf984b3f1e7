//! Maintenance coordination for managed properties: tenant service requests,
//! competitive vendor bidding, work order execution, and vendor matching.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
