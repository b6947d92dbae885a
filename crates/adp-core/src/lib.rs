//! Core types for the ADP narrow-model router.
//!
//! This crate holds the data model shared by the routing engine and its
//! callers: worker records, routing requests and decisions, the error
//! taxonomy and the TOML-backed router configuration.

/// Router configuration and TOML persistence.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Poison-tolerant locking helpers.
pub mod sync;
/// Workers, requests, decisions and their enumerations.
pub mod types;

pub use config::{DomainConfig, HealthConfig, LoadConfig, RouterConfig, SelectionConfig};
pub use error::{Result, RoutingError};
pub use sync::IgnoreLock;
pub use types::{
    Domain, HealthState, Priority, RoutingDecision, RoutingRequest, SelectionMethod, Worker,
    WorkerId,
};
