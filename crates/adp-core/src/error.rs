//! Error types for the routing system.

use crate::types::{Domain, WorkerId};
use core::result::Result as CoreResult;
use std::io::Error as IoError;
use thiserror::Error;
use toml::de::Error as TomlDeError;
use toml::ser::Error as TomlSerError;

/// Result type alias using `RoutingError`.
pub type Result<T> = CoreResult<T, RoutingError>;

/// Errors that can occur while registering, routing or configuring workers.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Lookup of an unknown worker id
    #[error("Worker not found: {0}")]
    NotFound(WorkerId),

    /// Domain pool is empty or every worker in it is unavailable
    #[error("No healthy workers available in domain {domain}")]
    NoEligibleWorkers {
        /// Domain that had no eligible workers
        domain: Domain,
    },

    /// Priority string that does not name a known priority
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    /// Worker record violates its field invariants
    #[error("Invalid worker: {0}")]
    InvalidWorker(String),

    /// Configuration is invalid or missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// TOML deserialization failed
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] TomlDeError),

    /// TOML serialization failed
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] TomlSerError),
}

impl RoutingError {
    /// Determines whether the caller may retry the operation later.
    ///
    /// Only an exhausted pool qualifies: in-flight requests may complete and
    /// free capacity. The router itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoEligibleWorkers { .. })
    }
}
