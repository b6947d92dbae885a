//! Worker records, routing requests and routing decisions.

use crate::error::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

/// Unique identifier of a narrow-model worker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Creates a worker id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for WorkerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Domain partitioning workers into disjoint pools.
///
/// The set of known domains is configuration (see [`crate::config::DomainConfig`]);
/// names are normalized to trimmed lowercase so `"Cardiology"` and
/// `"cardiology"` address the same pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Creates a normalized domain name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// Borrows the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Domain {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for Domain {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Health state of a worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Reachable with spare capacity
    #[default]
    Healthy,
    /// Reachable but at or over capacity
    Degraded,
    /// Failed the reachability probe
    Unavailable,
}

impl HealthState {
    /// Whether a worker in this state may receive requests.
    #[must_use]
    pub fn is_routable(self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

impl Display for HealthState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

/// Request priority level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Ordinary traffic, spread fairly with round-robin
    #[default]
    Normal,
    /// Round-robin candidate refined by weighted selection
    High,
    /// Pure weighted selection favouring fast, accurate, idle workers
    Urgent,
}

impl Priority {
    /// Parses a priority, treating anything unrecognized as [`Priority::Normal`].
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|error: RoutingError| {
            warn!(%error, "falling back to normal priority");
            Self::Normal
        })
    }
}

impl FromStr for Priority {
    type Err = RoutingError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(RoutingError::InvalidPriority(value.to_owned())),
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        f.write_str(label)
    }
}

fn default_accuracy() -> f64 {
    0.9
}

fn default_max_concurrent() -> u32 {
    10
}

/// A narrow-model worker and its live routing state.
///
/// Static profile fields are deserializable so worker pools can be declared in
/// configuration; runtime fields (`current_load`, `last_health_check`) always
/// start fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker id
    pub id: WorkerId,
    /// Domain pool the worker belongs to
    pub domain: Domain,
    /// Opaque endpoint reference, carried as metadata only
    pub endpoint: String,
    /// Capability tags
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Configured base weight in (0.0, 1.0]
    pub base_weight: f64,
    /// Current health state
    #[serde(default)]
    pub state: HealthState,
    /// Rolling average response time in milliseconds (0 = unknown)
    #[serde(default)]
    pub response_time_avg_ms: f64,
    /// Accuracy score in [0.0, 1.0]
    #[serde(default = "default_accuracy")]
    pub accuracy_score: f64,
    /// When health was last recomputed (`None` = never)
    #[serde(skip)]
    pub last_health_check: Option<Instant>,
    /// Requests currently in flight
    #[serde(skip)]
    pub current_load: u32,
    /// Maximum concurrent requests before the worker counts as degraded
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

impl Worker {
    /// Creates a healthy, idle worker with default metrics.
    #[must_use]
    pub fn new(
        id: impl Into<WorkerId>,
        domain: impl Into<Domain>,
        endpoint: impl Into<String>,
        base_weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            endpoint: endpoint.into(),
            capabilities: BTreeSet::new(),
            base_weight,
            state: HealthState::Healthy,
            response_time_avg_ms: 0.0,
            accuracy_score: default_accuracy(),
            last_health_check: None,
            current_load: 0,
            max_concurrent: default_max_concurrent(),
        }
    }

    /// Sets the capability tags.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the average response time in milliseconds.
    #[must_use]
    pub fn with_response_time_avg(mut self, response_time_avg_ms: f64) -> Self {
        self.response_time_avg_ms = response_time_avg_ms;
        self
    }

    /// Sets the accuracy score.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy_score: f64) -> Self {
        self.accuracy_score = accuracy_score;
        self
    }

    /// Sets the concurrency capacity.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Sets the health state.
    #[must_use]
    pub fn with_state(mut self, state: HealthState) -> Self {
        self.state = state;
        self
    }

    /// Whether the worker may currently receive requests.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        self.state.is_routable()
    }

    /// Whether in-flight load has reached capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.current_load >= self.max_concurrent
    }

    /// Whether the last health check is older than `interval` (or never ran).
    #[must_use]
    pub fn needs_health_check(&self, now: Instant, interval: Duration) -> bool {
        self.last_health_check
            .is_none_or(|checked| now.saturating_duration_since(checked) > interval)
    }

    /// Checks the field invariants of the static profile.
    ///
    /// # Errors
    /// Returns `InvalidWorker` describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(RoutingError::InvalidWorker("id must not be empty".to_owned()));
        }
        if !(self.base_weight > 0.0 && self.base_weight <= 1.0) {
            return Err(RoutingError::InvalidWorker(format!(
                "{}: base weight must be in (0.0, 1.0], got {}",
                self.id, self.base_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.accuracy_score) {
            return Err(RoutingError::InvalidWorker(format!(
                "{}: accuracy must be in [0.0, 1.0], got {}",
                self.id, self.accuracy_score
            )));
        }
        if !self.response_time_avg_ms.is_finite() || self.response_time_avg_ms < 0.0 {
            return Err(RoutingError::InvalidWorker(format!(
                "{}: response time must be a non-negative number, got {}",
                self.id, self.response_time_avg_ms
            )));
        }
        if self.max_concurrent == 0 {
            return Err(RoutingError::InvalidWorker(format!(
                "{}: max concurrent must be positive",
                self.id
            )));
        }
        Ok(())
    }
}

/// A request to be routed to a domain's workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRequest {
    /// Unique request id
    pub id: String,
    /// Target domain
    pub domain: Domain,
    /// Priority level
    #[serde(default)]
    pub priority: Priority,
    /// Worker to use as primary if it is routable
    #[serde(default)]
    pub preferred_worker: Option<WorkerId>,
    /// Whether validation workers should be selected
    #[serde(default = "default_require_validation")]
    pub require_validation: bool,
}

fn default_require_validation() -> bool {
    true
}

impl RoutingRequest {
    /// Creates a normal-priority request with validation and a fresh id.
    #[must_use]
    pub fn new(domain: impl Into<Domain>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            domain: domain.into(),
            priority: Priority::Normal,
            preferred_worker: None,
            require_validation: default_require_validation(),
        }
    }

    /// Replaces the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the preferred worker.
    #[must_use]
    pub fn with_preferred_worker(mut self, worker: impl Into<WorkerId>) -> Self {
        self.preferred_worker = Some(worker.into());
        self
    }

    /// Enables or disables validation-worker selection.
    #[must_use]
    pub fn with_validation(mut self, require_validation: bool) -> Self {
        self.require_validation = require_validation;
        self
    }
}

/// How the primary worker of a decision was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// Preferred worker with validators
    #[serde(rename = "preferred + validation")]
    PreferredWithValidation,
    /// Preferred worker without validators
    #[serde(rename = "preferred only")]
    PreferredOnly,
    /// Domain had no routable workers
    #[serde(rename = "no candidates available")]
    NoCandidates,
    /// Weighted selection for urgent traffic
    #[serde(rename = "weighted-urgent")]
    WeightedUrgent,
    /// Round-robin refined by weighted selection for high traffic
    #[serde(rename = "hybrid-high")]
    HybridHigh,
    /// Round-robin for normal traffic
    #[serde(rename = "round-robin-normal")]
    RoundRobinNormal,
}

impl SelectionMethod {
    /// Stable label used in logs and serialized decisions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreferredWithValidation => "preferred + validation",
            Self::PreferredOnly => "preferred only",
            Self::NoCandidates => "no candidates available",
            Self::WeightedUrgent => "weighted-urgent",
            Self::HybridHigh => "hybrid-high",
            Self::RoundRobinNormal => "round-robin-normal",
        }
    }
}

impl Display for SelectionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Id of the routed request
    pub request_id: String,
    /// Worker producing the authoritative response
    pub primary: Option<WorkerId>,
    /// Cross-checking workers, in selection order, never containing the primary
    pub validators: Vec<WorkerId>,
    /// How the primary was chosen
    pub method: SelectionMethod,
    /// Number of routable candidates considered
    pub total_available: usize,
    /// Explanation when no primary could be chosen
    pub error: Option<String>,
}

impl RoutingDecision {
    /// Builds the empty decision returned when a domain has no routable workers.
    #[must_use]
    pub fn no_candidates(request_id: impl Into<String>, domain: Domain) -> Self {
        Self {
            request_id: request_id.into(),
            primary: None,
            validators: Vec::new(),
            method: SelectionMethod::NoCandidates,
            total_available: 0,
            error: Some(RoutingError::NoEligibleWorkers { domain }.to_string()),
        }
    }

    /// Whether a primary worker was assigned.
    #[must_use]
    pub fn is_routed(&self) -> bool {
        self.primary.is_some()
    }

    /// Every worker whose load was incremented: primary first, then validators.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerId> {
        self.primary.iter().chain(self.validators.iter())
    }
}
