//! Routing engine for domain-specialized narrow models.
//!
//! Workers are grouped into per-domain pools. Each request is routed to a
//! primary worker chosen by a priority-dependent strategy (round-robin,
//! weighted, or a hybrid of both), optionally accompanied by validation
//! workers drawn from the same domain. The router tracks in-flight load and
//! lazily refreshed health for every worker.
//!
//! ```no_run
//! use adp_router::{Priority, Router, RouterConfig, RoutingRequest, Worker};
//!
//! let router = Router::new(RouterConfig::default());
//! router.register(Worker::new("cardio-1", "cardiology", "http://cardio-1:8080", 0.9));
//!
//! let request = RoutingRequest::new("cardiology").with_priority(Priority::High);
//! let decision = router.route(&request);
//! // ... dispatch to decision.primary and decision.validators ...
//! router.complete_decision(&decision);
//! ```

/// Reachability probes and lazy health recomputation.
pub mod health;
/// Background release of expired load leases.
pub mod reaper;
/// Worker records and per-domain pools.
pub mod registry;
/// The request router.
pub mod router;
/// Primary and validator selection strategies.
pub mod selection;
/// Aggregated routing statistics.
pub mod stats;

pub use adp_core::{
    Domain, DomainConfig, HealthState, Priority, Result, RouterConfig, RoutingDecision,
    RoutingError, RoutingRequest, SelectionConfig, SelectionMethod, Worker, WorkerId,
};
pub use health::{AlwaysReachable, HealthEvaluator, HealthProbe, RandomProbe, StaticProbe};
pub use reaper::LoadReaper;
pub use registry::Registry;
pub use router::Router;
pub use stats::{DomainStats, RoutingStats, SystemHealth};
