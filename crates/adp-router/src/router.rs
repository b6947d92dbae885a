//! Request routing over domain pools.
//!
//! All routing state lives behind one mutex, so a routing decision and the
//! load increments it causes form a single critical section: concurrent
//! callers never observe each other's half-applied cursor advance or load
//! update.

use crate::health::{AlwaysReachable, HealthEvaluator, HealthProbe};
use crate::registry::Registry;
use crate::selection::{round_robin_select, weighted_select};
use crate::stats::RoutingStats;
use adp_core::{
    Domain, HealthState, IgnoreLock as _, Priority, Result, RouterConfig, RoutingDecision,
    RoutingError, RoutingRequest, SelectionConfig, SelectionMethod, Worker, WorkerId,
};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Reclaimed request ids remembered per worker for absorbing late completions.
const RECLAIMED_HISTORY: usize = 1024;

/// One outstanding load increment.
struct Lease {
    request_id: String,
    issued: Instant,
}

/// Load increments of one worker, tracked per request.
#[derive(Default)]
struct LeaseBook {
    /// Outstanding increments, oldest first
    active: VecDeque<Lease>,
    /// Requests whose increment was reclaimed but not yet completed
    reclaimed: VecDeque<String>,
}

impl LeaseBook {
    fn is_empty(&self) -> bool {
        self.active.is_empty() && self.reclaimed.is_empty()
    }
}

/// Mutable routing state guarded by the router's lock.
struct RouterState {
    registry: Registry,
    leases: HashMap<WorkerId, LeaseBook>,
    rng: StdRng,
}

impl RouterState {
    fn select_primary(
        &mut self,
        candidates: &[WorkerId],
        request: &RoutingRequest,
        config: &SelectionConfig,
    ) -> (Option<WorkerId>, SelectionMethod) {
        match request.priority {
            Priority::Urgent => (
                weighted_select(candidates, &self.registry, config, &mut self.rng),
                SelectionMethod::WeightedUrgent,
            ),
            Priority::High => {
                let cursor = self.registry.cursor_mut(&request.domain);
                let Some(rotated) = round_robin_select(candidates, cursor) else {
                    return (None, SelectionMethod::HybridHigh);
                };
                let mut finalists = vec![rotated];
                if let Some(weighted) =
                    weighted_select(candidates, &self.registry, config, &mut self.rng)
                    && !finalists.contains(&weighted)
                {
                    finalists.push(weighted);
                }

                let primary = if finalists.len() == 1 {
                    finalists.pop()
                } else {
                    weighted_select(&finalists, &self.registry, config, &mut self.rng)
                };
                (primary, SelectionMethod::HybridHigh)
            }
            Priority::Normal => {
                let cursor = self.registry.cursor_mut(&request.domain);
                (
                    round_robin_select(candidates, cursor),
                    SelectionMethod::RoundRobinNormal,
                )
            }
        }
    }

    fn select_validators(
        &mut self,
        candidates: &[WorkerId],
        primary: &WorkerId,
        config: &SelectionConfig,
    ) -> Vec<WorkerId> {
        let mut pool: Vec<WorkerId> = candidates
            .iter()
            .filter(|id| *id != primary)
            .cloned()
            .collect();
        let mut validators = Vec::with_capacity(config.max_validators.min(pool.len()));

        while validators.len() < config.max_validators && !pool.is_empty() {
            let Some(pick) = weighted_select(&pool, &self.registry, config, &mut self.rng) else {
                break;
            };
            pool.retain(|id| id != &pick);
            validators.push(pick);
        }

        validators
    }

    fn acquire(&mut self, id: &WorkerId, request_id: &str, now: Instant) {
        let Ok(worker) = self.registry.get_mut(id) else {
            return;
        };
        worker.current_load = worker.current_load.saturating_add(1);
        if worker.state == HealthState::Healthy && worker.is_at_capacity() {
            worker.state = HealthState::Degraded;
            debug!(worker = %id, load = worker.current_load, "worker reached capacity");
        }
        self.leases.entry(id.clone()).or_default().active.push_back(Lease {
            request_id: request_id.to_owned(),
            issued: now,
        });
    }

    /// Releases the increment made for one request.
    ///
    /// Completions whose lease was already reclaimed, or never existed, leave
    /// the load untouched.
    fn release_request(&mut self, id: &WorkerId, request_id: &str) -> Result<()> {
        let worker = self.registry.get_mut(id)?;
        let Some(book) = self.leases.get_mut(id) else {
            debug!(worker = %id, request = request_id, "no lease for completed request");
            return Ok(());
        };

        if let Some(position) = book
            .active
            .iter()
            .position(|lease| lease.request_id == request_id)
        {
            book.active.remove(position);
            release_load(worker);
        } else if let Some(position) = book
            .reclaimed
            .iter()
            .position(|reclaimed| reclaimed == request_id)
        {
            book.reclaimed.remove(position);
            debug!(worker = %id, request = request_id, "completion after reclaim ignored");
        } else {
            debug!(worker = %id, request = request_id, "no lease for completed request");
        }

        if book.is_empty() {
            self.leases.remove(id);
        }
        Ok(())
    }

    /// Releases one increment without knowing which request it belongs to.
    ///
    /// A pending reclaimed completion absorbs the call; otherwise the oldest
    /// lease is released.
    fn release_any(&mut self, id: &WorkerId) -> Result<()> {
        let worker = self.registry.get_mut(id)?;
        let book = self.leases.get_mut(id);

        if let Some(book) = book {
            if book.reclaimed.pop_front().is_some() {
                debug!(worker = %id, "completion after reclaim ignored");
            } else {
                book.active.pop_front();
                release_load(worker);
            }
            if book.is_empty() {
                self.leases.remove(id);
            }
        } else {
            release_load(worker);
        }
        Ok(())
    }

    fn reclaim(&mut self, timeout: Duration, now: Instant) -> usize {
        let mut reclaimed = 0;
        for (id, book) in &mut self.leases {
            let (expired, active): (VecDeque<Lease>, VecDeque<Lease>) =
                mem::take(&mut book.active)
                    .into_iter()
                    .partition(|lease| now.saturating_duration_since(lease.issued) > timeout);
            book.active = active;

            for lease in expired {
                if let Ok(worker) = self.registry.get_mut(id) {
                    release_load(worker);
                }
                warn!(
                    worker = %id,
                    request = %lease.request_id,
                    "reclaimed load from an uncompleted request"
                );
                book.reclaimed.push_back(lease.request_id);
                if book.reclaimed.len() > RECLAIMED_HISTORY {
                    book.reclaimed.pop_front();
                }
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

fn release_load(worker: &mut Worker) {
    worker.current_load = worker.current_load.saturating_sub(1);
    if worker.state == HealthState::Degraded && !worker.is_at_capacity() {
        worker.state = HealthState::Healthy;
    }
}

/// Routes requests to narrow-model workers and tracks their load.
///
/// Every load increment made by [`Router::route`] must be released with
/// [`Router::complete_request`] (or [`Router::complete_decision`]) once the
/// worker has finished; with a configured lease timeout,
/// [`Router::reclaim_expired`] releases increments that were never completed.
pub struct Router {
    config: RouterConfig,
    evaluator: HealthEvaluator,
    state: Mutex<RouterState>,
}

impl Router {
    /// Creates a router that treats every worker as reachable.
    ///
    /// Workers listed in the configuration are registered immediately.
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        Self::with_probe(config, Arc::new(AlwaysReachable))
    }

    /// Creates a router with a custom reachability probe.
    #[must_use]
    pub fn with_probe(config: RouterConfig, probe: Arc<dyn HealthProbe>) -> Self {
        Self::with_rng(config, probe, StdRng::from_entropy())
    }

    /// Creates a router with a custom probe and random source.
    ///
    /// A seeded `rng` makes weighted selection reproducible.
    #[must_use]
    pub fn with_rng(config: RouterConfig, probe: Arc<dyn HealthProbe>, rng: StdRng) -> Self {
        let evaluator = HealthEvaluator::new(config.health.check_interval(), probe);
        let workers = config.workers.clone();
        let router = Self {
            config,
            evaluator,
            state: Mutex::new(RouterState {
                registry: Registry::new(),
                leases: HashMap::new(),
                rng,
            }),
        };
        for worker in workers {
            router.register(worker);
        }
        router
    }

    /// Validates the configuration and builds a router from it.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation.
    pub fn from_config(config: RouterConfig, probe: Arc<dyn HealthProbe>) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_probe(config, probe))
    }

    /// The configuration this router was built with.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Maps a free-form domain name onto a configured domain.
    pub fn resolve_domain(&self, name: &str) -> Domain {
        self.config.domains.resolve(name)
    }

    /// Inserts or replaces a worker. Never fails.
    ///
    /// A replaced worker starts with the new record's load, so its
    /// outstanding leases are dropped.
    pub fn register(&self, worker: Worker) {
        if let Err(error) = worker.validate() {
            warn!(%error, "registering worker with an invalid profile");
        }
        if !self.config.domains.contains(&worker.domain) {
            warn!(worker = %worker.id, domain = %worker.domain, "worker domain is not configured");
        }
        info!(
            worker = %worker.id,
            domain = %worker.domain,
            endpoint = %worker.endpoint,
            "registered worker"
        );

        let mut state = self.state.lock_ignore_poison();
        state.leases.remove(&worker.id);
        state.registry.register(worker);
    }

    /// Removes a worker and forgets its outstanding leases.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn deregister(&self, id: &WorkerId) -> Result<Worker> {
        let mut state = self.state.lock_ignore_poison();
        let worker = state.registry.deregister(id)?;
        state.leases.remove(id);
        info!(worker = %id, domain = %worker.domain, "deregistered worker");
        Ok(worker)
    }

    /// Snapshot of a worker record.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn get(&self, id: &WorkerId) -> Result<Worker> {
        self.state.lock_ignore_poison().registry.get(id).cloned()
    }

    /// Worker ids registered under `domain`, in registration order.
    pub fn pool_for(&self, domain: &Domain) -> Vec<WorkerId> {
        self.state.lock_ignore_poison().registry.pool_for(domain).to_vec()
    }

    /// Routable workers of `domain`, refreshing stale health first.
    pub fn healthy_candidates(&self, domain: &Domain) -> Vec<WorkerId> {
        self.healthy_candidates_at(domain, Instant::now())
    }

    /// [`Router::healthy_candidates`] evaluated at `now`.
    pub fn healthy_candidates_at(&self, domain: &Domain, now: Instant) -> Vec<WorkerId> {
        let mut state = self.state.lock_ignore_poison();
        self.evaluator
            .healthy_candidates(&mut state.registry, domain, now)
    }

    /// Forces a health recomputation and reports whether the worker is healthy.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn check_health(&self, id: &WorkerId) -> Result<bool> {
        self.check_health_at(id, Instant::now())
    }

    /// [`Router::check_health`] evaluated at `now`.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn check_health_at(&self, id: &WorkerId, now: Instant) -> Result<bool> {
        let mut state = self.state.lock_ignore_poison();
        let worker = state.registry.get_mut(id)?;
        Ok(self.evaluator.recompute(worker, now) == HealthState::Healthy)
    }

    /// Routes a request and increments load on every selected worker.
    pub fn route(&self, request: &RoutingRequest) -> RoutingDecision {
        self.route_at(request, Instant::now())
    }

    /// [`Router::route`] evaluated at `now`.
    pub fn route_at(&self, request: &RoutingRequest, now: Instant) -> RoutingDecision {
        let mut guard = self.state.lock_ignore_poison();
        let state = &mut *guard;

        let decision = self.decide(state, request, now);
        for id in decision.workers() {
            state.acquire(id, &decision.request_id, now);
        }

        debug!(
            request = %decision.request_id,
            domain = %request.domain,
            priority = %request.priority,
            method = %decision.method,
            primary = ?decision.primary,
            validators = ?decision.validators,
            "routed request"
        );
        decision
    }

    fn decide(
        &self,
        state: &mut RouterState,
        request: &RoutingRequest,
        now: Instant,
    ) -> RoutingDecision {
        if let Some(decision) = self.route_preferred(state, request, now) {
            return decision;
        }

        let candidates = self
            .evaluator
            .healthy_candidates(&mut state.registry, &request.domain, now);
        if candidates.is_empty() {
            return RoutingDecision::no_candidates(request.id.clone(), request.domain.clone());
        }

        let (primary, method) = state.select_primary(&candidates, request, &self.config.selection);
        let Some(primary) = primary else {
            return RoutingDecision::no_candidates(request.id.clone(), request.domain.clone());
        };
        let validators = if request.require_validation {
            state.select_validators(&candidates, &primary, &self.config.selection)
        } else {
            Vec::new()
        };

        RoutingDecision {
            request_id: request.id.clone(),
            primary: Some(primary),
            validators,
            method,
            total_available: candidates.len(),
            error: None,
        }
    }

    fn route_preferred(
        &self,
        state: &mut RouterState,
        request: &RoutingRequest,
        now: Instant,
    ) -> Option<RoutingDecision> {
        let preferred = request.preferred_worker.as_ref()?;
        let Ok(worker) = state.registry.get_mut(preferred) else {
            debug!(worker = %preferred, "preferred worker is not registered");
            return None;
        };
        self.evaluator.refresh_if_stale(worker, now);
        if !worker.is_routable() {
            debug!(worker = %preferred, state = %worker.state, "preferred worker is not routable");
            return None;
        }

        let (validators, method, total_available) = if request.require_validation {
            let candidates = self
                .evaluator
                .healthy_candidates(&mut state.registry, &request.domain, now);
            let validators = state.select_validators(&candidates, preferred, &self.config.selection);
            (validators, SelectionMethod::PreferredWithValidation, candidates.len())
        } else {
            (Vec::new(), SelectionMethod::PreferredOnly, 1)
        };

        Some(RoutingDecision {
            request_id: request.id.clone(),
            primary: Some(preferred.clone()),
            validators,
            method,
            total_available,
            error: None,
        })
    }

    /// Releases one unit of load on a worker, floored at zero.
    ///
    /// Unknown ids are ignored. When the worker has reclaimed leases whose
    /// requests have not reported back, the call is taken as one of those late
    /// completions and leaves the load untouched. Prefer
    /// [`Router::complete_decision`] or [`Router::complete_request_for`],
    /// which release exactly the lease of the finished request.
    pub fn complete_request(&self, id: &WorkerId) {
        if let Err(error) = self.try_complete_request(id) {
            debug!(%error, "ignoring completion");
        }
    }

    /// Releases one unit of load on a worker, floored at zero.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn try_complete_request(&self, id: &WorkerId) -> Result<()> {
        self.state.lock_ignore_poison().release_any(id)
    }

    /// Releases the load a worker took on for one request.
    ///
    /// A completion arriving after its lease was reclaimed, or repeated for
    /// the same request, does not touch the load.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn complete_request_for(&self, id: &WorkerId, request_id: &str) -> Result<()> {
        self.state
            .lock_ignore_poison()
            .release_request(id, request_id)
    }

    /// Releases the primary and every validator of a decision.
    pub fn complete_decision(&self, decision: &RoutingDecision) {
        let mut state = self.state.lock_ignore_poison();
        for id in decision.workers() {
            if let Err(error) = state.release_request(id, &decision.request_id) {
                debug!(%error, "ignoring completion");
            }
        }
    }

    /// Folds an observed response time into the worker's rolling average.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown ids and `InvalidWorker` for a negative
    /// or non-finite latency.
    pub fn record_response(&self, id: &WorkerId, latency_ms: f64) -> Result<()> {
        if !(latency_ms.is_finite() && latency_ms >= 0.0) {
            return Err(RoutingError::InvalidWorker(format!(
                "{id}: observed latency must be a non-negative number, got {latency_ms}"
            )));
        }
        let smoothing = self.config.load.response_time_smoothing;

        let mut state = self.state.lock_ignore_poison();
        let worker = state.registry.get_mut(id)?;
        worker.response_time_avg_ms = if worker.response_time_avg_ms > 0.0 {
            smoothing.mul_add(
                latency_ms - worker.response_time_avg_ms,
                worker.response_time_avg_ms,
            )
        } else {
            latency_ms
        };
        Ok(())
    }

    /// Replaces a worker's accuracy score, clamped to [0.0, 1.0].
    ///
    /// # Errors
    /// Returns `NotFound` for unknown ids and `InvalidWorker` for a non-finite score.
    pub fn set_accuracy(&self, id: &WorkerId, accuracy: f64) -> Result<()> {
        if !accuracy.is_finite() {
            return Err(RoutingError::InvalidWorker(format!(
                "{id}: accuracy must be finite, got {accuracy}"
            )));
        }
        let mut state = self.state.lock_ignore_poison();
        state.registry.get_mut(id)?.accuracy_score = accuracy.clamp(0.0, 1.0);
        Ok(())
    }

    /// Releases load increments older than the configured lease timeout.
    ///
    /// Returns the number of increments released; always 0 when no lease
    /// timeout is configured.
    pub fn reclaim_expired(&self, now: Instant) -> usize {
        let Some(timeout) = self.config.load.lease_timeout() else {
            return 0;
        };
        self.state.lock_ignore_poison().reclaim(timeout, now)
    }

    /// Aggregates per-domain worker counts and the overall health ratio.
    pub fn routing_stats(&self) -> RoutingStats {
        let state = self.state.lock_ignore_poison();
        RoutingStats::collect(&state.registry, &self.config.domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::StaticProbe;

    fn router_with(workers: Vec<Worker>, seed: u64) -> Router {
        let config = RouterConfig {
            workers,
            ..RouterConfig::default()
        };
        Router::with_rng(config, Arc::new(AlwaysReachable), StdRng::seed_from_u64(seed))
    }

    fn medical(id: &str) -> Worker {
        Worker::new(id, "medical", format!("http://{id}.example.com"), 0.8)
    }

    #[test]
    fn test_normal_priority_round_robins() {
        let router = router_with(vec![medical("a"), medical("b"), medical("c")], 1);
        let request = RoutingRequest::new("medical").with_validation(false);

        let primaries: Vec<WorkerId> = (0..4)
            .filter_map(|_| router.route(&request).primary)
            .collect();
        let expected: Vec<WorkerId> = ["a", "b", "c", "a"].into_iter().map(WorkerId::from).collect();
        assert_eq!(primaries, expected);
    }

    #[test]
    fn test_high_priority_with_single_candidate() {
        let router = router_with(vec![medical("only")], 5);
        let request = RoutingRequest::new("medical").with_priority(Priority::High);

        let decision = router.route(&request);
        assert_eq!(decision.method, SelectionMethod::HybridHigh);
        assert_eq!(decision.primary, Some(WorkerId::from("only")));
        assert!(decision.validators.is_empty());
    }

    #[test]
    fn test_load_reaches_capacity_marks_degraded() {
        let router = router_with(vec![medical("a").with_max_concurrent(1)], 2);
        let request = RoutingRequest::new("medical").with_validation(false);

        let decision = router.route(&request);
        let worker = router.get(&WorkerId::from("a")).unwrap();
        assert_eq!(worker.current_load, 1);
        assert_eq!(worker.state, HealthState::Degraded);

        router.complete_decision(&decision);
        let worker = router.get(&WorkerId::from("a")).unwrap();
        assert_eq!(worker.current_load, 0);
        assert_eq!(worker.state, HealthState::Healthy);
    }

    #[test]
    fn test_complete_request_floors_at_zero() {
        let router = router_with(vec![medical("a")], 3);
        let id = WorkerId::from("a");
        router.complete_request(&id);
        assert_eq!(router.get(&id).unwrap().current_load, 0);

        router.complete_request(&WorkerId::from("ghost"));
        assert!(matches!(
            router.try_complete_request(&WorkerId::from("ghost")),
            Err(RoutingError::NotFound(_))
        ));
    }

    #[test]
    fn test_record_response_smoothing() {
        let router = router_with(vec![medical("a")], 4);
        let id = WorkerId::from("a");

        router.record_response(&id, 500.0).unwrap();
        assert!((router.get(&id).unwrap().response_time_avg_ms - 500.0).abs() < 1e-9);

        router.record_response(&id, 1000.0).unwrap();
        assert!((router.get(&id).unwrap().response_time_avg_ms - 600.0).abs() < 1e-9);

        router.record_response(&id, -1.0).unwrap_err();
        router.record_response(&WorkerId::from("ghost"), 1.0).unwrap_err();
    }

    #[test]
    fn test_set_accuracy_clamps() {
        let router = router_with(vec![medical("a")], 4);
        let id = WorkerId::from("a");
        router.set_accuracy(&id, 1.7).unwrap();
        assert!((router.get(&id).unwrap().accuracy_score - 1.0).abs() < f64::EPSILON);
        router.set_accuracy(&id, f64::NAN).unwrap_err();
    }

    #[test]
    fn test_check_health_uses_probe() {
        let probe = Arc::new(StaticProbe::new());
        let config = RouterConfig {
            workers: vec![medical("a")],
            ..RouterConfig::default()
        };
        let router = Router::with_rng(
            config,
            Arc::clone(&probe) as Arc<dyn HealthProbe>,
            StdRng::seed_from_u64(9),
        );
        let id = WorkerId::from("a");

        assert!(router.check_health(&id).unwrap());
        probe.mark_down("a");
        assert!(!router.check_health(&id).unwrap());
        assert_eq!(router.get(&id).unwrap().state, HealthState::Unavailable);
        router.check_health(&WorkerId::from("ghost")).unwrap_err();
    }

    #[test]
    fn test_reclaim_expired_leases() {
        let mut config = RouterConfig {
            workers: vec![medical("a"), medical("b")],
            ..RouterConfig::default()
        };
        config.load.lease_timeout_secs = Some(60);
        let router = Router::with_rng(config, Arc::new(AlwaysReachable), StdRng::seed_from_u64(11));

        let start = Instant::now();
        let request = RoutingRequest::new("medical");
        let decision = router.route_at(&request, start);
        assert_eq!(decision.workers().count(), 2);

        assert_eq!(router.reclaim_expired(start + Duration::from_secs(30)), 0);
        assert_eq!(router.reclaim_expired(start + Duration::from_secs(61)), 2);
        for id in decision.workers() {
            assert_eq!(router.get(id).unwrap().current_load, 0);
        }
        assert_eq!(router.reclaim_expired(start + Duration::from_secs(120)), 0);
    }

    fn single_worker_with_lease_timeout(seed: u64) -> Router {
        let mut config = RouterConfig {
            workers: vec![medical("a").with_max_concurrent(1)],
            ..RouterConfig::default()
        };
        config.load.lease_timeout_secs = Some(60);
        Router::with_rng(config, Arc::new(AlwaysReachable), StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_late_completion_after_reclaim_keeps_inflight_load() {
        let router = single_worker_with_lease_timeout(15);
        let id = WorkerId::from("a");
        let request = RoutingRequest::new("medical").with_validation(false);

        let start = Instant::now();
        let first = router.route_at(&request.clone().with_id("first"), start);
        assert_eq!(router.reclaim_expired(start + Duration::from_secs(61)), 1);
        assert_eq!(router.get(&id).unwrap().current_load, 0);

        let second = router.route_at(&request.with_id("second"), start + Duration::from_secs(62));
        router.complete_decision(&first);

        let worker = router.get(&id).unwrap();
        assert_eq!(worker.current_load, 1);
        assert_eq!(worker.state, HealthState::Degraded);

        router.complete_decision(&second);
        let worker = router.get(&id).unwrap();
        assert_eq!(worker.current_load, 0);
        assert_eq!(worker.state, HealthState::Healthy);
    }

    #[test]
    fn test_id_only_completion_absorbed_after_reclaim() {
        let router = single_worker_with_lease_timeout(16);
        let id = WorkerId::from("a");
        let request = RoutingRequest::new("medical").with_validation(false);

        let start = Instant::now();
        let first = router.route_at(&request.clone().with_id("first"), start);
        assert!(first.is_routed());
        assert_eq!(router.reclaim_expired(start + Duration::from_secs(61)), 1);
        router.route_at(&request.with_id("second"), start + Duration::from_secs(62));

        router.complete_request(&id);
        assert_eq!(router.get(&id).unwrap().current_load, 1);

        router.complete_request(&id);
        assert_eq!(router.get(&id).unwrap().current_load, 0);
    }

    #[test]
    fn test_complete_request_for_releases_once() {
        let router = single_worker_with_lease_timeout(17);
        let id = WorkerId::from("a");
        let request = RoutingRequest::new("medical").with_validation(false);

        router.route(&request.clone().with_id("first"));
        router.route(&request.with_id("second"));
        assert_eq!(router.get(&id).unwrap().current_load, 2);

        router.complete_request_for(&id, "second").unwrap();
        router.complete_request_for(&id, "second").unwrap();
        assert_eq!(router.get(&id).unwrap().current_load, 1);

        router.complete_request_for(&id, "first").unwrap();
        assert_eq!(router.get(&id).unwrap().current_load, 0);
        router
            .complete_request_for(&WorkerId::from("ghost"), "first")
            .unwrap_err();
    }

    #[test]
    fn test_reclaim_disabled_by_default() {
        let router = router_with(vec![medical("a")], 12);
        let start = Instant::now();
        let decision = router.route_at(&RoutingRequest::new("medical"), start);
        assert!(decision.is_routed());
        assert_eq!(router.reclaim_expired(start + Duration::from_secs(3600)), 0);
        assert_eq!(router.get(&WorkerId::from("a")).unwrap().current_load, 1);
    }

    #[test]
    fn test_deregister_removes_from_routing() {
        let router = router_with(vec![medical("a"), medical("b")], 13);
        let removed = router.deregister(&WorkerId::from("a")).unwrap();
        assert_eq!(removed.id, WorkerId::from("a"));

        let request = RoutingRequest::new("medical").with_validation(false);
        for _ in 0..3 {
            assert_eq!(router.route(&request).primary, Some(WorkerId::from("b")));
        }
        router.deregister(&WorkerId::from("a")).unwrap_err();
    }

    #[test]
    fn test_resolve_domain_falls_back() {
        let router = router_with(Vec::new(), 14);
        assert_eq!(router.resolve_domain("Neurology"), Domain::new("neurology"));
        assert_eq!(router.resolve_domain("unknown"), Domain::new("medical"));
    }
}
