//! Health evaluation with lazily refreshed worker state.
//!
//! Reachability is an external signal supplied through [`HealthProbe`]; the
//! evaluator only combines it with the worker's load to derive a
//! [`HealthState`].

use crate::registry::Registry;
use adp_core::{Domain, HealthState, IgnoreLock as _, Worker, WorkerId};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// External reachability signal for a worker.
pub trait HealthProbe: Send + Sync {
    /// Whether the worker's endpoint currently answers.
    fn is_reachable(&self, worker: &Worker) -> bool;
}

/// Probe that reports every worker as reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl HealthProbe for AlwaysReachable {
    fn is_reachable(&self, _worker: &Worker) -> bool {
        true
    }
}

/// Probe driven by an explicit set of unreachable workers.
#[derive(Debug, Default)]
pub struct StaticProbe {
    unreachable: Mutex<HashSet<WorkerId>>,
}

impl StaticProbe {
    /// Creates a probe with every worker reachable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `id` as unreachable from now on.
    pub fn mark_down(&self, id: impl Into<WorkerId>) {
        self.unreachable.lock_ignore_poison().insert(id.into());
    }

    /// Reports `id` as reachable again.
    pub fn mark_up(&self, id: &WorkerId) {
        self.unreachable.lock_ignore_poison().remove(id);
    }
}

impl HealthProbe for StaticProbe {
    fn is_reachable(&self, worker: &Worker) -> bool {
        !self.unreachable.lock_ignore_poison().contains(&worker.id)
    }
}

/// Probe simulating an uptime fraction with a seedable random source.
#[derive(Debug)]
pub struct RandomProbe {
    uptime: f64,
    rng: Mutex<StdRng>,
}

impl RandomProbe {
    /// Simulated uptime used by [`RandomProbe::default`].
    pub const DEFAULT_UPTIME: f64 = 0.95;

    /// Creates a probe that succeeds with probability `uptime`.
    #[must_use]
    pub fn new(uptime: f64, rng: StdRng) -> Self {
        Self {
            uptime: uptime.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    /// Creates a reproducible probe from a seed.
    #[must_use]
    pub fn seeded(uptime: f64, seed: u64) -> Self {
        Self::new(uptime, StdRng::seed_from_u64(seed))
    }
}

impl Default for RandomProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_UPTIME, StdRng::from_entropy())
    }
}

impl HealthProbe for RandomProbe {
    fn is_reachable(&self, _worker: &Worker) -> bool {
        self.rng.lock_ignore_poison().gen_bool(self.uptime)
    }
}

/// Derives worker health from reachability and load, refreshing lazily.
#[derive(Clone)]
pub struct HealthEvaluator {
    interval: Duration,
    probe: Arc<dyn HealthProbe>,
}

impl HealthEvaluator {
    /// Creates an evaluator that rechecks workers older than `interval`.
    pub fn new(interval: Duration, probe: Arc<dyn HealthProbe>) -> Self {
        Self { interval, probe }
    }

    /// Recheck interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Recomputes a worker's state and stamps the check time.
    pub fn recompute(&self, worker: &mut Worker, now: Instant) -> HealthState {
        let previous = worker.state;
        worker.state = if !self.probe.is_reachable(worker) {
            HealthState::Unavailable
        } else if worker.is_at_capacity() {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };
        worker.last_health_check = Some(now);

        if worker.state == HealthState::Unavailable && previous != HealthState::Unavailable {
            warn!(worker = %worker.id, domain = %worker.domain, "worker became unavailable");
        } else {
            debug!(
                worker = %worker.id,
                state = %worker.state,
                load = worker.current_load,
                "health recomputed"
            );
        }
        worker.state
    }

    /// Recomputes health if the last check is older than the interval.
    ///
    /// Returns whether a recomputation happened.
    pub fn refresh_if_stale(&self, worker: &mut Worker, now: Instant) -> bool {
        if worker.needs_health_check(now, self.interval) {
            self.recompute(worker, now);
            true
        } else {
            false
        }
    }

    /// Routable workers of `domain` in pool order, refreshing stale ones first.
    pub fn healthy_candidates(
        &self,
        registry: &mut Registry,
        domain: &Domain,
        now: Instant,
    ) -> Vec<WorkerId> {
        let pool = registry.pool_for(domain).to_vec();
        pool.into_iter()
            .filter(|id| {
                registry.get_mut(id).is_ok_and(|worker| {
                    self.refresh_if_stale(worker, now);
                    worker.is_routable()
                })
            })
            .collect()
    }
}
