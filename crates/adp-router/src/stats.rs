//! Routing statistics aggregated from current worker state.

use crate::registry::Registry;
use adp_core::{Domain, DomainConfig, HealthState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Worker counts for one domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DomainStats {
    /// Registered workers
    pub total: usize,
    /// Workers in the healthy state
    pub healthy: usize,
    /// Workers in the degraded state
    pub degraded: usize,
    /// Workers in the unavailable state
    pub unavailable: usize,
    /// Sum of in-flight load across the domain
    pub in_flight: u64,
}

/// Coarse system status derived from the overall health ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    /// More than 80% of workers healthy
    Healthy,
    /// More than 50% of workers healthy
    Degraded,
    /// Half or fewer of workers healthy
    Critical,
}

impl SystemHealth {
    /// Classifies a healthy-worker ratio.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.8 {
            Self::Healthy
        } else if ratio > 0.5 {
            Self::Degraded
        } else {
            Self::Critical
        }
    }
}

impl Display for SystemHealth {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Snapshot of routing health across all domains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingStats {
    /// Registered workers across all domains
    pub total_workers: usize,
    /// Per-domain counts, covering every configured domain
    pub domains: BTreeMap<Domain, DomainStats>,
    /// Healthy workers divided by registered workers (0 when empty)
    pub overall_health: f64,
    /// Status label for `overall_health`
    pub system_health: SystemHealth,
}

impl RoutingStats {
    /// Aggregates counts from the registry without refreshing health.
    pub fn collect(registry: &Registry, catalog: &DomainConfig) -> Self {
        let mut domains: BTreeMap<Domain, DomainStats> = catalog
            .domains()
            .map(|domain| (domain, DomainStats::default()))
            .collect();
        for domain in registry.domains() {
            domains.entry(domain.clone()).or_default();
        }

        for worker in registry.workers() {
            let entry = domains.entry(worker.domain.clone()).or_default();
            entry.total += 1;
            entry.in_flight += u64::from(worker.current_load);
            match worker.state {
                HealthState::Healthy => entry.healthy += 1,
                HealthState::Degraded => entry.degraded += 1,
                HealthState::Unavailable => entry.unavailable += 1,
            }
        }

        let total_workers = registry.len();
        let healthy: usize = domains.values().map(|stats| stats.healthy).sum();
        let overall_health = if total_workers == 0 {
            0.0
        } else {
            healthy as f64 / total_workers as f64
        };

        Self {
            total_workers,
            domains,
            overall_health,
            system_health: SystemHealth::from_ratio(overall_health),
        }
    }

    /// Counts for one domain, if it is configured or has workers.
    pub fn domain(&self, domain: &Domain) -> Option<&DomainStats> {
        self.domains.get(domain)
    }
}
