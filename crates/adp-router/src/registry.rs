//! Worker registry with per-domain pools.
//!
//! Each domain owns one ordered pool of worker ids and one round-robin
//! cursor. A worker id appears in at most one pool: the pool of the domain it
//! was last registered under.

use adp_core::{Domain, Result, RoutingError, Worker, WorkerId};
use std::collections::HashMap;

/// Ordered worker ids of one domain plus its round-robin cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainPool {
    /// Worker ids in registration order
    pub members: Vec<WorkerId>,
    /// Position of the next round-robin pick
    pub cursor: usize,
}

/// Worker records indexed by id and grouped by domain.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    workers: HashMap<WorkerId, Worker>,
    pools: HashMap<Domain, DomainPool>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a worker record.
    ///
    /// The id is appended to its domain's pool unless already present. A
    /// replaced worker that changed domain moves to the new pool.
    pub fn register(&mut self, worker: Worker) {
        let id = worker.id.clone();
        let domain = worker.domain.clone();

        if let Some(previous) = self.workers.insert(id.clone(), worker)
            && previous.domain != domain
            && let Some(old_pool) = self.pools.get_mut(&previous.domain)
        {
            old_pool.members.retain(|member| member != &id);
        }

        let pool = self.pools.entry(domain).or_default();
        if !pool.members.contains(&id) {
            pool.members.push(id);
        }
    }

    /// Removes a worker and its pool entry.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn deregister(&mut self, id: &WorkerId) -> Result<Worker> {
        let worker = self
            .workers
            .remove(id)
            .ok_or_else(|| RoutingError::NotFound(id.clone()))?;
        if let Some(pool) = self.pools.get_mut(&worker.domain) {
            pool.members.retain(|member| member != id);
        }
        Ok(worker)
    }

    /// Looks up a worker.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn get(&self, id: &WorkerId) -> Result<&Worker> {
        self.workers
            .get(id)
            .ok_or_else(|| RoutingError::NotFound(id.clone()))
    }

    /// Looks up a worker for mutation.
    ///
    /// # Errors
    /// Returns `NotFound` if the id is not registered.
    pub fn get_mut(&mut self, id: &WorkerId) -> Result<&mut Worker> {
        self.workers
            .get_mut(id)
            .ok_or_else(|| RoutingError::NotFound(id.clone()))
    }

    /// Worker ids registered under `domain`, in registration order.
    pub fn pool_for(&self, domain: &Domain) -> &[WorkerId] {
        self.pools
            .get(domain)
            .map(|pool| pool.members.as_slice())
            .unwrap_or_default()
    }

    /// Round-robin cursor of `domain`, created at 0 on first use.
    pub fn cursor_mut(&mut self, domain: &Domain) -> &mut usize {
        &mut self.pools.entry(domain.clone()).or_default().cursor
    }

    /// Domains that have a pool, including pools emptied by deregistration.
    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.pools.keys()
    }

    /// All registered workers, in no particular order.
    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: &str, domain: &str) -> Worker {
        Worker::new(id, domain, format!("http://{id}.example.com"), 0.8)
    }

    #[test]
    fn test_register_appends_to_pool() {
        let mut registry = Registry::new();
        registry.register(worker("a", "medical"));
        registry.register(worker("b", "medical"));
        registry.register(worker("c", "cardiology"));

        let medical = Domain::new("medical");
        assert_eq!(registry.pool_for(&medical), [WorkerId::from("a"), WorkerId::from("b")]);
        assert_eq!(registry.pool_for(&Domain::new("cardiology")).len(), 1);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_is_idempotent_on_id() {
        let mut registry = Registry::new();
        registry.register(worker("a", "medical"));
        registry.register(worker("a", "medical").with_accuracy(0.5));

        let medical = Domain::new("medical");
        assert_eq!(registry.pool_for(&medical).len(), 1);
        let stored = registry.get(&WorkerId::from("a")).unwrap();
        assert!((stored.accuracy_score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reregister_moves_domain() {
        let mut registry = Registry::new();
        registry.register(worker("a", "medical"));
        registry.register(worker("a", "neurology"));

        assert!(registry.pool_for(&Domain::new("medical")).is_empty());
        assert_eq!(registry.pool_for(&Domain::new("neurology")).len(), 1);
    }

    #[test]
    fn test_get_unknown() {
        let registry = Registry::new();
        let missing = WorkerId::from("ghost");
        assert!(matches!(registry.get(&missing), Err(RoutingError::NotFound(id)) if id == missing));
        assert!(registry.pool_for(&Domain::new("medical")).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deregister() {
        let mut registry = Registry::new();
        registry.register(worker("a", "medical"));
        registry.register(worker("b", "medical"));

        let removed = registry.deregister(&WorkerId::from("a")).unwrap();
        assert_eq!(removed.id, WorkerId::from("a"));
        assert_eq!(registry.pool_for(&Domain::new("medical")), [WorkerId::from("b")]);
        registry.deregister(&WorkerId::from("a")).unwrap_err();
    }

    #[test]
    fn test_cursor_starts_at_zero() {
        let mut registry = Registry::new();
        let oncology = Domain::new("cancer");
        assert_eq!(*registry.cursor_mut(&oncology), 0);
        *registry.cursor_mut(&oncology) = 2;
        assert_eq!(*registry.cursor_mut(&oncology), 2);
    }
}
