//! Concurrent routing against a shared router
#![cfg(test)]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::tests_outside_test_module,
    reason = "Test code prioritizes clarity over efficiency"
)]

use adp_router::{
    AlwaysReachable, Domain, HealthState, Priority, Router, RouterConfig, RoutingDecision,
    RoutingRequest, Worker,
};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const ROUTES_PER_THREAD: usize = 25;

fn shared_router() -> Arc<Router> {
    let workers = (0..4)
        .map(|index| {
            Worker::new(
                format!("cardio-{index}"),
                "cardiology",
                format!("http://cardio-{index}:8080"),
                0.9,
            )
            .with_max_concurrent(5)
        })
        .collect();
    let config = RouterConfig {
        workers,
        ..RouterConfig::default()
    };
    Arc::new(Router::with_rng(
        config,
        Arc::new(AlwaysReachable),
        StdRng::seed_from_u64(21),
    ))
}

fn route_in_parallel(router: &Arc<Router>) -> Vec<RoutingDecision> {
    let handles: Vec<_> = (0..THREADS)
        .map(|thread_index| {
            let router = Arc::clone(router);
            thread::spawn(move || {
                let priorities = [Priority::Normal, Priority::High, Priority::Urgent];
                (0..ROUTES_PER_THREAD)
                    .map(|step| {
                        let priority = priorities[(thread_index + step) % priorities.len()];
                        router.route(&RoutingRequest::new("cardiology").with_priority(priority))
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect()
}

#[test]
fn test_concurrent_routes_account_every_increment() {
    let router = shared_router();
    let decisions = route_in_parallel(&router);
    assert_eq!(decisions.len(), THREADS * ROUTES_PER_THREAD);
    assert!(decisions.iter().all(RoutingDecision::is_routed));

    let increments: usize = decisions.iter().map(|decision| decision.workers().count()).sum();
    let pool = router.pool_for(&Domain::new("cardiology"));
    let total_load: u32 = pool
        .iter()
        .map(|id| router.get(id).unwrap().current_load)
        .sum();
    assert_eq!(total_load as usize, increments);

    for id in &pool {
        let worker = router.get(id).unwrap();
        if worker.current_load >= worker.max_concurrent {
            assert_eq!(worker.state, HealthState::Degraded, "{id} overcommitted");
        }
    }
}

#[test]
fn test_concurrent_completion_drains_load() {
    let router = shared_router();
    let decisions = route_in_parallel(&router);

    let chunks: Vec<Vec<RoutingDecision>> = decisions
        .chunks(ROUTES_PER_THREAD)
        .map(<[RoutingDecision]>::to_vec)
        .collect();
    let handles: Vec<_> = chunks
        .into_iter()
        .map(|chunk| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for decision in &chunk {
                    router.complete_decision(decision);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in router.pool_for(&Domain::new("cardiology")) {
        let worker = router.get(&id).unwrap();
        assert_eq!(worker.current_load, 0);
        assert_eq!(worker.state, HealthState::Healthy);
    }
    let stats = router.routing_stats();
    assert!((stats.overall_health - 1.0).abs() < f64::EPSILON);
}
