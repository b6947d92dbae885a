use crate::registry::Registry;
use adp_core::{HealthState, SelectionConfig, Worker, WorkerId};
use rand::Rng;
use rand::seq::SliceRandom as _;

/// Scores a worker for weighted selection.
///
/// The base weight is scaled down for slow responses (relative to the
/// configured baseline, skipped while no response time is known), by
/// accuracy, by in-flight load (floored at `min_load_factor`), and by
/// `degraded_penalty` for degraded workers.
pub fn effective_weight(worker: &Worker, config: &SelectionConfig) -> f64 {
    let mut weight = worker.base_weight;

    if worker.response_time_avg_ms > 0.0 {
        weight *= (config.response_time_baseline_ms / worker.response_time_avg_ms).min(1.0);
    }

    weight *= worker.accuracy_score;

    let load_ratio = f64::from(worker.current_load) / f64::from(worker.max_concurrent.max(1));
    weight *= (1.0 - load_ratio).max(config.min_load_factor);

    if worker.state == HealthState::Degraded {
        weight *= config.degraded_penalty;
    }

    weight
}

/// Draws one item with probability proportional to its weight.
///
/// Walks the items accumulating weight and returns the first positively
/// weighted item whose cumulative weight reaches a uniform draw in
/// `[0, total)`. When no item carries positive weight the choice is uniform.
/// Returns `None` only when `items` is empty.
pub fn weighted_pick<'items, T, R>(
    items: &'items [T],
    weights: &[f64],
    rng: &mut R,
) -> Option<&'items T>
where
    R: Rng,
{
    let scored = || {
        items
            .iter()
            .zip(weights.iter().copied())
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
    };

    let total: f64 = scored().map(|(_, weight)| weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return items.choose(rng);
    }

    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last = None;
    for (item, weight) in scored() {
        cumulative += weight;
        if cumulative >= draw {
            return Some(item);
        }
        last = Some(item);
    }

    // Float rounding can leave the draw just above the final sum.
    last
}

/// Weighted-random choice among registered candidates.
///
/// Candidates missing from the registry carry zero weight.
pub fn weighted_select<R>(
    candidates: &[WorkerId],
    registry: &Registry,
    config: &SelectionConfig,
    rng: &mut R,
) -> Option<WorkerId>
where
    R: Rng,
{
    let weights: Vec<f64> = candidates
        .iter()
        .map(|id| {
            registry
                .get(id)
                .map_or(0.0, |worker| effective_weight(worker, config))
        })
        .collect();

    weighted_pick(candidates, &weights, rng).cloned()
}
