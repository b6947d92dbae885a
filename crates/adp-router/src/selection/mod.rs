//! Candidate selection strategies.
//!
//! Round-robin spreads ordinary traffic fairly using a per-domain cursor;
//! weighted selection favours fast, accurate, lightly loaded workers at the
//! cost of determinism. Both return `None` only for an empty candidate list.

/// Cursor-based round-robin selection.
pub mod round_robin;
/// Effective-weight scoring and weighted-random draws.
pub mod weighted;

pub use round_robin::round_robin_select;
pub use weighted::{effective_weight, weighted_pick, weighted_select};
