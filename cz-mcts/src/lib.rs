//! Transposition-aware Monte-Carlo search over a DAG of game states.
//!
//! The design uses:
//! - a [`cz_core::Game`] adapter for rules, with state keys for transposition merging
//! - arena-backed node storage plus a scratch arena for rollout nodes
//! - statically selected leaf evaluation (random playout or estimator value)

pub mod arena;
pub mod infer;
pub mod mcts;
pub mod node;
pub mod result;
pub mod rollout;
pub mod select;

pub use arena::{Dag, ExpandMode};
pub use infer::{Estimate, PolicyModel, PolicyPriors, Prediction, PriorProvider, UniformPriors};
pub use mcts::{Mcts, MctsConfig, MctsError, SearchPath, SearchStats};
pub use node::{Edge, Node, NodeId, NodeRef};
pub use result::{
    best_edge_by_value, most_visited_edge, policy_target, sample_edge, softmax_visit_policy,
    top_moves, visit_policy, EdgeSummary, SearchResult, StopReason,
};
pub use rollout::{EstimatorValue, LeafContext, LeafEvaluator, RandomRollout};
pub use select::select_edge;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}
