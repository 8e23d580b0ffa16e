//! Upper-confidence edge selection.

use cz_core::UcbVariant;

use crate::node::Edge;

/// Index of the edge maximizing `perspective * Q + U`; the first maximum wins.
///
/// Edge values are stored in the root player's frame, so `perspective` is +1
/// when that player is to move at the node and -1 otherwise. Returns `None`
/// only for an empty edge list.
pub fn select_edge<A>(
    edges: &[Edge<A>],
    total_trials: u32,
    c_puct: f32,
    variant: UcbVariant,
    perspective: f32,
) -> Option<usize> {
    let t = total_trials as f32;
    let explore = match variant {
        UcbVariant::AlphaZero => (1.0 + t).sqrt(),
        UcbVariant::Classic => (1.0 + t).ln(),
    };

    let mut best_score = f32::NEG_INFINITY;
    let mut best = None;
    for (i, e) in edges.iter().enumerate() {
        let visits = 1.0 + e.n as f32;
        let u = match variant {
            UcbVariant::AlphaZero => c_puct * e.prior * explore / visits,
            UcbVariant::Classic => c_puct * e.prior * (explore / visits).sqrt(),
        };
        let score = perspective * e.q() + u;
        if best.is_none() || score > best_score {
            best_score = score;
            best = Some(i);
        }
    }
    best
}
