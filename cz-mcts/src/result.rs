//! Search results and the policies built from root visit counts.

use std::fmt::Display;
use std::time::Duration;

use chess::ChessMove;
use cz_core::{move_to_policy_index, CodecError, Game, POLICY_SIZE};
use cz_logging::{now_ms, EdgeStatsV1, PiSummaryV1, SearchRootEventV1, VersionInfoV1};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::mcts::SearchStats;
use crate::node::{Edge, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TrialBudget,
    TimeBudget,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::TrialBudget => "trial_budget",
            StopReason::TimeBudget => "time_budget",
        }
    }
}

/// Statistics of one root edge. `value_sum` is in the root player's frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSummary<A> {
    pub action: A,
    pub prior: f32,
    pub visits: u32,
    pub value_sum: f32,
}

impl<A: Clone> EdgeSummary<A> {
    pub fn from_edge(e: &Edge<A>) -> Self {
        Self {
            action: e.action.clone(),
            prior: e.prior,
            visits: e.n,
            value_sum: e.w,
        }
    }
}

impl<A> EdgeSummary<A> {
    pub fn q(&self) -> f32 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f32
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult<G: Game> {
    pub root: NodeId,
    pub root_key: G::Key,
    pub root_player: G::Player,
    /// In the root node's edge order.
    pub edges: Vec<EdgeSummary<G::Action>>,
    pub root_visits: u32,
    pub root_value: f32,
    pub trials: u32,
    pub elapsed: Duration,
    pub stop: StopReason,
    pub stats: SearchStats,
}

impl<G: Game> SearchResult<G> {
    pub fn visit_policy(&self, temperature: f32) -> Vec<f32> {
        visit_policy(&self.edges, temperature)
    }

    pub fn most_visited(&self) -> Option<&EdgeSummary<G::Action>> {
        most_visited_edge(&self.edges).map(|i| &self.edges[i])
    }

    pub fn best_by_value(&self) -> Option<&EdgeSummary<G::Action>> {
        best_edge_by_value(&self.edges).map(|i| &self.edges[i])
    }

    pub fn top_moves(&self, k: usize) -> Vec<&EdgeSummary<G::Action>> {
        top_moves(&self.edges, k)
            .into_iter()
            .map(|i| &self.edges[i])
            .collect()
    }

    /// NDJSON record of this search.
    pub fn root_event(&self, run_id: &str, top_k: usize) -> SearchRootEventV1
    where
        G::Key: Display,
        G::Action: Display,
    {
        let pi = self.visit_policy(1.0);
        SearchRootEventV1 {
            event: "search_root",
            ts_ms: now_ms(),
            v: VersionInfoV1::current(),
            run_id: run_id.to_string(),
            root_key: self.root_key.to_string(),
            root_player: format!("{:?}", self.root_player),
            trials: self.trials,
            elapsed_ms: self.elapsed.as_millis() as u64,
            stop_reason: self.stop.as_str(),
            root_visits: self.root_visits,
            root_value: self.root_value,
            node_count: self.stats.node_count as u64,
            expansions: self.stats.expansions,
            rollouts: self.stats.rollouts,
            fallbacks: self.stats.fallbacks,
            max_depth: self.stats.max_depth,
            reused_root: self.stats.reused_root,
            top: self
                .top_moves(top_k)
                .into_iter()
                .map(|e| EdgeStatsV1 {
                    action: e.action.to_string(),
                    visits: e.visits,
                    q: e.q(),
                    prior: e.prior,
                })
                .collect(),
            pi: PiSummaryV1::from_probs(&pi),
        }
    }
}

fn uniform(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f32; n]
}

/// `visits^(1/T)`, renormalized.
///
/// `T == 0` puts all mass on the most visited edge (lowest index on ties);
/// a non-finite or negative `T`, or no visits at all, gives uniform.
pub fn visit_policy<A>(edges: &[EdgeSummary<A>], temperature: f32) -> Vec<f32> {
    if !temperature.is_finite() || temperature < 0.0 {
        return uniform(edges.len());
    }
    if temperature == 0.0 {
        let mut out = vec![0.0f32; edges.len()];
        if let Some(i) = most_visited_edge(edges) {
            out[i] = 1.0;
        }
        return out;
    }
    let inv_t = 1.0 / temperature;
    let mut out: Vec<f32> = edges
        .iter()
        .map(|e| (e.visits as f32).powf(inv_t))
        .collect();
    let sum: f32 = out.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return uniform(edges.len());
    }
    for v in &mut out {
        *v /= sum;
    }
    out
}

/// Softmax of `visits / T`. `T == 0` is greedy like [`visit_policy`].
pub fn softmax_visit_policy<A>(edges: &[EdgeSummary<A>], temperature: f32) -> Vec<f32> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return visit_policy(edges, temperature);
    }
    let logits: Vec<f32> = edges
        .iter()
        .map(|e| e.visits as f32 / temperature)
        .collect();
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = out.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return uniform(edges.len());
    }
    for v in &mut out {
        *v /= sum;
    }
    out
}

/// Samples an index proportionally to `probs`.
pub fn sample_edge<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> Option<usize> {
    let weights = probs
        .iter()
        .map(|&p| if p.is_finite() && p > 0.0 { p } else { 0.0 });
    WeightedIndex::new(weights).ok().map(|d| d.sample(rng))
}

pub fn most_visited_edge<A>(edges: &[EdgeSummary<A>]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, e) in edges.iter().enumerate() {
        if best.map_or(true, |(_, v)| e.visits > v) {
            best = Some((i, e.visits));
        }
    }
    best.map(|(i, _)| i)
}

/// Highest Q for the root player; the first edge wins ties.
pub fn best_edge_by_value<A>(edges: &[EdgeSummary<A>]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, e) in edges.iter().enumerate() {
        let q = e.q();
        if best.map_or(true, |(_, b)| q > b) {
            best = Some((i, q));
        }
    }
    best.map(|(i, _)| i)
}

/// Indices of the `k` most visited edges, most visited first, ties in edge order.
pub fn top_moves<A>(edges: &[EdgeSummary<A>], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by(|&a, &b| edges[b].visits.cmp(&edges[a].visits));
    order.truncate(k);
    order
}

/// Visit policy projected into the flat 8×8×73 action space.
pub fn policy_target(
    edges: &[EdgeSummary<ChessMove>],
    temperature: f32,
) -> Result<Vec<f32>, CodecError> {
    let pi = visit_policy(edges, temperature);
    let mut target = vec![0.0f32; POLICY_SIZE];
    for (e, p) in edges.iter().zip(pi) {
        target[move_to_policy_index(e.action)?] += p;
    }
    Ok(target)
}
