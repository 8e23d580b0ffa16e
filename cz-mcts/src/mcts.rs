//! Single-threaded DAG search driver.
//!
//! Values are kept in one fixed frame: the player to move at the search root.
//! Backup adds the same value to every node and edge on the path; selection
//! negates Q at nodes where the other player is to move.

use std::time::{Duration, Instant};

use cz_core::{CodecError, Game, UcbVariant};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use thiserror::Error;

use crate::arena::{Dag, ExpandMode};
use crate::infer::PriorProvider;
use crate::node::{NodeId, NodeRef};
use crate::result::{EdgeSummary, SearchResult, StopReason};
use crate::rollout::{LeafContext, LeafEvaluator};
use crate::select;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MctsConfig {
    pub c_puct: f32,
    pub ucb: UcbVariant,
    pub max_trials: Option<u32>,
    /// Polled after each completed trial; the search stops once it is exceeded.
    pub max_time: Option<Duration>,
    pub dirichlet_alpha: f32,
    /// Weight of the noise; estimator priors get `1 - dirichlet_epsilon`.
    pub dirichlet_epsilon: f32,
    pub history_len: usize,
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: 10.0,
            ucb: UcbVariant::AlphaZero,
            max_trials: Some(500),
            max_time: None,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            history_len: 8,
            seed: 0,
        }
    }
}

impl From<&cz_core::config::MctsConfig> for MctsConfig {
    fn from(c: &cz_core::config::MctsConfig) -> Self {
        Self {
            c_puct: c.c_puct,
            ucb: c.ucb,
            max_trials: c.max_trials,
            max_time: c.max_time_ms.map(Duration::from_millis),
            dirichlet_alpha: c.dirichlet_alpha,
            dirichlet_epsilon: c.dirichlet_epsilon,
            history_len: c.history_len,
            seed: c.seed,
        }
    }
}

#[derive(Debug, Error)]
pub enum MctsError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("node is already expanded")]
    AlreadyExpanded,
    #[error("cannot select from an unexpanded node")]
    NotExpanded,
    #[error("cannot select from a terminal node")]
    TerminalNode,
    #[error("non-terminal state has no legal actions")]
    NoLegalActions,
    #[error("action {action} is not an edge of the root")]
    UnknownAction { action: String },
    #[error("estimator returned {got} priors for {expected} actions")]
    PriorLengthMismatch { expected: usize, got: usize },
    #[error("no search root has been set")]
    NoRoot,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    pub node_count: usize,
    pub scratch_peak: usize,
    pub expansions: u32,
    pub rollouts: u32,
    pub rollout_plies: u64,
    pub fallbacks: u32,
    pub max_depth: u32,
    pub reused_root: bool,
}

/// Alternating node/edge path of one trial, root first.
#[derive(Debug, Clone)]
pub struct SearchPath {
    nodes: Vec<NodeRef>,
    edges: Vec<(NodeRef, usize)>,
}

impl SearchPath {
    pub fn new(root: NodeRef) -> Self {
        Self {
            nodes: vec![root],
            edges: Vec::new(),
        }
    }

    /// Appends edge `edge` of `parent` and the node it leads to.
    pub fn push(&mut self, parent: NodeRef, edge: usize, child: NodeRef) {
        self.edges.push((parent, edge));
        self.nodes.push(child);
    }

    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(NodeRef, usize)] {
        &self.edges
    }

    pub fn leaf(&self) -> NodeRef {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.edges.len()
    }
}

pub struct Mcts<G: Game, L> {
    cfg: MctsConfig,
    game: G,
    evaluator: L,
    dag: Dag<G>,
    root: Option<NodeId>,
    rng: ChaCha8Rng,
    stats: SearchStats,
}

impl<G: Game, L: LeafEvaluator<G>> Mcts<G, L> {
    pub fn new(game: G, evaluator: L, cfg: MctsConfig) -> Result<Self, MctsError> {
        if !(cfg.c_puct.is_finite() && cfg.c_puct > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "c_puct must be finite and > 0",
            });
        }
        if !(cfg.dirichlet_alpha.is_finite() && cfg.dirichlet_alpha > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_alpha must be finite and > 0",
            });
        }
        if !(cfg.dirichlet_epsilon.is_finite() && (0.0..=1.0).contains(&cfg.dirichlet_epsilon)) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_epsilon must be in [0, 1]",
            });
        }
        if cfg.max_trials.is_none() && cfg.max_time.is_none() {
            return Err(MctsError::InvalidConfig {
                msg: "one of max_trials or max_time must be set",
            });
        }
        if cfg.history_len == 0 {
            return Err(MctsError::InvalidConfig {
                msg: "history_len must be > 0",
            });
        }
        Ok(Self {
            cfg,
            game,
            evaluator,
            dag: Dag::new(),
            root: None,
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
            stats: SearchStats::default(),
        })
    }

    pub fn config(&self) -> &MctsConfig {
        &self.cfg
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn dag(&self) -> &Dag<G> {
        &self.dag
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Makes `state` the root. A node already in the DAG is kept with its
    /// statistics and everything it cannot reach is dropped; otherwise the DAG
    /// starts over.
    pub fn set_root(&mut self, state: G::State) -> NodeId {
        let key = self.game.key(&state);
        let id = match self.dag.lookup(&key) {
            Some(id) => {
                self.stats.reused_root = true;
                self.dag.retain_reachable(id)
            }
            None => {
                self.dag.clear();
                self.dag.intern(&self.game, state)
            }
        };
        self.root = Some(id);
        id
    }

    fn root_player(&self) -> Result<G::Player, MctsError> {
        let root = self.root.ok_or(MctsError::NoRoot)?;
        Ok(self.dag.get(NodeRef::Dag(root)).to_play)
    }

    /// Expands `node` with estimator priors mixed with Dirichlet noise.
    pub fn expand<P: PriorProvider<G> + ?Sized>(
        &mut self,
        node: NodeRef,
        provider: &P,
        history: &[G::Key],
    ) -> Result<(), MctsError> {
        let actions = self.dag.expandable_actions(&self.game, node)?;
        let estimate = provider.evaluate(history, &self.dag.get(node).state, &actions);
        if estimate.priors.len() != actions.len() {
            return Err(MctsError::PriorLengthMismatch {
                expected: actions.len(),
                got: estimate.priors.len(),
            });
        }
        let priors = self.mix_noise(estimate.priors);
        self.dag
            .attach_edges(&self.game, node, actions, &priors, ExpandMode::Search)?;
        self.stats.expansions += 1;
        Ok(())
    }

    fn mix_noise(&mut self, priors: Vec<f32>) -> Vec<f32> {
        let eps = self.cfg.dirichlet_epsilon;
        if eps == 0.0 {
            return priors;
        }
        match dirichlet_noise(priors.len(), self.cfg.dirichlet_alpha, &mut self.rng) {
            Some(noise) => priors
                .iter()
                .zip(noise)
                .map(|(p, eta)| (1.0 - eps) * p + eps * eta)
                .collect(),
            None => priors,
        }
    }

    /// Picks the edge to follow out of `node`.
    pub fn select_edge(&self, node: NodeRef, total_trials: u32) -> Result<usize, MctsError> {
        let root_player = self.root_player()?;
        let n = self.dag.get(node);
        if n.is_terminal(&self.game) {
            return Err(MctsError::TerminalNode);
        }
        if n.is_leaf() {
            return Err(MctsError::NotExpanded);
        }
        let perspective = if n.to_play == root_player { 1.0 } else { -1.0 };
        select::select_edge(
            &n.edges,
            total_trials,
            self.cfg.c_puct,
            self.cfg.ucb,
            perspective,
        )
        .ok_or(MctsError::NotExpanded)
    }

    /// Adds `value` to every node and edge on `path`.
    pub fn backup(&mut self, path: &SearchPath, value: f32) {
        for &node in path.nodes() {
            let n = self.dag.get_mut(node);
            n.n += 1;
            n.w += value;
        }
        for &(parent, i) in path.edges() {
            let e = &mut self.dag.get_mut(parent).edges[i];
            e.n += 1;
            e.w += value;
        }
    }

    /// Runs one search from `root_state`. `history` holds the keys of the
    /// states played before it, oldest first.
    pub fn search<P: PriorProvider<G> + ?Sized>(
        &mut self,
        root_state: G::State,
        provider: &P,
        history: &[G::Key],
    ) -> Result<SearchResult<G>, MctsError> {
        let start = Instant::now();
        self.stats = SearchStats::default();

        let root_key = self.game.key(&root_state);
        let root = NodeRef::Dag(self.set_root(root_state));
        let root_player = self.dag.get(root).to_play;

        let mut keys = history.to_vec();
        keys.push(root_key.clone());
        if !self.dag.get(root).is_expanded(&self.game) {
            let window = tail(&keys, self.cfg.history_len);
            self.expand(root, provider, window)?;
        }
        log::debug!(
            "search start: root {:?}, {} edges, {} prior visits, reused {}",
            root_key,
            self.dag.get(root).edges.len(),
            self.dag.get(root).n,
            self.stats.reused_root
        );

        let mut trials = 0u32;
        let stop = loop {
            if self.cfg.max_trials.is_some_and(|m| trials >= m) {
                break StopReason::TrialBudget;
            }
            self.run_trial(root, root_player, provider, &keys, trials)?;
            trials += 1;
            if self.cfg.max_time.is_some_and(|t| start.elapsed() > t) {
                break StopReason::TimeBudget;
            }
        };

        self.stats.node_count = self.dag.len();
        let root_node = self.dag.get(root);
        let result = SearchResult {
            root: self.root.ok_or(MctsError::NoRoot)?,
            root_key,
            root_player,
            edges: root_node.edges.iter().map(EdgeSummary::from_edge).collect(),
            root_visits: root_node.n,
            root_value: root_node.q(),
            trials,
            elapsed: start.elapsed(),
            stop,
            stats: self.stats.clone(),
        };
        log::debug!(
            "search done: {} trials in {:?} ({:?}), root value {:.3}, {} nodes",
            trials,
            result.elapsed,
            stop,
            result.root_value,
            self.stats.node_count
        );
        Ok(result)
    }

    fn run_trial<P: PriorProvider<G> + ?Sized>(
        &mut self,
        root: NodeRef,
        root_player: G::Player,
        provider: &P,
        base_history: &[G::Key],
        trials: u32,
    ) -> Result<(), MctsError> {
        let mut path = SearchPath::new(root);
        let mut history = base_history.to_vec();
        let mut current = root;

        while !self.dag.get(current).is_leaf() {
            let i = self.select_edge(current, trials)?;
            current = self.descend(&mut path, &mut history, current, i);
        }

        // Lazy expansion: the first visit only records statistics.
        let leaf = self.dag.get(current);
        if leaf.n > 0 && !leaf.is_terminal(&self.game) {
            self.expand(current, provider, tail(&history, self.cfg.history_len))?;
            let i = self.select_edge(current, trials)?;
            current = self.descend(&mut path, &mut history, current, i);
        }
        self.stats.max_depth = self.stats.max_depth.max(path.depth() as u32);

        let value = self.evaluator.evaluate(
            LeafContext {
                game: &self.game,
                dag: &mut self.dag,
                root_player,
                provider,
                history: tail(&history, self.cfg.history_len),
                stats: &mut self.stats,
            },
            current,
        )?;
        self.backup(&path, value);
        Ok(())
    }

    fn descend(
        &self,
        path: &mut SearchPath,
        history: &mut Vec<G::Key>,
        node: NodeRef,
        edge: usize,
    ) -> NodeRef {
        let e = &self.dag.get(node).edges[edge];
        log::debug!("descend: {:?} (n={}, q={:.3})", e.action, e.n, e.q());
        let child = e.child;
        if let Some(key) = &self.dag.get(child).key {
            history.push(key.clone());
        }
        path.push(node, edge, child);
        child
    }

    /// Moves the root along `action`, dropping every node the new root cannot reach.
    pub fn advance(&mut self, action: &G::Action) -> Result<NodeId, MctsError> {
        let root = self.root.ok_or(MctsError::NoRoot)?;
        let unknown = || MctsError::UnknownAction {
            action: format!("{action:?}"),
        };
        let child = self
            .dag
            .get(NodeRef::Dag(root))
            .edges
            .iter()
            .find(|e| &e.action == action)
            .map(|e| e.child)
            .ok_or_else(unknown)?;
        let NodeRef::Dag(child) = child else {
            return Err(unknown());
        };
        let before = self.dag.len();
        let new_root = self.dag.retain_reachable(child);
        self.root = Some(new_root);
        log::debug!("advance: kept {} of {} nodes", self.dag.len(), before);
        Ok(new_root)
    }

    /// Evaluates `leaf` with the configured strategy, outside of a search.
    pub fn evaluate_leaf<P: PriorProvider<G> + ?Sized>(
        &mut self,
        leaf: NodeRef,
        provider: &P,
        history: &[G::Key],
    ) -> Result<f32, MctsError> {
        let root_player = self.root_player()?;
        self.evaluator.evaluate(
            LeafContext {
                game: &self.game,
                dag: &mut self.dag,
                root_player,
                provider,
                history,
                stats: &mut self.stats,
            },
            leaf,
        )
    }
}

fn tail<T>(items: &[T], len: usize) -> &[T] {
    &items[items.len().saturating_sub(len)..]
}

/// Symmetric Dirichlet sample built from normalized Gamma(alpha, 1) draws.
fn dirichlet_noise(n: usize, alpha: f32, rng: &mut impl Rng) -> Option<Vec<f32>> {
    if n == 0 {
        return None;
    }
    let gamma = Gamma::new(alpha as f64, 1.0).ok()?;
    let draws: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();
    let sum: f64 = draws.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return None;
    }
    Some(draws.iter().map(|x| (x / sum) as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirichlet_noise_is_a_distribution() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let eta = dirichlet_noise(30, 0.3, &mut rng).unwrap();
        assert_eq!(eta.len(), 30);
        assert!(eta.iter().all(|&x| (0.0..=1.0).contains(&x)));
        assert!((eta.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(dirichlet_noise(0, 0.3, &mut rng).is_none());
    }

    #[test]
    fn tail_keeps_the_newest_items() {
        let v = [1, 2, 3, 4];
        assert_eq!(tail(&v, 2), &[3, 4]);
        assert_eq!(tail(&v, 8), &v);
    }
}
