//! Leaf evaluation strategies.
//!
//! Both strategies return the value in the root player's frame.

use cz_core::Game;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::arena::{Dag, ExpandMode};
use crate::infer::PriorProvider;
use crate::mcts::{MctsError, SearchStats};
use crate::node::NodeRef;

/// Everything a leaf evaluator may touch during one trial.
pub struct LeafContext<'a, G: Game, P: ?Sized> {
    pub game: &'a G,
    pub dag: &'a mut Dag<G>,
    pub root_player: G::Player,
    pub provider: &'a P,
    /// State keys up to and including the leaf.
    pub history: &'a [G::Key],
    pub stats: &'a mut SearchStats,
}

pub trait LeafEvaluator<G: Game> {
    fn evaluate<P: PriorProvider<G> + ?Sized>(
        &mut self,
        ctx: LeafContext<'_, G, P>,
        leaf: NodeRef,
    ) -> Result<f32, MctsError>;
}

const ROLLOUT_STREAM: u64 = 1;

/// Uniform-random playout to a terminal state through ephemeral nodes.
///
/// The first persistent unexpanded node on the walk is the detach point: its
/// edges are dropped together with the scratch arena once the value is known.
pub struct RandomRollout {
    rng: ChaCha8Rng,
    max_plies: Option<u32>,
}

impl RandomRollout {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_plies: None,
        }
    }

    /// Seed and ply cap from the file schema. The stream differs from the noise stream.
    pub fn from_config(cfg: &cz_core::config::MctsConfig) -> Self {
        let mut rollout = Self::new(cfg.seed).with_max_plies(cfg.max_rollout_plies);
        rollout.rng.set_stream(ROLLOUT_STREAM);
        rollout
    }

    /// A capped playout scores 0.
    pub fn with_max_plies(mut self, max_plies: Option<u32>) -> Self {
        self.max_plies = max_plies;
        self
    }

    fn walk<G: Game>(
        &mut self,
        game: &G,
        dag: &mut Dag<G>,
        root_player: G::Player,
        leaf: NodeRef,
        detach: &mut Option<NodeRef>,
    ) -> Result<(f32, u32), MctsError> {
        let mut current = leaf;
        let mut plies = 0u32;
        loop {
            let outcome = dag.get(current).outcome(game);
            if outcome.terminal {
                return Ok((outcome.value_for(root_player), plies));
            }
            if self.max_plies.is_some_and(|m| plies >= m) {
                return Ok((0.0, plies));
            }
            if dag.get(current).is_leaf() {
                if detach.is_none() && !current.is_ephemeral() {
                    *detach = Some(current);
                }
                let actions = dag.expandable_actions(game, current)?;
                let priors = vec![0.0; actions.len()];
                dag.attach_edges(game, current, actions, &priors, ExpandMode::Simulation)?;
            }
            let edges = &dag.get(current).edges;
            let i = self.rng.gen_range(0..edges.len());
            current = edges[i].child;
            plies += 1;
        }
    }
}

impl<G: Game> LeafEvaluator<G> for RandomRollout {
    fn evaluate<P: PriorProvider<G> + ?Sized>(
        &mut self,
        ctx: LeafContext<'_, G, P>,
        leaf: NodeRef,
    ) -> Result<f32, MctsError> {
        let mut detach = None;
        let walked = self.walk(ctx.game, ctx.dag, ctx.root_player, leaf, &mut detach);

        ctx.stats.scratch_peak = ctx.stats.scratch_peak.max(ctx.dag.scratch_len());
        if let Some(node) = detach {
            ctx.dag.detach(node);
        }
        ctx.dag.clear_scratch();

        let (value, plies) = walked?;
        ctx.stats.rollouts += 1;
        ctx.stats.rollout_plies += plies as u64;
        log::trace!("rollout: {plies} plies, value {value}");
        Ok(value)
    }
}

/// Scores leaves with the estimator's value; terminal leaves use the game result.
///
/// A missing value scores 0 and counts as a fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatorValue;

impl<G: Game> LeafEvaluator<G> for EstimatorValue {
    fn evaluate<P: PriorProvider<G> + ?Sized>(
        &mut self,
        ctx: LeafContext<'_, G, P>,
        leaf: NodeRef,
    ) -> Result<f32, MctsError> {
        let node = ctx.dag.get(leaf);
        let outcome = node.outcome(ctx.game);
        if outcome.terminal {
            return Ok(outcome.value_for(ctx.root_player));
        }
        let mut actions = Vec::new();
        ctx.game.legal_actions(&node.state, &mut actions);
        let estimate = ctx.provider.evaluate(ctx.history, &node.state, &actions);
        match estimate.value {
            Some(v) if v.is_finite() => Ok(if node.to_play == ctx.root_player {
                v
            } else {
                -v
            }),
            _ => {
                ctx.stats.fallbacks += 1;
                Ok(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_core::{Chess, Position};
    use std::str::FromStr;

    use crate::infer::UniformPriors;

    fn evaluate_once(rollout: &mut RandomRollout, fen: &str) -> (f32, Dag<Chess>, SearchStats) {
        let game = Chess;
        let mut dag = Dag::new();
        let leaf = NodeRef::Dag(dag.intern(&game, Position::from_str(fen).unwrap()));
        let mut stats = SearchStats::default();
        let v = rollout
            .evaluate(
                LeafContext {
                    game: &game,
                    dag: &mut dag,
                    root_player: chess::Color::White,
                    provider: &UniformPriors,
                    history: &[],
                    stats: &mut stats,
                },
                leaf,
            )
            .unwrap();
        (v, dag, stats)
    }

    #[test]
    fn ply_cap_scores_zero() {
        let mut r = RandomRollout::new(1).with_max_plies(Some(0));
        let (v, dag, stats) = evaluate_once(&mut r, cz_core::START_FEN);
        assert_eq!(v, 0.0);
        assert_eq!(stats.rollout_plies, 0);
        assert_eq!(dag.scratch_len(), 0);
    }

    #[test]
    fn terminal_leaf_is_scored_without_expansion() {
        // White is mated.
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let mut r = RandomRollout::new(1);
        let (v, dag, stats) = evaluate_once(&mut r, fen);
        assert_eq!(v, -1.0);
        assert_eq!(stats.scratch_peak, 0);
        assert_eq!(dag.len(), 1);
    }

    #[test]
    fn capped_rollout_detaches_its_start() {
        let mut r = RandomRollout::new(2).with_max_plies(Some(8));
        let (_, dag, stats) = evaluate_once(&mut r, cz_core::START_FEN);
        assert!(stats.rollout_plies <= 8);
        assert!(stats.scratch_peak >= stats.rollout_plies as usize);
        assert!(dag.get(NodeRef::Dag(0)).is_leaf());
        assert_eq!(dag.scratch_len(), 0);
    }

    #[test]
    fn config_seeded_rollouts_repeat() {
        let file = cz_core::config::MctsConfig {
            max_rollout_plies: Some(30),
            ..Default::default()
        };
        let a = evaluate_once(&mut RandomRollout::from_config(&file), cz_core::START_FEN);
        let b = evaluate_once(&mut RandomRollout::from_config(&file), cz_core::START_FEN);
        assert_eq!(a.0, b.0);
        assert_eq!(a.2.rollout_plies, b.2.rollout_plies);
    }

    #[test]
    fn estimator_value_uses_terminal_rule() {
        let game = Chess;
        let mut dag = Dag::new();
        let mated = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let leaf = NodeRef::Dag(dag.intern(&game, Position::from_str(mated).unwrap()));
        let mut stats = SearchStats::default();
        let v = EstimatorValue
            .evaluate(
                LeafContext {
                    game: &game,
                    dag: &mut dag,
                    root_player: chess::Color::Black,
                    provider: &UniformPriors,
                    history: &[],
                    stats: &mut stats,
                },
                leaf,
            )
            .unwrap();
        assert_eq!(v, 1.0);
        assert_eq!(stats.fallbacks, 0);
    }
}
