use std::cell::Cell;
use std::str::FromStr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use cz_core::config::Config;
use cz_core::{move_to_policy_index, parse_uci, sample_move, Chess, Position, POLICY_SIZE};
use cz_mcts::{
    policy_target, EstimatorValue, Mcts, MctsConfig, PolicyModel, PolicyPriors, Prediction,
    RandomRollout, StopReason,
};

/// Puts almost all policy mass on one move and reports a fixed value.
struct Favourite {
    mv: chess::ChessMove,
    value: Option<f32>,
    calls: Cell<usize>,
}

impl PolicyModel for Favourite {
    fn predict(&self, history: &[String], position: &Position) -> Prediction {
        self.calls.set(self.calls.get() + 1);
        assert_eq!(history.last(), Some(&position.fen()));
        let mut policy = vec![1e-4f32; POLICY_SIZE];
        policy[move_to_policy_index(self.mv).unwrap()] = 1.0;
        Prediction {
            policy,
            value: self.value,
        }
    }
}

fn file_config(yaml: &str) -> cz_core::config::MctsConfig {
    Config::from_yaml(yaml).unwrap().mcts
}

#[test]
fn config_file_drives_a_rollout_search() {
    let file = file_config(
        "mcts:\n  c_puct: 2.0\n  max_trials: 80\n  seed: 3\n  max_rollout_plies: 50\n",
    );
    let rollout = RandomRollout::from_config(&file);
    let mut m = Mcts::new(Chess, rollout, MctsConfig::from(&file)).unwrap();
    let r = m
        .search(Position::startpos(), &cz_mcts::UniformPriors, &[])
        .unwrap();

    assert_eq!(r.trials, 80);
    assert_eq!(r.stop, StopReason::TrialBudget);
    assert_eq!(r.edges.len(), 20);
    assert_eq!(r.edges.iter().map(|e| e.visits).sum::<u32>(), 80);
    assert_eq!(m.dag().scratch_len(), 0);
}

#[test]
fn model_priors_steer_the_search() {
    let favourite = parse_uci("g1f3").unwrap();
    let provider = PolicyPriors::new(Favourite {
        mv: favourite,
        value: Some(0.0),
        calls: Cell::new(0),
    });
    let cfg = MctsConfig {
        c_puct: 4.0,
        dirichlet_epsilon: 0.0,
        max_trials: Some(60),
        ..MctsConfig::default()
    };
    let mut m = Mcts::new(Chess, EstimatorValue, cfg).unwrap();
    let r = m.search(Position::startpos(), &provider, &[]).unwrap();

    let best = r.most_visited().unwrap();
    assert_eq!(best.action, favourite);
    assert!(best.prior > 0.9);
    assert_eq!(r.stats.fallbacks, 0);
    assert!(provider.model().calls.get() > 60);
}

#[test]
fn search_target_samples_a_legal_move() {
    let position =
        Position::from_str("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4")
            .unwrap();
    let cfg = MctsConfig {
        max_trials: Some(120),
        ..MctsConfig::default()
    };
    let rollout = RandomRollout::new(5).with_max_plies(Some(40));
    let mut m = Mcts::new(Chess, rollout, cfg).unwrap();
    let r = m.search(position, &cz_mcts::UniformPriors, &[]).unwrap();

    let target = policy_target(&r.edges, 1.0).unwrap();
    assert!((target.iter().sum::<f32>() - 1.0).abs() < 1e-4);

    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let legal = position.legal_moves();
    for _ in 0..10 {
        let mv = sample_move(&target, &position, &mut rng).unwrap().unwrap();
        assert!(legal.contains(&mv));
    }
}

#[test]
fn played_game_keeps_reusing_the_tree() {
    let cfg = MctsConfig {
        max_trials: Some(64),
        seed: 1,
        ..MctsConfig::default()
    };
    let rollout = RandomRollout::new(1).with_max_plies(Some(30));
    let mut m = Mcts::new(Chess, rollout, cfg).unwrap();

    let mut position = Position::startpos();
    let mut history = Vec::new();
    for ply in 0..4 {
        let r = m.search(position, &cz_mcts::UniformPriors, &history).unwrap();
        assert_eq!(r.stats.reused_root, ply > 0);
        assert!(m.dag().index_is_consistent());

        let mv = r.most_visited().unwrap().action;
        history.push(position.fen());
        m.advance(&mv).unwrap();
        position = position.play(mv);
    }
}
