//! Estimator interface used by expansion and leaf evaluation.

use cz_core::{move_to_policy_index, Chess, Game, Position, POLICY_SIZE};

/// Per-action priors and an optional value for one state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estimate {
    /// Aligned with the `actions` slice handed to the provider.
    pub priors: Vec<f32>,
    /// In [-1, 1] from the point of view of the player to move.
    pub value: Option<f32>,
}

/// Supplies priors (and optionally a value) for a state about to be expanded.
///
/// `history` holds at most `history_len` state keys and ends with the key of `state`.
/// The returned estimate is used only for the duration of one expansion.
pub trait PriorProvider<G: Game> {
    fn evaluate(&self, history: &[G::Key], state: &G::State, actions: &[G::Action]) -> Estimate;
}

/// Uniform priors, no value.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPriors;

impl<G: Game> PriorProvider<G> for UniformPriors {
    fn evaluate(&self, _history: &[G::Key], _state: &G::State, actions: &[G::Action]) -> Estimate {
        let p = if actions.is_empty() {
            0.0
        } else {
            1.0 / actions.len() as f32
        };
        Estimate {
            priors: vec![p; actions.len()],
            value: None,
        }
    }
}

/// Output of a [`PolicyModel`] over the flat 8×8×73 action space.
#[derive(Debug, Clone, Default)]
pub struct Prediction {
    pub policy: Vec<f32>,
    pub value: Option<f32>,
}

/// A model that scores every slot of the flat action space from a FEN history.
pub trait PolicyModel {
    fn predict(&self, history: &[String], position: &Position) -> Prediction;
}

/// Projects a [`PolicyModel`] onto the legal moves of a position.
pub struct PolicyPriors<M> {
    model: M,
}

impl<M: PolicyModel> PolicyPriors<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: PolicyModel> PriorProvider<Chess> for PolicyPriors<M> {
    fn evaluate(
        &self,
        history: &[String],
        state: &Position,
        actions: &[chess::ChessMove],
    ) -> Estimate {
        let prediction = self.model.predict(history, state);
        if prediction.policy.len() != POLICY_SIZE {
            log::warn!(
                "policy model returned {} entries, expected {POLICY_SIZE}; using uniform priors",
                prediction.policy.len()
            );
        }
        let mut priors: Vec<f32> = actions
            .iter()
            .map(|&mv| {
                move_to_policy_index(mv)
                    .ok()
                    .and_then(|i| prediction.policy.get(i).copied())
                    .filter(|p| p.is_finite() && *p > 0.0)
                    .unwrap_or(0.0)
            })
            .collect();
        let sum: f32 = priors.iter().sum();
        if sum > 0.0 {
            for p in &mut priors {
                *p /= sum;
            }
        } else if !priors.is_empty() {
            let u = 1.0 / priors.len() as f32;
            priors.iter_mut().for_each(|p| *p = u);
        }
        Estimate {
            priors,
            value: prediction.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cz_core::parse_uci;

    struct OneHot(usize, Option<f32>);

    impl PolicyModel for OneHot {
        fn predict(&self, _history: &[String], _position: &Position) -> Prediction {
            let mut policy = vec![0.0; POLICY_SIZE];
            policy[self.0] = 3.0;
            Prediction {
                policy,
                value: self.1,
            }
        }
    }

    #[test]
    fn uniform_priors_sum_to_one() {
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let est = PriorProvider::<Chess>::evaluate(&UniformPriors, &[], &pos, &moves);
        assert_eq!(est.priors.len(), 20);
        assert!((est.priors.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(est.value, None);
    }

    #[test]
    fn policy_priors_project_and_renormalize() {
        let e2e4 = parse_uci("e2e4").unwrap();
        let provider = PolicyPriors::new(OneHot(move_to_policy_index(e2e4).unwrap(), Some(0.25)));
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let est = provider.evaluate(&[pos.fen()], &pos, &moves);

        for (mv, p) in moves.iter().zip(&est.priors) {
            if *mv == e2e4 {
                assert_eq!(*p, 1.0);
            } else {
                assert_eq!(*p, 0.0);
            }
        }
        assert_eq!(est.value, Some(0.25));
    }

    #[test]
    fn policy_priors_without_legal_mass_are_uniform() {
        // Slot 0 of a8 is never legal from the start position.
        let provider = PolicyPriors::new(OneHot(0, None));
        let pos = Position::startpos();
        let moves = pos.legal_moves();
        let est = provider.evaluate(&[], &pos, &moves);
        assert!(est.priors.iter().all(|p| (*p - 0.05).abs() < 1e-6));
    }
}
