//! State Adapter contract consumed by the search engine.
//!
//! The engine never inspects game rules directly; everything it needs about a
//! position goes through [`Game`].

use std::fmt::Debug;
use std::hash::Hash;

/// Terminal status of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome<P> {
    pub terminal: bool,
    /// `None` on a draw or while the game is still running.
    pub winner: Option<P>,
}

impl<P: Copy + PartialEq> Outcome<P> {
    pub const ONGOING: Self = Self {
        terminal: false,
        winner: None,
    };

    pub fn draw() -> Self {
        Self {
            terminal: true,
            winner: None,
        }
    }

    pub fn win(winner: P) -> Self {
        Self {
            terminal: true,
            winner: Some(winner),
        }
    }

    /// +1 if `pov` won, -1 if the other side won, 0 for draws and undecided states.
    pub fn value_for(&self, pov: P) -> f32 {
        match self.winner {
            Some(w) if w == pov => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }
}

/// Rules engine seen by the search: identity, move generation, successor and outcome.
pub trait Game {
    type State: Clone + Debug;
    /// Canonical identity used by the transposition index.
    type Key: Clone + Eq + Hash + Debug;
    type Action: Clone + Debug + PartialEq;
    type Player: Copy + Eq + Debug;

    fn key(&self, state: &Self::State) -> Self::Key;

    /// Appends every legal action of `state` to `out`. Order must be deterministic.
    fn legal_actions(&self, state: &Self::State, out: &mut Vec<Self::Action>);

    fn apply(&self, state: &Self::State, action: &Self::Action) -> Self::State;

    fn outcome(&self, state: &Self::State) -> Outcome<Self::Player>;

    fn to_play(&self, state: &Self::State) -> Self::Player;
}
