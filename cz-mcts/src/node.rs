//! Node and edge statistics for the search DAG.

use std::cell::OnceCell;

use cz_core::{Game, Outcome};

pub type NodeId = u32;

/// Handle to a node in the persistent DAG or in the rollout scratch arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Dag(NodeId),
    /// Ephemeral: lives for one rollout and is never indexed.
    Scratch(u32),
}

impl NodeRef {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, NodeRef::Scratch(_))
    }
}

#[derive(Debug, Clone)]
pub struct Edge<A> {
    pub action: A,
    pub prior: f32,
    pub n: u32,
    pub w: f32,
    pub parent: NodeRef,
    /// Non-owning; several edges may point at the same child.
    pub child: NodeRef,
}

impl<A> Edge<A> {
    pub fn q(&self) -> f32 {
        if self.n == 0 {
            0.0
        } else {
            self.w / (self.n as f32)
        }
    }
}

pub struct Node<G: Game> {
    pub state: G::State,
    /// `None` for ephemeral nodes.
    pub key: Option<G::Key>,
    pub to_play: G::Player,
    pub edges: Vec<Edge<G::Action>>,
    pub n: u32,
    pub w: f32,
    outcome: OnceCell<Outcome<G::Player>>,
}

impl<G: Game> Node<G> {
    pub fn new(game: &G, state: G::State, key: Option<G::Key>) -> Self {
        let to_play = game.to_play(&state);
        Self {
            state,
            key,
            to_play,
            edges: Vec::new(),
            n: 0,
            w: 0.0,
            outcome: OnceCell::new(),
        }
    }

    /// Terminal status, computed on first use.
    pub fn outcome(&self, game: &G) -> Outcome<G::Player> {
        *self.outcome.get_or_init(|| game.outcome(&self.state))
    }

    pub fn is_terminal(&self, game: &G) -> bool {
        self.outcome(game).terminal
    }

    pub fn is_leaf(&self) -> bool {
        self.edges.is_empty()
    }

    /// Terminal leaves and non-terminal nodes with edges.
    pub fn is_expanded(&self, game: &G) -> bool {
        self.is_terminal(game) == self.is_leaf()
    }

    pub fn q(&self) -> f32 {
        if self.n == 0 {
            0.0
        } else {
            self.w / (self.n as f32)
        }
    }
}
