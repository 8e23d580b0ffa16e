//! Arena-backed DAG storage.
//!
//! Persistent nodes live in `nodes` and are indexed by state key; at most one
//! persistent node exists per key. Rollout nodes live in `scratch`, are never
//! indexed and are dropped in bulk by [`Dag::clear_scratch`].

use std::collections::VecDeque;

use cz_core::Game;
use rustc_hash::FxHashMap;

use crate::mcts::MctsError;
use crate::node::{Edge, Node, NodeId, NodeRef};

/// How children are materialized during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// Children are merged through the transposition index.
    Search,
    /// Children go to the scratch arena.
    Simulation,
}

pub struct Dag<G: Game> {
    nodes: Vec<Node<G>>,
    scratch: Vec<Node<G>>,
    index: FxHashMap<G::Key, NodeId>,
}

impl<G: Game> Dag<G> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            scratch: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Number of persistent nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.scratch.clear();
        self.index.clear();
    }

    pub fn get(&self, r: NodeRef) -> &Node<G> {
        match r {
            NodeRef::Dag(id) => &self.nodes[id as usize],
            NodeRef::Scratch(id) => &self.scratch[id as usize],
        }
    }

    pub fn get_mut(&mut self, r: NodeRef) -> &mut Node<G> {
        match r {
            NodeRef::Dag(id) => &mut self.nodes[id as usize],
            NodeRef::Scratch(id) => &mut self.scratch[id as usize],
        }
    }

    pub fn lookup(&self, key: &G::Key) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Persistent node for `state`, created and indexed if its key is new.
    pub fn intern(&mut self, game: &G, state: G::State) -> NodeId {
        let key = game.key(&state);
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = self.nodes.len() as NodeId;
        self.index.insert(key.clone(), id);
        self.nodes.push(Node::new(game, state, Some(key)));
        id
    }

    fn push_scratch(&mut self, game: &G, state: G::State) -> NodeRef {
        let id = self.scratch.len() as u32;
        self.scratch.push(Node::new(game, state, None));
        NodeRef::Scratch(id)
    }

    /// Legal actions of a node about to be expanded.
    pub fn expandable_actions(
        &self,
        game: &G,
        node: NodeRef,
    ) -> Result<Vec<G::Action>, MctsError> {
        let n = self.get(node);
        if n.is_expanded(game) {
            return Err(MctsError::AlreadyExpanded);
        }
        let mut actions = Vec::new();
        game.legal_actions(&n.state, &mut actions);
        if actions.is_empty() {
            return Err(MctsError::NoLegalActions);
        }
        Ok(actions)
    }

    /// Creates one edge per action. `priors[i]` belongs to `actions[i]`.
    ///
    /// Children of an ephemeral node, and every child in simulation mode, are
    /// ephemeral. Otherwise existing nodes are reused through the index.
    pub fn attach_edges(
        &mut self,
        game: &G,
        parent: NodeRef,
        actions: Vec<G::Action>,
        priors: &[f32],
        mode: ExpandMode,
    ) -> Result<(), MctsError> {
        if priors.len() != actions.len() {
            return Err(MctsError::PriorLengthMismatch {
                expected: actions.len(),
                got: priors.len(),
            });
        }
        if !self.get(parent).is_leaf() {
            return Err(MctsError::AlreadyExpanded);
        }
        let ephemeral = mode == ExpandMode::Simulation || parent.is_ephemeral();
        let state = self.get(parent).state.clone();

        let mut edges = Vec::with_capacity(actions.len());
        for (action, &prior) in actions.into_iter().zip(priors) {
            let child_state = game.apply(&state, &action);
            let child = if ephemeral {
                self.push_scratch(game, child_state)
            } else {
                NodeRef::Dag(self.intern(game, child_state))
            };
            edges.push(Edge {
                action,
                prior,
                n: 0,
                w: 0.0,
                parent,
                child,
            });
        }
        self.get_mut(parent).edges = edges;
        Ok(())
    }

    /// Drops a node's edges, making whatever hung below it unreachable through it.
    pub fn detach(&mut self, node: NodeRef) {
        self.get_mut(node).edges.clear();
    }

    pub fn clear_scratch(&mut self) {
        self.scratch.clear();
    }

    /// Keeps only the persistent nodes reachable from `root`, renumbering them
    /// in breadth-first order and rebuilding the index. Returns the new root id.
    pub fn retain_reachable(&mut self, root: NodeId) -> NodeId {
        const UNSEEN: NodeId = NodeId::MAX;
        let mut remap = vec![UNSEEN; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        remap[root as usize] = 0;
        order.push(root);
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            for e in &self.nodes[id as usize].edges {
                if let NodeRef::Dag(c) = e.child {
                    if remap[c as usize] == UNSEEN {
                        remap[c as usize] = order.len() as NodeId;
                        order.push(c);
                        queue.push_back(c);
                    }
                }
            }
        }

        let mut slots: Vec<Option<Node<G>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.index.clear();
        self.scratch.clear();
        for old in order {
            let Some(mut node) = slots[old as usize].take() else {
                continue;
            };
            let new_id = remap[old as usize];
            for e in &mut node.edges {
                e.parent = NodeRef::Dag(new_id);
                if let NodeRef::Dag(c) = e.child {
                    e.child = NodeRef::Dag(remap[c as usize]);
                }
            }
            if let Some(key) = &node.key {
                self.index.insert(key.clone(), new_id);
            }
            self.nodes.push(node);
        }
        0
    }

    /// Every persistent node is indexed under its own key.
    pub fn index_is_consistent(&self) -> bool {
        self.index.len() == self.nodes.len()
            && self.nodes.iter().enumerate().all(|(i, n)| {
                n.key
                    .as_ref()
                    .and_then(|k| self.index.get(k))
                    .is_some_and(|&id| id as usize == i)
            })
    }
}

impl<G: Game> Default for Dag<G> {
    fn default() -> Self {
        Self::new()
    }
}
