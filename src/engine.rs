use std::fmt::Debug;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::heuristic::Evaluator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    /// Player to move after `ply_count` half-moves.
    pub fn from_ply(ply_count: u32) -> Self {
        if ply_count % 2 == 0 { Player::One } else { Player::Two }
    }
}

/// Immutable snapshot of a two-player zero-sum game, as seen by the search.
pub trait GameState: Clone {
    type Action: Clone + PartialEq + Debug;

    /// Legal actions for the player to move, in a stable order.
    fn actions(&self) -> Vec<Self::Action>;
    fn result(&self, action: &Self::Action) -> Self;
    fn terminal_test(&self) -> bool;
    /// Only meaningful at a terminal state; positive favors `player`.
    fn utility(&self, player: Player) -> f64;
    fn player(&self) -> Player;
    fn ply_count(&self) -> u32;
}

/// Games where each player occupies a location and can reach a set of others.
pub trait Mobility: GameState {
    type Location;

    fn loc(&self, player: Player) -> Option<Self::Location>;
    fn liberties(&self, loc: Option<Self::Location>) -> Vec<Self::Location>;

    fn mobility(&self, player: Player) -> usize {
        self.liberties(self.loc(player)).len()
    }
}

/// What a node returns once its remaining siblings are pruned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Cutoff {
    /// Return the violated bound and overwrite it with the running value.
    #[default]
    Bound,
    /// Textbook alpha-beta: return the running value and only tighten bounds.
    Value,
}

pub struct AlphaBeta<E> {
    evaluator: E,
    cutoff: Cutoff,
    nodes: u64,
}

impl<E> AlphaBeta<E> {
    pub fn new(evaluator: E, cutoff: Cutoff) -> Self {
        Self { evaluator, cutoff, nodes: 0 }
    }

    /// Nodes visited by the most recent search.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Pick the root action whose reply subtree has the highest value for
    /// `root`. Ties go to the first action in enumeration order.
    pub fn choose_action<S>(&mut self, state: &S, depth: i32, root: Player) -> Result<S::Action>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        let (action, value) = self.search(state, depth, root)?;
        debug!("alpha-beta depth {}: chose {:?} (value {})", depth, action, value);
        Ok(action)
    }

    /// Best root action together with its minimax value for `root`.
    pub fn search<S>(&mut self, state: &S, depth: i32, root: Player) -> Result<(S::Action, f64)>
    where
        S: GameState,
        E: Evaluator<S>,
    {
        self.nodes = 0;
        let mut best: Option<(S::Action, f64)> = None;
        for action in state.actions() {
            // every root child gets the full window
            let value = self.min_value(&state.result(&action), f64::NEG_INFINITY, f64::INFINITY, depth.saturating_sub(1), root);
            if best.as_ref().map_or(true, |(_, best_value)| value > *best_value) {
                best = Some((action, value));
            }
        }
        best.ok_or(Error::NoLegalActions)
    }

    fn min_value<S>(&mut self, state: &S, alpha: f64, mut beta: f64, depth: i32, root: Player) -> f64
    where
        S: GameState,
        E: Evaluator<S>,
    {
        self.nodes += 1;
        // terminal before cutoff: the evaluator never sees a finished game
        if state.terminal_test() {
            return state.utility(root);
        }
        if depth <= 0 {
            return self.evaluator.evaluate(state, depth, root);
        }
        let mut value = f64::INFINITY;
        for action in state.actions() {
            value = value.min(self.max_value(&state.result(&action), alpha, beta, depth.saturating_sub(1), root));
            if alpha >= value {
                return match self.cutoff {
                    Cutoff::Bound => alpha,
                    Cutoff::Value => value,
                };
            }
            beta = match self.cutoff {
                Cutoff::Bound => value,
                Cutoff::Value => beta.min(value),
            };
        }
        value
    }

    fn max_value<S>(&mut self, state: &S, mut alpha: f64, beta: f64, depth: i32, root: Player) -> f64
    where
        S: GameState,
        E: Evaluator<S>,
    {
        self.nodes += 1;
        if state.terminal_test() {
            return state.utility(root);
        }
        if depth <= 0 {
            return self.evaluator.evaluate(state, depth, root);
        }
        let mut value = f64::NEG_INFINITY;
        for action in state.actions() {
            value = value.max(self.min_value(&state.result(&action), alpha, beta, depth.saturating_sub(1), root));
            if beta <= value {
                return match self.cutoff {
                    Cutoff::Bound => beta,
                    Cutoff::Value => value,
                };
            }
            alpha = match self.cutoff {
                Cutoff::Bound => value,
                Cutoff::Value => alpha.max(value),
            };
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::Cell;

    /// Explicit game tree; leaf values are utilities for `Player::One`.
    #[derive(Clone, Debug)]
    enum Tree {
        Leaf(f64),
        Node(Vec<Tree>),
    }

    #[derive(Clone, Debug)]
    struct TreeGame {
        tree: Tree,
        ply: u32,
    }

    impl TreeGame {
        fn new(tree: Tree) -> Self {
            Self { tree, ply: 0 }
        }

        fn first_leaf(&self) -> f64 {
            let mut tree = &self.tree;
            loop {
                match tree {
                    Tree::Leaf(v) => return *v,
                    Tree::Node(children) => tree = &children[0],
                }
            }
        }
    }

    impl GameState for TreeGame {
        type Action = usize;

        fn actions(&self) -> Vec<usize> {
            match &self.tree {
                Tree::Leaf(_) => vec![],
                Tree::Node(children) => (0..children.len()).collect(),
            }
        }

        fn result(&self, action: &usize) -> Self {
            match &self.tree {
                Tree::Node(children) => TreeGame { tree: children[*action].clone(), ply: self.ply + 1 },
                Tree::Leaf(_) => panic!("no actions at a leaf"),
            }
        }

        fn terminal_test(&self) -> bool {
            matches!(self.tree, Tree::Leaf(_))
        }

        fn utility(&self, player: Player) -> f64 {
            match (&self.tree, player) {
                (Tree::Leaf(v), Player::One) => *v,
                (Tree::Leaf(v), Player::Two) => -*v,
                _ => 0.0,
            }
        }

        fn player(&self) -> Player {
            Player::from_ply(self.ply)
        }

        fn ply_count(&self) -> u32 {
            self.ply
        }
    }

    /// Scores a cutoff node by its leftmost leaf and counts the calls.
    #[derive(Default)]
    struct LeftmostLeaf {
        calls: Cell<u32>,
    }

    impl Evaluator<TreeGame> for LeftmostLeaf {
        fn evaluate(&self, state: &TreeGame, _depth: i32, player: Player) -> f64 {
            assert!(!state.terminal_test(), "evaluated a terminal state");
            self.calls.set(self.calls.get() + 1);
            match player {
                Player::One => state.first_leaf(),
                Player::Two => -state.first_leaf(),
            }
        }
    }

    fn leaf(v: f64) -> Tree {
        Tree::Leaf(v)
    }

    fn node(children: Vec<Tree>) -> Tree {
        Tree::Node(children)
    }

    fn minimax(state: &TreeGame, depth: i32, root: Player, maximizing: bool) -> f64 {
        if state.terminal_test() {
            return state.utility(root);
        }
        if depth <= 0 {
            return LeftmostLeaf::default().evaluate(state, depth, root);
        }
        let values = state.actions().into_iter().map(|a| minimax(&state.result(&a), depth - 1, root, !maximizing));
        if maximizing {
            values.fold(f64::NEG_INFINITY, f64::max)
        } else {
            values.fold(f64::INFINITY, f64::min)
        }
    }

    fn root_minimax(state: &TreeGame, depth: i32, root: Player) -> f64 {
        state.actions().into_iter()
            .map(|a| minimax(&state.result(&a), depth - 1, root, false))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn random_tree(rng: &mut StdRng, height: u32) -> Tree {
        if height == 0 || (height < 4 && rng.gen_bool(0.2)) {
            return leaf(rng.gen_range(-10..=10) as f64);
        }
        let width = rng.gen_range(1..=4);
        node((0..width).map(|_| random_tree(rng, height - 1)).collect())
    }

    #[test]
    fn test_pruned_value_matches_full_minimax() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..300 {
            let game = TreeGame::new(random_tree(&mut rng, 6));
            if game.terminal_test() {
                continue;
            }
            for depth in 1..=7 {
                let expected = root_minimax(&game, depth, Player::One);
                for cutoff in [Cutoff::Bound, Cutoff::Value] {
                    let mut engine = AlphaBeta::new(LeftmostLeaf::default(), cutoff);
                    let value = engine.search(&game, depth, Player::One).unwrap().1;
                    assert_eq!(value, expected, "depth {} cutoff {:?} tree {:?}", depth, cutoff, game.tree);
                }
            }
        }
    }

    fn count_nodes(tree: &Tree) -> u64 {
        match tree {
            Tree::Leaf(_) => 1,
            Tree::Node(children) => 1 + children.iter().map(count_nodes).sum::<u64>(),
        }
    }

    #[test]
    fn test_pruning_skips_nodes() {
        // the second max node fails high on its first leaf (5 >= 3)
        let reply = node(vec![node(vec![leaf(3.0)]), node(vec![leaf(5.0), leaf(1.0), leaf(1.0)])]);
        let full = count_nodes(&reply);
        let game = TreeGame::new(node(vec![reply]));
        let mut engine = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        assert_eq!(engine.search(&game, 4, Player::One).unwrap().1, 3.0);
        assert_eq!(full, 7);
        assert_eq!(engine.nodes(), 5);
    }

    #[test]
    fn test_bound_cutoff_returns_the_window_edge() {
        // min node: 5 narrows beta, then 1 falls below alpha = 2
        let min_node = TreeGame { tree: node(vec![leaf(5.0), leaf(1.0)]), ply: 1 };
        let mut bound = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        let mut value = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Value);
        assert_eq!(bound.min_value(&min_node, 2.0, f64::INFINITY, 3, Player::One), 2.0);
        assert_eq!(value.min_value(&min_node, 2.0, f64::INFINITY, 3, Player::One), 1.0);

        // max node: 5 climbs past beta = 3
        let max_node = TreeGame::new(node(vec![leaf(1.0), leaf(5.0)]));
        assert_eq!(bound.max_value(&max_node, f64::NEG_INFINITY, 3.0, 3, Player::One), 3.0);
        assert_eq!(value.max_value(&max_node, f64::NEG_INFINITY, 3.0, 3, Player::One), 5.0);
    }

    #[test]
    fn test_bound_cutoff_overwrites_the_window() {
        // after the first reply beta becomes 5 under Bound but stays 2 under Value,
        // so only Value lets the inner max node fail high on its first leaf
        let min_node = TreeGame { tree: node(vec![leaf(5.0), node(vec![leaf(3.0), leaf(4.0)])]), ply: 1 };
        let mut bound = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        let mut value = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Value);
        assert_eq!(bound.min_value(&min_node, f64::NEG_INFINITY, 2.0, 3, Player::One), 4.0);
        assert_eq!(value.min_value(&min_node, f64::NEG_INFINITY, 2.0, 3, Player::One), 3.0);

        // mirrored for a max node: alpha becomes 1 under Bound, stays 4 under Value
        let max_node = TreeGame::new(node(vec![leaf(1.0), node(vec![leaf(3.0), leaf(2.0)])]));
        assert_eq!(bound.max_value(&max_node, 4.0, f64::INFINITY, 3, Player::One), 2.0);
        assert_eq!(value.max_value(&max_node, 4.0, f64::INFINITY, 3, Player::One), 3.0);
    }

    #[test]
    fn test_ties_go_to_first_action() {
        let game = TreeGame::new(node(vec![leaf(1.0), leaf(4.0), leaf(4.0), leaf(4.0)]));
        let mut engine = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        assert_eq!(engine.choose_action(&game, 4, Player::One).unwrap(), 1);
    }

    #[test]
    fn test_terminal_children_use_utility() {
        // depth 1 turns every non-terminal child into a cutoff node
        let game = TreeGame::new(node(vec![node(vec![leaf(100.0)]), leaf(7.0)]));
        let evaluator = LeftmostLeaf::default();
        let mut engine = AlphaBeta::new(evaluator, Cutoff::Bound);
        let action = engine.choose_action(&game, 1, Player::One).unwrap();
        assert_eq!(action, 0);
        assert_eq!(engine.evaluator.calls.get(), 1);

        let game = TreeGame::new(node(vec![node(vec![leaf(-3.0)]), leaf(7.0)]));
        let mut engine = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        assert_eq!(engine.choose_action(&game, 1, Player::One).unwrap(), 1);
        assert_eq!(engine.search(&game, 1, Player::One).unwrap().1, 7.0);
    }

    #[test]
    fn test_values_are_from_root_perspective() {
        let game = TreeGame { tree: node(vec![leaf(1.0), leaf(-2.0)]), ply: 1 };
        let mut engine = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        assert_eq!(game.player(), Player::Two);
        assert_eq!(engine.choose_action(&game, 3, Player::Two).unwrap(), 1);
        assert_eq!(engine.search(&game, 3, Player::Two).unwrap().1, 2.0);
    }

    #[test]
    fn test_non_positive_depth_evaluates_children() {
        let game = TreeGame::new(node(vec![node(vec![leaf(-1.0)]), node(vec![leaf(6.0)])]));
        for depth in [0, -3, i32::MIN] {
            let mut engine = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
            assert_eq!(engine.choose_action(&game, depth, Player::One).unwrap(), 1);
            assert_eq!(engine.evaluator.calls.get(), 2);
        }
    }

    #[test]
    fn test_empty_root_is_an_error() {
        let game = TreeGame::new(leaf(0.0));
        let mut engine = AlphaBeta::new(LeftmostLeaf::default(), Cutoff::Bound);
        assert!(matches!(engine.choose_action(&game, 4, Player::One), Err(Error::NoLegalActions)));
    }

    #[test]
    fn test_player_helpers() {
        assert_eq!(Player::One.opponent(), Player::Two);
        assert_eq!(Player::Two.index(), 1);
        assert_eq!(Player::from_ply(0), Player::One);
        assert_eq!(Player::from_ply(7), Player::Two);
    }
}
