//! Flat, immutable snapshot of the reachable game.
//!
//! The tree replaces a pointer-rich node graph with contiguous arrays indexed
//! by node id. Each node packs its kind and fan-out into one `u32` (low two
//! bits = kind, upper bits = fan-out, fan-out 0 marks a terminal), stores its
//! children as indices, and shares one offset table between the child and
//! action arrays. Chance rows interleave `(child, weight)` pairs and pad the
//! action row so both arrays stay aligned; a terminal's payoff lives in its
//! single child slot. Parallel workers read the finished tree concurrently
//! without synchronization.

use crate::game::{ActionList, Game, Player, MAX_CHANCE_ACTIONS, MAX_PLAYER_ACTIONS};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const KIND_MASK: u32 = 0b11;
const FANOUT_SHIFT: u32 = 2;

/// Recursion guard for the builder; a well-formed game never gets close.
const MAX_DEPTH: u32 = 4096;

/// The compact game tree. Node 0 is the root; children always have larger
/// indices than their parent (DFS construction order).
pub struct GameTree<G: Game> {
    info_sets: Vec<G::InfoSet>,
    actions: Vec<G::Action>,
    kind_and_fanout: Vec<u32>,
    start: Vec<u32>,
    children: Vec<i32>,
    chance_probas: Vec<f64>,
    proba_start: Vec<u32>,
    info_set_to_states: BTreeMap<G::InfoSet, Vec<G::State>>,
    state_to_index: HashMap<G::State, u32>,
}

impl<G: Game> GameTree<G> {
    /// Builds the tree of `G` starting from its initial state.
    pub fn new() -> Self {
        let mut game = G::default();
        Self::build(&mut game)
    }

    /// Builds the tree by exhausting `game` with `play`/`undo`; the game is
    /// reset first and left at its initial state.
    pub fn build(game: &mut G) -> Self {
        assert!(G::MAX_PLAYER_ACTIONS <= MAX_PLAYER_ACTIONS);
        assert!(G::MAX_CHANCE_ACTIONS <= MAX_CHANCE_ACTIONS);
        game.reset();
        let mut tree = Self {
            info_sets: Vec::new(),
            actions: Vec::new(),
            kind_and_fanout: Vec::new(),
            start: Vec::new(),
            children: Vec::new(),
            chance_probas: Vec::new(),
            proba_start: Vec::new(),
            info_set_to_states: BTreeMap::new(),
            state_to_index: HashMap::new(),
        };
        tree.build_node(game, 0);
        tree
    }

    fn build_node(&mut self, game: &mut G, depth: u32) -> u32 {
        assert!(depth < MAX_DEPTH, "game tree too deep; cyclic game?");
        let idx = self.kind_and_fanout.len() as u32;
        self.info_sets.push(game.info_set(game.current_player()));
        self.state_to_index.insert(game.state(), idx);
        self.start.push(self.children.len() as u32);
        self.proba_start.push(self.chance_probas.len() as u32);
        self.kind_and_fanout.push(0);

        if game.is_over() {
            // fan-out 0 marks the terminal; the payoff takes the child slot
            self.children.push(game.payoff(Player::P1));
            self.actions.push(G::Action::default());
            return idx;
        }

        let mut actions = ActionList::new();
        game.actions(&mut actions);
        let n = actions.len();
        assert!(n >= 1, "non-terminal node with no legal action");

        if game.is_chance() {
            assert!(
                n <= G::MAX_CHANCE_ACTIONS,
                "chance fan-out {} exceeds the declared bound {}",
                n,
                G::MAX_CHANCE_ACTIONS
            );
            let mut weights = ActionList::new();
            game.chance_weights(&mut weights);
            assert_eq!(weights.len(), n, "one weight per chance action");
            assert!(
                weights.iter().all(|&w| w > 0),
                "chance weights must be positive"
            );
            self.kind_and_fanout[idx as usize] =
                ((n as u32) << FANOUT_SHIFT) | Player::Chance.tag();

            let sum: u32 = weights.iter().sum();
            for i in 0..n {
                self.chance_probas.push(weights[i] as f64 / sum as f64);
            }

            for i in 0..n {
                self.actions.push(actions[i]);
            }
            // padding keeps the action row as wide as the (child, weight) row
            for _ in 0..n {
                self.actions.push(G::Action::default());
            }

            let slot = self.children.len();
            self.children.extend(std::iter::repeat(0).take(2 * n));
            for i in 0..n {
                let a = actions[i];
                let before = game.state();
                game.play(a);
                let child = self.build_node(game, depth + 1);
                game.undo(a);
                debug_assert!(game.state() == before, "play/undo round-trip violated");
                self.children[slot + 2 * i] = child as i32;
                self.children[slot + 2 * i + 1] = weights[i] as i32;
            }
        } else {
            assert!(
                n <= G::MAX_PLAYER_ACTIONS,
                "player fan-out {} exceeds the declared bound {}",
                n,
                G::MAX_PLAYER_ACTIONS
            );
            let player = game.current_player();
            self.kind_and_fanout[idx as usize] = ((n as u32) << FANOUT_SHIFT) | player.tag();
            self.info_set_to_states
                .entry(self.info_sets[idx as usize])
                .or_default()
                .push(game.state());

            for i in 0..n {
                self.actions.push(actions[i]);
            }

            let slot = self.children.len();
            self.children.extend(std::iter::repeat(0).take(n));
            for i in 0..n {
                let a = actions[i];
                let before = game.state();
                game.play(a);
                let child = self.build_node(game, depth + 1);
                game.undo(a);
                debug_assert!(game.state() == before, "play/undo round-trip violated");
                self.children[slot + i] = child as i32;
            }
        }
        idx
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.kind_and_fanout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kind_and_fanout.is_empty()
    }

    /// The root node index (always 0).
    #[inline]
    pub fn root(&self) -> usize {
        0
    }

    /// Number of outgoing edges; 0 for terminals.
    #[inline]
    pub fn fan_out(&self, node: usize) -> usize {
        (self.kind_and_fanout[node] >> FANOUT_SHIFT) as usize
    }

    #[inline]
    pub fn is_terminal(&self, node: usize) -> bool {
        self.fan_out(node) == 0
    }

    /// The acting party. Meaningless (but safe to call) at terminals.
    #[inline]
    pub fn player(&self, node: usize) -> Player {
        Player::from_tag(self.kind_and_fanout[node] & KIND_MASK)
    }

    /// Terminal nodes only: the stored P1 payoff.
    #[inline]
    pub fn payoff(&self, node: usize) -> i32 {
        debug_assert!(self.is_terminal(node));
        self.children[self.start[node] as usize]
    }

    /// Index of the `i`-th child.
    #[inline]
    pub fn child(&self, node: usize, i: usize) -> usize {
        debug_assert!(i < self.fan_out(node));
        let start = self.start[node] as usize;
        let stride = if self.player(node) == Player::Chance {
            2
        } else {
            1
        };
        self.children[start + stride * i] as usize
    }

    /// Chance nodes only: the raw integer weight of the `i`-th edge.
    #[inline]
    pub fn chance_weight(&self, node: usize, i: usize) -> u32 {
        debug_assert!(self.player(node) == Player::Chance);
        self.children[self.start[node] as usize + 2 * i + 1] as u32
    }

    /// Chance nodes only: the normalized probability of the `i`-th edge,
    /// computed once at build time.
    #[inline]
    pub fn chance_proba(&self, node: usize, i: usize) -> f64 {
        debug_assert!(self.player(node) == Player::Chance);
        self.chance_probas[self.proba_start[node] as usize + i]
    }

    /// The action label of the `i`-th edge.
    #[inline]
    pub fn action(&self, node: usize, i: usize) -> G::Action {
        debug_assert!(i < self.fan_out(node));
        self.actions[self.start[node] as usize + i]
    }

    /// The acting player's info set, recorded uniformly for every node.
    #[inline]
    pub fn info_set(&self, node: usize) -> G::InfoSet {
        self.info_sets[node]
    }

    /// All concrete states sharing the given player info set.
    pub fn states(&self, info_set: &G::InfoSet) -> &[G::State] {
        self.info_set_to_states
            .get(info_set)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The node index a state was recorded at during the build.
    pub fn state_index(&self, state: &G::State) -> usize {
        self.state_to_index[state] as usize
    }

    fn fmt_subtree(&self, f: &mut fmt::Formatter<'_>, node: usize, prefix: &str) -> fmt::Result {
        let n = self.fan_out(node);
        let chance = !self.is_terminal(node) && self.player(node) == Player::Chance;
        for i in 0..n {
            let last = i + 1 == n;
            let connector = if last { "`-" } else { "|-" };
            write!(f, "{}{} {:?}", prefix, connector, self.action(node, i))?;
            if chance {
                write!(f, " ({})", self.chance_weight(node, i))?;
            }
            let child = self.child(node, i);
            if self.is_terminal(child) {
                writeln!(f, " [{}]", self.payoff(child))?;
            } else {
                writeln!(f)?;
                let extended = format!("{}{}", prefix, if last { "   " } else { "|  " });
                self.fmt_subtree(f, child, &extended)?;
            }
        }
        Ok(())
    }
}

impl<G: Game> Default for GameTree<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Game> fmt::Display for GameTree<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "empty");
        }
        if self.is_terminal(self.root()) {
            writeln!(f, "[{}]", self.payoff(self.root()))?;
        } else {
            self.fmt_subtree(f, self.root(), "")?;
        }
        write!(f, "#nodes: {}", self.len())
    }
}
