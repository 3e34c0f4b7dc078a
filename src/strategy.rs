//! Queryable policies: the averaged strategy extracted from the info-set
//! table, and the container the best response is returned in.

use crate::game::{Game, Player};
use crate::table::InfoSetTable;
use crate::tree::GameTree;
use rand::Rng;
use std::collections::BTreeMap;

/// A pure policy: per info set, an action list and a probability
/// distribution over it. Once built it depends on neither the tree nor the
/// table.
pub struct Strategy<G: Game> {
    index: BTreeMap<G::InfoSet, (u32, u32)>,
    actions: Vec<G::Action>,
    probas: Vec<f64>,
}

impl<G: Game> Strategy<G> {
    pub(crate) fn empty() -> Self {
        Self {
            index: BTreeMap::new(),
            actions: Vec::new(),
            probas: Vec::new(),
        }
    }

    /// The averaged policy: a single-threaded pass over the tree normalizing
    /// each info set's cumulative strategy, uniform where the sum is zero.
    pub fn average(tree: &GameTree<G>, table: &InfoSetTable) -> Self {
        let mut strategy = Self::empty();
        if !tree.is_empty() {
            strategy.fill_average(tree, table, tree.root());
        }
        strategy
    }

    fn fill_average(&mut self, tree: &GameTree<G>, table: &InfoSetTable, node: usize) {
        if tree.is_terminal(node) {
            return;
        }
        let n = tree.fan_out(node);
        if tree.player(node) == Player::Chance {
            for i in 0..n {
                self.fill_average(tree, table, tree.child(node, i));
            }
            return;
        }
        let info_set = tree.info_set(node);
        if !self.index.contains_key(&info_set) {
            let sums = table.slot(node).cumulative_strategy(n);
            let total: f64 = sums[..n].iter().sum();
            let offset = self.actions.len() as u32;
            for i in 0..n {
                self.actions.push(tree.action(node, i));
                self.probas.push(if total > 0.0 {
                    sums[i] / total
                } else {
                    1.0 / n as f64
                });
            }
            self.index.insert(info_set, (offset, n as u32));
        }
        for i in 0..n {
            self.fill_average(tree, table, tree.child(node, i));
        }
    }

    /// Records a distribution for an info set (best-response construction).
    pub(crate) fn insert(
        &mut self,
        info_set: G::InfoSet,
        actions: &[G::Action],
        probas: &[f64],
    ) {
        debug_assert_eq!(actions.len(), probas.len());
        let offset = self.actions.len() as u32;
        self.actions.extend_from_slice(actions);
        self.probas.extend_from_slice(probas);
        self.index.insert(info_set, (offset, actions.len() as u32));
    }

    /// The stored distribution, in the info set's canonical action order.
    pub fn get_strategy(&self, info_set: &G::InfoSet) -> Option<&[f64]> {
        self.index.get(info_set).map(|&(offset, n)| {
            &self.probas[offset as usize..offset as usize + n as usize]
        })
    }

    /// The info set's action labels.
    pub fn get_actions(&self, info_set: &G::InfoSet) -> Option<&[G::Action]> {
        self.index.get(info_set).map(|&(offset, n)| {
            &self.actions[offset as usize..offset as usize + n as usize]
        })
    }

    /// Draws an action according to the stored distribution.
    pub fn get_action<R: Rng>(&self, info_set: &G::InfoSet, rng: &mut R) -> Option<G::Action> {
        let &(offset, n) = self.index.get(info_set)?;
        let (offset, n) = (offset as usize, n as usize);
        let probas = &self.probas[offset..offset + n];
        let r: f64 = rng.gen();
        let mut cumulative = 0.0;
        for i in 0..n {
            cumulative += probas[i];
            if r < cumulative {
                return Some(self.actions[offset + i]);
            }
        }
        Some(self.actions[offset + n - 1])
    }

    /// Number of info sets with a stored distribution.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Plays one game to the end, P1 following `s1` and P2 following `s2`, and
/// returns the terminal P1 payoff. Chance actions are drawn through the
/// game's own sampler.
pub fn play_once<G: Game, R: Rng>(s1: &Strategy<G>, s2: &Strategy<G>, rng: &mut R) -> i32 {
    let mut game = G::default();
    game.reset();
    while !game.is_over() {
        let action = if game.is_chance() {
            game.sample_action(rng)
        } else {
            let player = game.current_player();
            let strategy = if player == Player::P1 { s1 } else { s2 };
            strategy
                .get_action(&game.info_set(player), rng)
                .expect("strategy has no entry for a reachable info set")
        };
        game.play(action);
    }
    game.payoff(Player::P1)
}
