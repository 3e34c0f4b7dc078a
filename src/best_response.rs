//! Best response and exploitability.
//!
//! The best response walks the tree against a fixed strategy. Because an
//! info set conflates several histories, the response at a player's info set
//! aggregates the action values over *all* states in the set, each weighted
//! by the reach probability that chance and the opponent contribute to it;
//! the per-info-set value is memoized.

use crate::game::{Game, Player, MAX_PLAYER_ACTIONS};
use crate::strategy::Strategy;
use crate::tree::GameTree;
use std::collections::BTreeMap;

/// Below this magnitude (a hundredth of the smallest stake) the game value
/// is treated as zero and the exploitability is reported unnormalized.
/// Symmetric games converge to value 0, where the relative metric diverges.
const VALUE_EPSILON: f64 = 1e-2;

/// Expected root value of `s1` vs `s2` from P1's perspective.
pub fn evaluate<G: Game>(tree: &GameTree<G>, s1: &Strategy<G>, s2: &Strategy<G>) -> f64 {
    evaluate_node(tree, s1, s2, tree.root())
}

fn evaluate_node<G: Game>(
    tree: &GameTree<G>,
    s1: &Strategy<G>,
    s2: &Strategy<G>,
    node: usize,
) -> f64 {
    if tree.is_terminal(node) {
        return tree.payoff(node) as f64;
    }
    let n = tree.fan_out(node);
    let player = tree.player(node);
    if player == Player::Chance {
        let mut value = 0.0;
        for i in 0..n {
            value += tree.chance_proba(node, i) * evaluate_node(tree, s1, s2, tree.child(node, i));
        }
        return value;
    }
    let strategy = if player == Player::P1 { s1 } else { s2 };
    let probs = strategy
        .get_strategy(&tree.info_set(node))
        .expect("strategy has no entry for a reachable info set");
    let mut value = 0.0;
    for i in 0..n {
        value += probs[i] * evaluate_node(tree, s1, s2, tree.child(node, i));
    }
    value
}

/// The deterministic policy maximizing `player`'s expected payoff against
/// the fixed strategy `sigma`. Ties go to the smallest action index.
pub fn best_response<G: Game>(
    tree: &GameTree<G>,
    sigma: &Strategy<G>,
    player: Player,
) -> Strategy<G> {
    assert!(player != Player::Chance, "chance has no best response");
    let mut values = BTreeMap::new();
    let mut response = Strategy::empty();
    fill_best_response(tree, sigma, player, tree.root(), &mut values, &mut response);
    response
}

/// Returns the node value from `player`'s perspective.
fn fill_best_response<G: Game>(
    tree: &GameTree<G>,
    sigma: &Strategy<G>,
    player: Player,
    node: usize,
    values: &mut BTreeMap<G::InfoSet, f64>,
    response: &mut Strategy<G>,
) -> f64 {
    if tree.is_terminal(node) {
        let payoff = tree.payoff(node) as f64;
        return if player == Player::P1 { payoff } else { -payoff };
    }
    let n = tree.fan_out(node);
    let acting = tree.player(node);

    if acting == Player::Chance {
        let mut value = 0.0;
        for i in 0..n {
            value += tree.chance_proba(node, i)
                * fill_best_response(tree, sigma, player, tree.child(node, i), values, response);
        }
        return value;
    }

    let info_set = tree.info_set(node);
    if acting != player {
        let probs = sigma
            .get_strategy(&info_set)
            .expect("strategy has no entry for a reachable info set");
        let mut value = 0.0;
        for i in 0..n {
            value += probs[i]
                * fill_best_response(tree, sigma, player, tree.child(node, i), values, response);
        }
        return value;
    }

    if let Some(&value) = values.get(&info_set) {
        return value;
    }

    // aggregate action values over every state in the info set, weighted by
    // the chance and opponent contributions to reaching that state
    let mut utils = [0.0; MAX_PLAYER_ACTIONS];
    let mut proba_sum = 0.0;
    for state in tree.states(&info_set) {
        let mut reach = G::chance_reach_proba(*state);
        for (opp_info_set, action) in G::info_sets_and_actions(*state, player.opponent()) {
            let probs = sigma
                .get_strategy(&opp_info_set)
                .expect("strategy has no entry for an opponent info set");
            let actions = sigma
                .get_actions(&opp_info_set)
                .expect("strategy has no entry for an opponent info set");
            let pos = actions
                .iter()
                .position(|&a| a == action)
                .expect("action missing from its info set");
            reach *= probs[pos];
        }
        proba_sum += reach;
        let state_node = tree.state_index(state);
        for i in 0..n {
            utils[i] += reach
                * fill_best_response(
                    tree,
                    sigma,
                    player,
                    tree.child(state_node, i),
                    values,
                    response,
                );
        }
    }

    let mut best = 0;
    for i in 1..n {
        if utils[i] > utils[best] {
            best = i;
        }
    }

    let actions: Vec<G::Action> = (0..n).map(|i| tree.action(node, i)).collect();
    let mut one_hot = vec![0.0; n];
    one_hot[best] = 1.0;
    response.insert(info_set, &actions, &one_hot);

    let value = if proba_sum == 0.0 {
        0.0
    } else {
        utils[best] / proba_sum
    };
    values.insert(info_set, value);
    value
}

/// Distance to Nash: the average one-sided gain from unilateral deviation,
/// normalized by the game value's magnitude. For near-zero game values the
/// unnormalized average gain is returned instead of dividing.
pub fn exploitability<G: Game>(tree: &GameTree<G>, sigma: &Strategy<G>) -> f64 {
    let value = evaluate(tree, sigma, sigma);
    let br1 = best_response(tree, sigma, Player::P1);
    let br2 = best_response(tree, sigma, Player::P2);
    let v1 = evaluate(tree, &br1, sigma);
    let v2 = evaluate(tree, sigma, &br2);
    let gain = ((v1 - value).abs() + (v2 - value).abs()) / 2.0;
    if value.abs() < VALUE_EPSILON {
        gain
    } else {
        gain / value.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfr::{CfrSolver, CfrVariant, SolverConfig};
    use crate::game::ActionList;
    use crate::games::{Kuhn, Rps};
    use crate::tree::GameTree;

    /// Chance picks heads (w=25) or tails (w=75), P1 sees the outcome and
    /// picks one of two payoffs: heads [2, 2] (a tie), tails [0, 4].
    #[derive(Default)]
    struct CoinPick {
        history: u64,
        plies: u32,
    }

    impl Game for CoinPick {
        type Action = u8;
        type State = u64;
        type InfoSet = u64;

        const MAX_PLAYER_ACTIONS: usize = 2;
        const MAX_CHANCE_ACTIONS: usize = 2;

        fn reset(&mut self) {
            self.history = 0;
            self.plies = 0;
        }

        fn state(&self) -> u64 {
            (self.plies as u64) << 32 | self.history
        }

        fn set_state(&mut self, state: u64) {
            self.plies = (state >> 32) as u32;
            self.history = state & 0xFFFF_FFFF;
        }

        fn info_set(&self, _player: Player) -> u64 {
            self.state()
        }

        fn current_player(&self) -> Player {
            if self.plies == 0 {
                Player::Chance
            } else {
                Player::P1
            }
        }

        fn is_over(&self) -> bool {
            self.plies == 2
        }

        fn actions(&self, out: &mut ActionList<u8>) {
            out.push(0);
            out.push(1);
        }

        fn chance_weights(&self, out: &mut ActionList<u32>) {
            out.push(25);
            out.push(75);
        }

        fn play(&mut self, action: u8) {
            self.history |= (action as u64) << self.plies;
            self.plies += 1;
        }

        fn undo(&mut self, _action: u8) {
            self.plies -= 1;
            self.history &= !(1 << self.plies);
        }

        fn payoff(&self, player: Player) -> i32 {
            let outcome = self.history & 1;
            let action = (self.history >> 1) & 1;
            let p1 = match (outcome, action) {
                (0, _) => 2,
                (1, 0) => 0,
                (1, 1) => 4,
                _ => unreachable!(),
            };
            if player == Player::P1 {
                p1
            } else {
                -p1
            }
        }

        fn info_sets_and_actions(_state: u64, _player: Player) -> Vec<(u64, u8)> {
            // only P1 ever acts, and never before one of its own nodes
            Vec::new()
        }

        fn chance_reach_proba(state: u64) -> f64 {
            if state & 1 == 0 {
                0.25
            } else {
                0.75
            }
        }
    }

    #[test]
    fn best_response_weights_chance_exactly() {
        let tree = GameTree::<CoinPick>::new();
        let solver = CfrSolver::new(&tree, SolverConfig::default()).unwrap();
        let uniform = solver.average_strategy();

        assert_eq!(evaluate(&tree, &uniform, &uniform), 0.25 * 2.0 + 0.75 * 2.0);

        let br = best_response(&tree, &uniform, Player::P1);
        assert_eq!(evaluate(&tree, &br, &uniform), 0.25 * 2.0 + 0.75 * 4.0);

        // heads is a tie between the two actions: lowest index wins
        let mut game = CoinPick::default();
        game.play(0);
        let heads = br.get_strategy(&game.info_set(Player::P1)).unwrap();
        assert_eq!(heads, &[1.0, 0.0]);
        game.undo(0);
        game.play(1);
        let tails = br.get_strategy(&game.info_set(Player::P1)).unwrap();
        assert_eq!(tails, &[0.0, 1.0]);
    }

    #[test]
    fn exploitability_guards_zero_game_value() {
        let tree = GameTree::<Rps>::new();
        let solver = CfrSolver::new(&tree, SolverConfig::default()).unwrap();
        let uniform = solver.average_strategy();
        // uniform RPS: value 0, and no deviation gains anything
        assert_eq!(evaluate(&tree, &uniform, &uniform), 0.0);
        assert!(exploitability(&tree, &uniform) < 1e-12);
    }

    #[test]
    fn best_response_dominates_the_fixed_strategy() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default()
            .with_variant(CfrVariant::Vanilla)
            .with_threads(1);
        let solver = CfrSolver::new(&tree, config).unwrap();
        solver.solve(1000);
        let sigma = solver.average_strategy();

        let value = evaluate(&tree, &sigma, &sigma);
        let br1 = best_response(&tree, &sigma, Player::P1);
        let br2 = best_response(&tree, &sigma, Player::P2);
        let v1 = evaluate(&tree, &br1, &sigma);
        let v2 = evaluate(&tree, &sigma, &br2);
        assert!(v1 >= value - 1e-12);
        assert!(v2 <= value + 1e-12);
    }

    #[test]
    fn exploitability_decreases_with_training() {
        let tree = GameTree::<Kuhn>::new();
        let solver = CfrSolver::new(&tree, SolverConfig::default().with_threads(1)).unwrap();
        solver.solve(1000);
        let early = exploitability(&tree, &solver.average_strategy());
        solver.solve(9000);
        let late = exploitability(&tree, &solver.average_strategy());
        assert!(late <= early * 1.1, "early {} late {}", early, late);
        assert!(late < 0.5);
    }
}
