//! The CFR iteration kernel: one family of solvers with pluggable
//! regret/strategy weighting (vanilla CFR, Linear CFR, CFR+, Discounted CFR).
//!
//! One iteration walks the whole tree for one *updating player*, accumulating
//! weighted regret and cumulative-strategy deltas into the shared
//! [`InfoSetTable`]. `solve` dispatches iterations across a thread pool;
//! iterations alternate the updating player on the parity of an atomically
//! drawn 1-based tag, which is essential for convergence.

use crate::game::{Game, Player, MAX_PLAYER_ACTIONS};
use crate::strategy::Strategy;
use crate::table::InfoSetTable;
use crate::tree::GameTree;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default reach-probability threshold below which a branch is skipped.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 1e-6;

/// Parameters of Discounted CFR.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscountParams {
    /// Exponent of the positive-regret weight `t^a / (t^a + 1)`.
    pub alpha: f64,
    /// Exponent of the negative-regret weight `t^b / (t^b + 1)`.
    pub beta: f64,
    /// Exponent of the strategy weight `(t / (t + 1))^g`.
    pub gamma: f64,
}

impl Default for DiscountParams {
    fn default() -> Self {
        Self {
            alpha: 1.5,
            beta: 0.0,
            gamma: 2.0,
        }
    }
}

impl DiscountParams {
    #[inline]
    fn positive_regret_weight(&self, t: f64) -> f64 {
        let x = t.powf(self.alpha);
        x / (x + 1.0)
    }

    #[inline]
    fn negative_regret_weight(&self, t: f64) -> f64 {
        let x = t.powf(self.beta);
        x / (x + 1.0)
    }

    #[inline]
    fn strategy_weight(&self, t: f64) -> f64 {
        (t / (t + 1.0)).powf(self.gamma)
    }
}

/// The variant dial: the CFR flavors differ only in two scalar weight
/// functions and the CFR+ clamp, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CfrVariant {
    /// Unweighted accumulation.
    Vanilla,
    /// Both deltas weighted by the iteration index.
    Linear,
    /// Regrets floored at zero inside the accumulate, linear strategy
    /// weighting. Fastest convergence for most games.
    #[default]
    CfrPlus,
    /// Discounted CFR with configurable parameters.
    Discounted(DiscountParams),
}

impl CfrVariant {
    /// Weight applied to a regret delta at iteration `t` (1-based). For
    /// Discounted CFR the weight depends on the sign of the delta.
    #[inline]
    pub(crate) fn regret_weight(&self, t: u64, delta: f64) -> f64 {
        match self {
            CfrVariant::Vanilla | CfrVariant::CfrPlus => 1.0,
            CfrVariant::Linear => t as f64,
            CfrVariant::Discounted(p) => {
                if delta > 0.0 {
                    p.positive_regret_weight(t as f64)
                } else {
                    p.negative_regret_weight(t as f64)
                }
            }
        }
    }

    /// Weight applied to a cumulative-strategy delta at iteration `t`.
    #[inline]
    pub(crate) fn strategy_weight(&self, t: u64) -> f64 {
        match self {
            CfrVariant::Vanilla => 1.0,
            CfrVariant::Linear | CfrVariant::CfrPlus => t as f64,
            CfrVariant::Discounted(p) => p.strategy_weight(t as f64),
        }
    }

    /// Whether regrets are clamped at zero on write. Implies locked strategy
    /// reads: a clamping writer can rewrite the vector in place, so readers
    /// must take the busy flag to see a coherent view.
    #[inline]
    pub(crate) fn clamps_regrets(&self) -> bool {
        matches!(self, CfrVariant::CfrPlus)
    }

    /// Whether near-zero-reach branches may be skipped. CFR+ requires all
    /// branches because clamped regrets recover only when revisited.
    #[inline]
    pub(crate) fn prunes(&self) -> bool {
        !matches!(self, CfrVariant::CfrPlus)
    }
}

/// Solver configuration shared by the full-tree and sampling kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Which member of the CFR family to run.
    pub variant: CfrVariant,
    /// Reach threshold for pruning (ignored by CFR+).
    pub prune_threshold: f64,
    /// Worker threads; 0 picks the rayon default, 1 runs sequentially
    /// (bit-reproducible together with a fixed seed).
    pub threads: usize,
    /// Base seed for the sampling kernels' per-worker RNG streams; `None`
    /// seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            variant: CfrVariant::default(),
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            threads: 0,
            seed: None,
        }
    }
}

impl SolverConfig {
    pub fn with_variant(mut self, variant: CfrVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.prune_threshold) {
            return Err(format!(
                "prune threshold {} is out of range [0, 1)",
                self.prune_threshold
            ));
        }
        if let CfrVariant::Discounted(p) = self.variant {
            for (name, value) in [("alpha", p.alpha), ("beta", p.beta), ("gamma", p.gamma)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("discount parameter {} = {} is invalid", name, value));
                }
            }
        }
        Ok(())
    }
}

/// Full-tree CFR solver over a shared immutable [`GameTree`].
pub struct CfrSolver<'a, G: Game> {
    tree: &'a GameTree<G>,
    table: InfoSetTable,
    config: SolverConfig,
    iterations: AtomicU64,
}

impl<'a, G: Game> CfrSolver<'a, G> {
    pub fn new(tree: &'a GameTree<G>, config: SolverConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            table: InfoSetTable::new(tree),
            tree,
            config,
            iterations: AtomicU64::new(0),
        })
    }

    /// Runs `n` iterations and returns the mean root value (P1 perspective)
    /// over them. Iteration tags come from an atomic counter, so tags are
    /// distinct but completion order is unconstrained.
    pub fn solve(&self, n: u64) -> f64 {
        if n == 0 {
            return 0.0;
        }
        if self.config.threads == 1 {
            let mut sum = 0.0;
            for _ in 0..n {
                sum += self.run_iteration();
            }
            sum / n as f64
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .expect("failed to build thread pool");
            pool.install(|| {
                (0..n)
                    .into_par_iter()
                    .map(|_| self.run_iteration())
                    .sum::<f64>()
                    / n as f64
            })
        }
    }

    fn run_iteration(&self) -> f64 {
        let t = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;
        let updating = if t % 2 == 0 { Player::P1 } else { Player::P2 };
        self.iterate(self.tree.root(), updating, 1.0, 1.0, 1.0, t)
    }

    /// One CFR visit: returns the subtree value from P1's perspective given
    /// the reach products `pi1`, `pi2` (players) and `pic` (chance).
    fn iterate(
        &self,
        node: usize,
        updating: Player,
        pi1: f64,
        pi2: f64,
        pic: f64,
        t: u64,
    ) -> f64 {
        let tree = self.tree;
        if tree.is_terminal(node) {
            return tree.payoff(node) as f64;
        }

        let eps = self.config.prune_threshold;
        if self.config.variant.prunes() && pi1 < eps && pi2 < eps {
            return 0.0;
        }

        let n = tree.fan_out(node);
        let player = tree.player(node);

        if player == Player::Chance {
            let mut value = 0.0;
            for i in 0..n {
                let p = tree.chance_proba(node, i);
                value += p * self.iterate(tree.child(node, i), updating, pi1, pi2, pic * p, t);
            }
            return value;
        }

        let slot = self.table.slot(node);
        let mut s = [0.0; MAX_PLAYER_ACTIONS];
        if self.config.variant.clamps_regrets() {
            slot.strategy_locked(&mut s, n);
        } else {
            slot.strategy(&mut s, n);
        }

        let mut utils = [0.0; MAX_PLAYER_ACTIONS];
        let mut value = 0.0;
        if player == Player::P1 {
            for i in 0..n {
                utils[i] = self.iterate(tree.child(node, i), updating, s[i] * pi1, pi2, pic, t);
                value += s[i] * utils[i];
            }
        } else {
            for i in 0..n {
                utils[i] = self.iterate(tree.child(node, i), updating, pi1, s[i] * pi2, pic, t);
                value += s[i] * utils[i];
            }
        }

        if player == updating {
            let (pi_self, pi_opp) = if player == Player::P1 {
                (pi1, pi2)
            } else {
                (pi2, pi1)
            };
            let ws = self.config.variant.strategy_weight(t);
            let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
            for i in 0..n {
                let regret = if player == Player::P1 {
                    utils[i] - value
                } else {
                    value - utils[i]
                };
                let delta = pi_opp * pic * regret;
                deltas[i] = self.config.variant.regret_weight(t, delta) * delta;
                deltas[n + i] = ws * pi_self * s[i];
            }
            if self.config.variant.clamps_regrets() {
                slot.accumulate_clamped(&deltas, n);
            } else {
                slot.accumulate(&deltas, n);
            }
        }
        value
    }

    /// Iterations dispatched so far.
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// The shared info-set table (diagnostics and tests).
    pub fn table(&self) -> &InfoSetTable {
        &self.table
    }

    /// Extracts the averaged policy; the result no longer borrows the solver.
    pub fn average_strategy(&self) -> Strategy<G> {
        Strategy::average(self.tree, &self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_response::{evaluate, exploitability};
    use crate::games::{Kuhn, LeducNoRaise, Rps};
    use crate::tree::GameTree;

    fn solved_kuhn(variant: CfrVariant, iterations: u64) -> (GameTree<Kuhn>, Strategy<Kuhn>) {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default().with_variant(variant).with_threads(1);
        let solver = CfrSolver::new(&tree, config).unwrap();
        solver.solve(iterations);
        let avg = solver.average_strategy();
        (tree, avg)
    }

    #[test]
    fn rps_converges_to_uniform() {
        let tree = GameTree::<Rps>::new();
        let config = SolverConfig::default()
            .with_variant(CfrVariant::Vanilla)
            .with_threads(1);
        let solver = CfrSolver::new(&tree, config).unwrap();
        solver.solve(100_000);
        let avg = solver.average_strategy();

        let mut game = Rps::default();
        for player in [Player::P1, Player::P2] {
            let info_set = game.info_set(player);
            let probs = avg.get_strategy(&info_set).unwrap();
            for &p in probs {
                assert!((p - 1.0 / 3.0).abs() < 1e-2, "probs: {:?}", probs);
            }
            game.play(crate::games::rps::Action::Rock);
        }

        let value = evaluate(&tree, &avg, &avg);
        assert!(value.abs() < 1e-2);
        assert!(exploitability(&tree, &avg) < 1e-2);
    }

    #[test]
    fn kuhn_cfr_plus_reaches_equilibrium() {
        let (tree, avg) = solved_kuhn(CfrVariant::CfrPlus, 200_000);

        let value = evaluate(&tree, &avg, &avg);
        assert!((value - (-1.0 / 18.0)).abs() < 1e-2, "value = {}", value);

        // P1 opening bets: alpha with the Jack, 3*alpha with the King,
        // never with the Queen; Queen calls a bet with alpha + 1/3
        let mut game = Kuhn::default();
        let bet = |avg: &Strategy<Kuhn>, game: &Kuhn| {
            avg.get_strategy(&game.info_set(game.current_player())).unwrap()[1]
        };

        use crate::games::kuhn::Action;
        game.play(Action::Jack);
        game.play(Action::Queen);
        let alpha = bet(&avg, &game);
        assert!((0.0..=1.0 / 3.0 + 1e-2).contains(&alpha), "alpha = {}", alpha);
        game.undo(Action::Queen);
        game.undo(Action::Jack);

        game.play(Action::Queen);
        game.play(Action::King);
        let queen_bet = bet(&avg, &game);
        assert!(queen_bet < 1e-2, "queen bets {}", queen_bet);
        game.undo(Action::King);
        game.undo(Action::Queen);

        game.play(Action::King);
        game.play(Action::Queen);
        let king_bet = bet(&avg, &game);
        assert!((king_bet - 3.0 * alpha).abs() < 1e-2, "king bets {}", king_bet);
        game.undo(Action::Queen);
        game.undo(Action::King);

        // P1's Queen facing a bet after checking: index 1 is Call in the
        // [Fold, Call] row
        game.play(Action::Queen);
        game.play(Action::Jack);
        game.play(Action::Check);
        game.play(Action::Bet);
        let queen_call =
            avg.get_strategy(&game.info_set(Player::P1)).unwrap()[1];
        assert!(
            (queen_call - (alpha + 1.0 / 3.0)).abs() < 1e-2,
            "queen calls {}",
            queen_call
        );
    }

    #[test]
    fn kuhn_linear_and_discounted_converge() {
        for variant in [
            CfrVariant::Linear,
            CfrVariant::Discounted(DiscountParams::default()),
        ] {
            let (tree, avg) = solved_kuhn(variant, 100_000);
            let value = evaluate(&tree, &avg, &avg);
            assert!(
                (value - (-1.0 / 18.0)).abs() < 1e-2,
                "{:?}: value = {}",
                variant,
                value
            );
        }
    }

    #[test]
    fn cfr_plus_regrets_stay_non_negative() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default()
            .with_variant(CfrVariant::CfrPlus)
            .with_threads(1);
        let solver = CfrSolver::new(&tree, config).unwrap();
        solver.solve(1000);
        let table = solver.table();
        for slot in 0..table.len() {
            let n = table.fan_out_at(slot);
            let regrets = table.slot_at(slot).regrets(n);
            for &r in &regrets[..n] {
                assert!(r >= 0.0);
            }
        }
    }

    #[test]
    fn parallel_run_matches_sequential_strategy() {
        let tree = GameTree::<Kuhn>::new();
        let iterations = 100_000;

        let sequential = {
            let config = SolverConfig::default().with_threads(1);
            let solver = CfrSolver::new(&tree, config).unwrap();
            solver.solve(iterations);
            solver.average_strategy()
        };
        let parallel = {
            let config = SolverConfig::default().with_threads(8);
            let solver = CfrSolver::new(&tree, config).unwrap();
            solver.solve(iterations);
            solver.average_strategy()
        };

        for node in 0..tree.len() {
            if tree.is_terminal(node) || tree.player(node) == Player::Chance {
                continue;
            }
            let info_set = tree.info_set(node);
            let a = sequential.get_strategy(&info_set).unwrap();
            let b = parallel.get_strategy(&info_set).unwrap();
            let l1: f64 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
            assert!(l1 < 1e-2, "info set {:?} diverged by {}", info_set, l1);
        }
    }

    #[test]
    fn leduc_linear_cfr_is_barely_exploitable() {
        let tree = GameTree::<LeducNoRaise>::new();
        let config = SolverConfig::default().with_variant(CfrVariant::Linear);
        let solver = CfrSolver::new(&tree, config).unwrap();
        solver.solve(500_000);
        let avg = solver.average_strategy();
        // the metric is already normalized by the absolute game value
        let gap = exploitability(&tree, &avg);
        assert!(gap < 5e-3, "exploitability = {}", gap);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let tree = GameTree::<Kuhn>::new();
        let mut config = SolverConfig::default();
        config.prune_threshold = 1.5;
        assert!(CfrSolver::new(&tree, config).is_err());

        let bad = SolverConfig::default().with_variant(CfrVariant::Discounted(DiscountParams {
            alpha: f64::NAN,
            beta: 0.0,
            gamma: 2.0,
        }));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn iteration_tags_are_counted() {
        let tree = GameTree::<Kuhn>::new();
        let solver = CfrSolver::new(&tree, SolverConfig::default().with_threads(1)).unwrap();
        solver.solve(64);
        assert_eq!(solver.iterations(), 64);
    }
}
