//! Monte-Carlo CFR: sampling kernels sharing the info-set table and the
//! variant weighting of the full-tree solver.
//!
//! Three schemes replace the full traversal with sampling: external sampling
//! (enumerate the updating player, sample the opponent and chance), outcome
//! sampling (sample every decision, importance-correct by the joint sample
//! probability), and chance sampling (enumerate both players, sample only
//! chance). Each worker owns an independent RNG stream; sharing an RNG across
//! workers is forbidden.

use crate::cfr::SolverConfig;
use crate::game::{Game, Player, MAX_PLAYER_ACTIONS};
use crate::strategy::Strategy;
use crate::table::InfoSetTable;
use crate::tree::GameTree;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which decisions are sampled per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamplingScheme {
    /// Enumerate the updating player's actions, sample the opponent's and
    /// chance's. Unbiased without importance correction.
    #[default]
    External,
    /// Sample every decision; importance-correct terminal values by the
    /// joint sample probability.
    Outcome,
    /// Sample only chance outcomes; vanilla CFR elsewhere.
    Chance,
}

/// Monte-Carlo CFR solver over a shared immutable [`GameTree`].
pub struct MccfrSolver<'a, G: Game> {
    tree: &'a GameTree<G>,
    table: InfoSetTable,
    scheme: SamplingScheme,
    config: SolverConfig,
    iterations: AtomicU64,
    streams: AtomicU64,
}

impl<'a, G: Game> MccfrSolver<'a, G> {
    pub fn new(
        tree: &'a GameTree<G>,
        scheme: SamplingScheme,
        config: SolverConfig,
    ) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            table: InfoSetTable::new(tree),
            tree,
            scheme,
            config,
            iterations: AtomicU64::new(0),
            streams: AtomicU64::new(0),
        })
    }

    /// Runs `n` sampled iterations, alternating the updating player on the
    /// iteration tag's parity.
    pub fn solve(&self, n: u64) {
        if n == 0 {
            return;
        }
        if self.config.threads == 1 {
            let mut rng = self.stream_rng();
            for _ in 0..n {
                self.run_iteration(&mut rng);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .expect("failed to build thread pool");
            pool.install(|| {
                (0..n)
                    .into_par_iter()
                    .map_init(
                        || self.stream_rng(),
                        |rng, _| self.run_iteration(rng),
                    )
                    .for_each(drop);
            });
        }
    }

    /// A fresh RNG on an unused stream: base seed (explicit, or the clock)
    /// advanced by a per-stream golden-ratio step so workers never share a
    /// sequence.
    fn stream_rng(&self) -> SmallRng {
        let base = self.config.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        });
        let stream = self.streams.fetch_add(1, Ordering::Relaxed);
        SmallRng::seed_from_u64(base.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
    }

    fn run_iteration(&self, rng: &mut SmallRng) {
        let t = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;
        let updating = if t % 2 == 0 { Player::P1 } else { Player::P2 };
        match self.scheme {
            SamplingScheme::External => {
                self.external(self.tree.root(), updating, 1.0, 1.0, t, rng);
            }
            SamplingScheme::Outcome => {
                self.outcome(self.tree.root(), updating, 1.0, 1.0, 1.0, t, rng);
            }
            SamplingScheme::Chance => {
                self.chance_sampled(self.tree.root(), updating, 1.0, 1.0, t, rng);
            }
        }
    }

    fn read_strategy(&self, node: usize, out: &mut [f64; MAX_PLAYER_ACTIONS], n: usize) {
        let slot = self.table.slot(node);
        if self.config.variant.clamps_regrets() {
            slot.strategy_locked(out, n);
        } else {
            slot.strategy(out, n);
        }
    }

    fn sample_chance<R: Rng>(&self, node: usize, n: usize, rng: &mut R) -> usize {
        let r: f64 = rng.gen();
        let mut cumulative = 0.0;
        for i in 0..n {
            cumulative += self.tree.chance_proba(node, i);
            if r < cumulative {
                return i;
            }
        }
        n - 1
    }

    /// External sampling. Values flow back from the *updating* player's
    /// perspective; regret accumulation uses only the opponent's sampled
    /// reach (no importance correction needed).
    fn external(
        &self,
        node: usize,
        updating: Player,
        pi_self: f64,
        pi_opp: f64,
        t: u64,
        rng: &mut SmallRng,
    ) -> f64 {
        let tree = self.tree;
        if tree.is_terminal(node) {
            let payoff = tree.payoff(node) as f64;
            return if updating == Player::P1 { payoff } else { -payoff };
        }

        let n = tree.fan_out(node);
        let player = tree.player(node);

        if player == Player::Chance {
            let i = self.sample_chance(node, n, rng);
            return self.external(tree.child(node, i), updating, pi_self, pi_opp, t, rng);
        }

        let mut s = [0.0; MAX_PLAYER_ACTIONS];
        self.read_strategy(node, &mut s, n);

        if player == updating {
            let mut utils = [0.0; MAX_PLAYER_ACTIONS];
            let mut value = 0.0;
            for i in 0..n {
                utils[i] = self.external(
                    tree.child(node, i),
                    updating,
                    pi_self * s[i],
                    pi_opp,
                    t,
                    rng,
                );
                value += s[i] * utils[i];
            }

            let ws = self.config.variant.strategy_weight(t);
            let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
            for i in 0..n {
                let delta = pi_opp * (utils[i] - value);
                deltas[i] = self.config.variant.regret_weight(t, delta) * delta;
                deltas[n + i] = ws * pi_self * s[i];
            }
            let slot = self.table.slot(node);
            if self.config.variant.clamps_regrets() {
                slot.accumulate_clamped(&deltas, n);
            } else {
                slot.accumulate(&deltas, n);
            }
            value
        } else {
            let i = sample_weighted(&s, n, rng);
            self.external(
                tree.child(node, i),
                updating,
                pi_self,
                pi_opp * s[i],
                t,
                rng,
            )
        }
    }

    /// Outcome sampling: one trajectory, every decision sampled, terminal
    /// utility divided by the joint sample probability `q`.
    #[allow(clippy::too_many_arguments)]
    fn outcome(
        &self,
        node: usize,
        updating: Player,
        pi_self: f64,
        pi_opp: f64,
        q: f64,
        t: u64,
        rng: &mut SmallRng,
    ) -> f64 {
        let tree = self.tree;
        if tree.is_terminal(node) {
            let payoff = tree.payoff(node) as f64;
            let utility = if updating == Player::P1 { payoff } else { -payoff };
            return utility / q;
        }

        let n = tree.fan_out(node);
        let player = tree.player(node);

        if player == Player::Chance {
            let i = self.sample_chance(node, n, rng);
            let p = tree.chance_proba(node, i);
            return self.outcome(tree.child(node, i), updating, pi_self, pi_opp, q * p, t, rng);
        }

        let mut s = [0.0; MAX_PLAYER_ACTIONS];
        self.read_strategy(node, &mut s, n);
        let i = sample_weighted(&s, n, rng);
        let p = s[i];

        if player == updating {
            let value = self.outcome(
                tree.child(node, i),
                updating,
                pi_self * p,
                pi_opp,
                q * p,
                t,
                rng,
            );
            // only the sampled action receives a delta this iteration; the
            // visit itself is importance-corrected by the reach sample
            // probability
            let regret_delta = pi_opp * value;
            let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
            deltas[i] = self.config.variant.regret_weight(t, regret_delta) * regret_delta;
            deltas[n + i] = self.config.variant.strategy_weight(t) * pi_self / q;
            let slot = self.table.slot(node);
            if self.config.variant.clamps_regrets() {
                slot.accumulate_clamped(&deltas, n);
            } else {
                slot.accumulate(&deltas, n);
            }
            value
        } else {
            self.outcome(
                tree.child(node, i),
                updating,
                pi_self,
                pi_opp * p,
                q * p,
                t,
                rng,
            )
        }
    }

    /// Chance sampling: vanilla CFR with chance outcomes Monte-Carlo'd.
    /// Values flow from P1's perspective as in the full-tree kernel.
    fn chance_sampled(
        &self,
        node: usize,
        updating: Player,
        pi1: f64,
        pi2: f64,
        t: u64,
        rng: &mut SmallRng,
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
            let i = self.sample_chance(node, n, rng);
            return self.chance_sampled(tree.child(node, i), updating, pi1, pi2, t, rng);
        }

        let mut s = [0.0; MAX_PLAYER_ACTIONS];
        self.read_strategy(node, &mut s, n);

        let mut utils = [0.0; MAX_PLAYER_ACTIONS];
        let mut value = 0.0;
        if player == Player::P1 {
            for i in 0..n {
                utils[i] =
                    self.chance_sampled(tree.child(node, i), updating, s[i] * pi1, pi2, t, rng);
                value += s[i] * utils[i];
            }
        } else {
            for i in 0..n {
                utils[i] =
                    self.chance_sampled(tree.child(node, i), updating, pi1, s[i] * pi2, t, rng);
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
                let delta = pi_opp * regret;
                deltas[i] = self.config.variant.regret_weight(t, delta) * delta;
                deltas[n + i] = ws * pi_self * s[i];
            }
            let slot = self.table.slot(node);
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

    /// Extracts the averaged policy.
    pub fn average_strategy(&self) -> Strategy<G> {
        Strategy::average(self.tree, &self.table)
    }
}

/// Draws an index proportionally to `probs[..n]`; the last index absorbs any
/// floating-point shortfall.
#[inline]
fn sample_weighted<R: Rng>(probs: &[f64; MAX_PLAYER_ACTIONS], n: usize, rng: &mut R) -> usize {
    let r: f64 = rng.gen();
    let mut cumulative = 0.0;
    for i in 0..n {
        cumulative += probs[i];
        if r < cumulative {
            return i;
        }
    }
    n - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_response::{evaluate, exploitability};
    use crate::games::Kuhn;
    use crate::tree::GameTree;

    fn table_bits(table: &InfoSetTable) -> Vec<u64> {
        let mut bits = Vec::new();
        for slot in 0..table.len() {
            let n = table.fan_out_at(slot);
            let r = table.slot_at(slot).regrets(n);
            let s = table.slot_at(slot).cumulative_strategy(n);
            for i in 0..n {
                bits.push(r[i].to_bits());
                bits.push(s[i].to_bits());
            }
        }
        bits
    }

    #[test]
    fn fixed_seed_single_thread_is_deterministic() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default().with_threads(1).with_seed(42);

        let first = MccfrSolver::new(&tree, SamplingScheme::External, config).unwrap();
        first.solve(10_000);
        let second = MccfrSolver::new(&tree, SamplingScheme::External, config).unwrap();
        second.solve(10_000);

        assert_eq!(table_bits(first.table()), table_bits(second.table()));
    }

    #[test]
    fn external_sampling_approaches_kuhn_value() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default().with_threads(1).with_seed(7);
        let solver = MccfrSolver::new(&tree, SamplingScheme::External, config).unwrap();
        solver.solve(1_000_000);
        let avg = solver.average_strategy();
        let value = evaluate(&tree, &avg, &avg);
        assert!((value - (-1.0 / 18.0)).abs() < 2e-2, "value = {}", value);
    }

    #[test]
    fn chance_sampling_approaches_kuhn_value() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default().with_threads(1).with_seed(11);
        let solver = MccfrSolver::new(&tree, SamplingScheme::Chance, config).unwrap();
        solver.solve(300_000);
        let avg = solver.average_strategy();
        let value = evaluate(&tree, &avg, &avg);
        assert!((value - (-1.0 / 18.0)).abs() < 2e-2, "value = {}", value);
    }

    #[test]
    fn outcome_sampling_produces_valid_strategies() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default().with_threads(1).with_seed(3);
        let solver = MccfrSolver::new(&tree, SamplingScheme::Outcome, config).unwrap();
        solver.solve(500_000);
        let avg = solver.average_strategy();

        for node in 0..tree.len() {
            if tree.is_terminal(node) || tree.player(node) == Player::Chance {
                continue;
            }
            let probs = avg.get_strategy(&tree.info_set(node)).unwrap();
            let sum: f64 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(probs.iter().all(|&p| p >= 0.0));
        }
        assert!(exploitability(&tree, &avg).is_finite());
    }

    #[test]
    fn parallel_external_sampling_converges() {
        let tree = GameTree::<Kuhn>::new();
        let config = SolverConfig::default().with_threads(4);
        let solver = MccfrSolver::new(&tree, SamplingScheme::External, config).unwrap();
        solver.solve(500_000);
        let avg = solver.average_strategy();
        let value = evaluate(&tree, &avg, &avg);
        assert!((value - (-1.0 / 18.0)).abs() < 2e-2, "value = {}", value);
        assert_eq!(solver.iterations(), 500_000);
    }
}
