//! Per-information-set regret and cumulative-strategy storage.
//!
//! Every *player* info set owns exactly one [`Slot`]: a cache-line-aligned
//! entry holding the side-by-side pair `[regrets | cumulative strategy]`
//! behind a one-bit spin lock. Distinct slots never share a cache line, so
//! concurrent iterations contend only when they update the same info set.
//! Chance and terminal nodes have no slot.

use crate::game::{Game, Player, MAX_PLAYER_ACTIONS};
use crate::tree::GameTree;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const NO_SLOT: u32 = u32::MAX;

/// `f64` cell over an `AtomicU64`. Loads and stores are relaxed; exclusion
/// for read-modify-write sequences comes from the owning slot's spin lock.
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// One info-set entry. The first `n` cells are the regrets `R[a]`, the next
/// `n` the cumulative strategy `S[a]`, where `n` is the info set's fan-out.
#[repr(align(64))]
pub struct Slot {
    lock: AtomicBool,
    values: [AtomicF64; 2 * MAX_PLAYER_ACTIONS],
}

impl Slot {
    fn new() -> Self {
        Self {
            lock: AtomicBool::new(false),
            values: std::array::from_fn(|_| AtomicF64::new(0.0)),
        }
    }

    /// Spins until the busy flag is ours. Loads before the CAS keep a
    /// contended line in shared state instead of ping-ponging it.
    #[inline]
    fn acquire(&self) {
        loop {
            if self.lock.load(Ordering::Relaxed) {
                std::hint::spin_loop();
                continue;
            }
            if self
                .lock
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    #[inline]
    fn release(&self) {
        self.lock.store(false, Ordering::Release);
    }

    /// Regret Matching over a relaxed snapshot of the regrets: clamp each
    /// `R[a]` at zero, normalize by the positive sum, fall back to uniform
    /// when the sum is zero. A momentarily mixed view is acceptable for the
    /// variants that never rewrite regrets in place.
    pub fn strategy(&self, out: &mut [f64; MAX_PLAYER_ACTIONS], n: usize) {
        let mut sum = 0.0;
        for i in 0..n {
            let r = self.values[i].load().max(0.0);
            out[i] = r;
            sum += r;
        }
        Self::normalize(out, n, sum);
    }

    /// Regret Matching under the busy flag. CFR+ clamps regrets on write, so
    /// its readers must observe a coherent vector.
    pub fn strategy_locked(&self, out: &mut [f64; MAX_PLAYER_ACTIONS], n: usize) {
        self.acquire();
        for i in 0..n {
            out[i] = self.values[i].load();
        }
        self.release();
        let mut sum = 0.0;
        for v in out.iter_mut().take(n) {
            *v = v.max(0.0);
            sum += *v;
        }
        Self::normalize(out, n, sum);
    }

    #[inline]
    fn normalize(out: &mut [f64; MAX_PLAYER_ACTIONS], n: usize, sum: f64) {
        if sum > 0.0 {
            for v in out.iter_mut().take(n) {
                *v /= sum;
            }
        } else {
            let uniform = 1.0 / n as f64;
            for v in out.iter_mut().take(n) {
                *v = uniform;
            }
        }
    }

    /// Adds `deltas[0..2n]` element-wise under the busy flag.
    pub fn accumulate(&self, deltas: &[f64; 2 * MAX_PLAYER_ACTIONS], n: usize) {
        debug_assert!(deltas[..2 * n].iter().all(|d| d.is_finite()));
        self.acquire();
        for i in 0..2 * n {
            self.values[i].store(self.values[i].load() + deltas[i]);
        }
        self.release();
    }

    /// CFR+ accumulate: regrets are floored at zero as they are written, so
    /// `R[a] >= 0` holds at all times.
    pub fn accumulate_clamped(&self, deltas: &[f64; 2 * MAX_PLAYER_ACTIONS], n: usize) {
        debug_assert!(deltas[..2 * n].iter().all(|d| d.is_finite()));
        self.acquire();
        for i in 0..n {
            self.values[i].store((self.values[i].load() + deltas[i]).max(0.0));
        }
        for i in n..2 * n {
            self.values[i].store(self.values[i].load() + deltas[i]);
        }
        self.release();
    }

    /// Snapshot of the regret half (tests and diagnostics).
    pub fn regrets(&self, n: usize) -> [f64; MAX_PLAYER_ACTIONS] {
        let mut out = [0.0; MAX_PLAYER_ACTIONS];
        self.acquire();
        for i in 0..n {
            out[i] = self.values[i].load();
        }
        self.release();
        out
    }

    /// Snapshot of the cumulative-strategy half.
    pub fn cumulative_strategy(&self, n: usize) -> [f64; MAX_PLAYER_ACTIONS] {
        let mut out = [0.0; MAX_PLAYER_ACTIONS];
        self.acquire();
        for i in 0..n {
            out[i] = self.values[n + i].load();
        }
        self.release();
        out
    }
}

/// The table: one slot per distinct player info set, plus the
/// `node -> slot` indirection.
pub struct InfoSetTable {
    slots: Vec<Slot>,
    node_to_slot: Vec<u32>,
    fan_outs: Vec<u8>,
}

impl InfoSetTable {
    /// Allocates one zeroed slot per distinct player info set observed in the
    /// tree, deduplicating through a transient ordered map. Walking nodes in
    /// index order is the build DFS order.
    pub fn new<G: Game>(tree: &GameTree<G>) -> Self {
        let mut node_to_slot = vec![NO_SLOT; tree.len()];
        let mut slots = Vec::new();
        let mut fan_outs = Vec::new();
        let mut seen: BTreeMap<G::InfoSet, u32> = BTreeMap::new();
        for node in 0..tree.len() {
            if tree.is_terminal(node) || tree.player(node) == Player::Chance {
                continue;
            }
            let n = tree.fan_out(node);
            let slot = *seen.entry(tree.info_set(node)).or_insert_with(|| {
                slots.push(Slot::new());
                fan_outs.push(n as u8);
                (slots.len() - 1) as u32
            });
            debug_assert_eq!(
                fan_outs[slot as usize] as usize, n,
                "info set fan-out mismatch between nodes"
            );
            node_to_slot[node] = slot;
        }
        Self {
            slots,
            node_to_slot,
            fan_outs,
        }
    }

    /// Number of distinct player info sets.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot backing a player node.
    #[inline]
    pub fn slot(&self, node: usize) -> &Slot {
        let idx = self.node_to_slot[node];
        debug_assert_ne!(idx, NO_SLOT, "node {} has no info-set slot", node);
        &self.slots[idx as usize]
    }

    /// The slot index of a player node (`u32::MAX` for chance/terminal).
    #[inline]
    pub fn slot_index(&self, node: usize) -> u32 {
        self.node_to_slot[node]
    }

    /// Slot access by slot index (diagnostics and byte-level comparisons).
    #[inline]
    pub fn slot_at(&self, slot: usize) -> &Slot {
        &self.slots[slot]
    }

    /// Fan-out of the info set backing `slot`.
    #[inline]
    pub fn fan_out_at(&self, slot: usize) -> usize {
        self.fan_outs[slot] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::Kuhn;
    use crate::tree::GameTree;

    #[test]
    fn slot_layout_is_cache_line_isolated() {
        assert_eq!(std::mem::align_of::<Slot>(), 64);
        assert_eq!(std::mem::size_of::<Slot>() % 64, 0);
    }

    #[test]
    fn accumulate_is_additive_under_contention() {
        let slot = Slot::new();
        let threads = 8;
        let rounds = 1000;
        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
                    deltas[0] = 1.0;
                    deltas[1] = -2.0;
                    deltas[2] = 3.0;
                    deltas[3] = 4.0;
                    for _ in 0..rounds {
                        slot.accumulate(&deltas, 2);
                    }
                });
            }
        });
        let total = (threads * rounds) as f64;
        let regrets = slot.regrets(2);
        let strategies = slot.cumulative_strategy(2);
        assert_eq!(regrets[0], total);
        assert_eq!(regrets[1], -2.0 * total);
        assert_eq!(strategies[0], 3.0 * total);
        assert_eq!(strategies[1], 4.0 * total);
    }

    #[test]
    fn regret_matching_normalizes_positive_part() {
        let slot = Slot::new();
        let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
        deltas[0] = 3.0;
        deltas[1] = -1.0;
        deltas[2] = 1.0;
        slot.accumulate(&deltas, 3);
        let mut s = [0.0; MAX_PLAYER_ACTIONS];
        slot.strategy(&mut s, 3);
        assert_eq!(s[0], 0.75);
        assert_eq!(s[1], 0.0);
        assert_eq!(s[2], 0.25);
        let sum: f64 = s[..3].iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn regret_matching_uniform_when_no_positive_regret() {
        let slot = Slot::new();
        let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
        deltas[0] = -1.0;
        deltas[1] = -5.0;
        slot.accumulate(&deltas, 2);
        let mut s = [0.0; MAX_PLAYER_ACTIONS];
        slot.strategy(&mut s, 2);
        assert_eq!(s[0], 0.5);
        assert_eq!(s[1], 0.5);
        let mut locked = [0.0; MAX_PLAYER_ACTIONS];
        slot.strategy_locked(&mut locked, 2);
        assert_eq!(&locked[..2], &s[..2]);
    }

    #[test]
    fn clamped_accumulate_keeps_regrets_non_negative() {
        let slot = Slot::new();
        let mut deltas = [0.0; 2 * MAX_PLAYER_ACTIONS];
        deltas[0] = -3.0;
        deltas[1] = 2.0;
        slot.accumulate_clamped(&deltas, 2);
        let regrets = slot.regrets(2);
        assert_eq!(regrets[0], 0.0);
        assert_eq!(regrets[1], 2.0);
        deltas[0] = 1.0;
        deltas[1] = -5.0;
        slot.accumulate_clamped(&deltas, 2);
        let regrets = slot.regrets(2);
        assert_eq!(regrets[0], 1.0);
        assert_eq!(regrets[1], 0.0);
    }

    #[test]
    fn table_deduplicates_info_sets() {
        let tree = GameTree::<Kuhn>::new();
        let table = InfoSetTable::new(&tree);
        // 4 decision points, 3 cards each
        assert_eq!(table.len(), 12);
        for node in 0..tree.len() {
            if tree.is_terminal(node) || tree.player(node) == Player::Chance {
                assert_eq!(table.slot_index(node), u32::MAX);
            } else {
                assert_ne!(table.slot_index(node), u32::MAX);
            }
        }
    }
}
