//! The game contract: the interface every concrete game exposes to the solver.
//!
//! A game is a mutable cursor over one history of an extensive-form game.
//! The tree builder drives it with [`Game::play`] / [`Game::undo`]; everything
//! else in the crate works off the immutable [`crate::tree::GameTree`]
//! snapshot built from it.

use rand::Rng;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Index;

/// Maximum fan-out of a player decision node, across all supported games.
///
/// Every per-iteration temporary in the solvers is a stack array of this
/// width, so the bound is deliberately small.
pub const MAX_PLAYER_ACTIONS: usize = 8;

/// Maximum fan-out of a chance node, across all supported games.
pub const MAX_CHANCE_ACTIONS: usize = 16;

/// Capacity of [`ActionList`] (the larger of the two fan-out bounds).
pub const MAX_ACTIONS: usize = MAX_CHANCE_ACTIONS;

/// The acting party at a node.
///
/// Payoffs are always expressed from [`Player::P1`]'s perspective;
/// `payoff(P2) = -payoff(P1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Player {
    P1 = 0,
    P2 = 1,
    /// Nature; outgoing edges carry fixed, publicly known weights.
    Chance = 2,
}

impl Player {
    /// Returns the other player.
    ///
    /// # Panics
    /// Panics if called on [`Player::Chance`].
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::P1 => Player::P2,
            Player::P2 => Player::P1,
            Player::Chance => panic!("chance has no opponent"),
        }
    }

    /// The 2-bit tag packed into a tree node's `(kind, fan_out)` word.
    #[inline]
    pub(crate) fn tag(self) -> u32 {
        self as u32
    }

    #[inline]
    pub(crate) fn from_tag(tag: u32) -> Player {
        match tag {
            0 => Player::P1,
            1 => Player::P2,
            2 => Player::Chance,
            _ => panic!("invalid player tag: {}", tag),
        }
    }
}

/// Fixed-capacity buffer filled by [`Game::actions`] and
/// [`Game::chance_weights`].
///
/// Stack-allocated so the hot path never touches the allocator.
#[derive(Debug, Clone, Copy)]
pub struct ActionList<T> {
    items: [T; MAX_ACTIONS],
    len: usize,
}

impl<T: Copy + Default> ActionList<T> {
    pub fn new() -> Self {
        Self {
            items: [T::default(); MAX_ACTIONS],
            len: 0,
        }
    }

    /// Appends an item.
    ///
    /// # Panics
    /// Panics if the buffer is full; a game exceeding [`MAX_ACTIONS`] is a
    /// contract violation.
    #[inline]
    pub fn push(&mut self, item: T) {
        assert!(self.len < MAX_ACTIONS, "action buffer overflow");
        self.items[self.len] = item;
        self.len += 1;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<T: Copy + Default> Default for ActionList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for ActionList<T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        debug_assert!(i < self.len);
        &self.items[i]
    }
}

/// The contract a concrete game satisfies to be solvable.
///
/// The solver drives the game as a cursor: `play` descends one ply, `undo`
/// backs out, and `play`-then-`undo` must restore the state exactly. All
/// queries (`info_set`, `current_player`, `actions`, ...) refer to the current
/// history. `current_player` and `info_set` must return *some* value at every
/// history including terminal ones (the tree stores them uniformly; they are
/// ignored where meaningless).
///
/// Contract violations (overflowing fan-outs, undo without play, payoff at a
/// non-terminal, non-positive chance weights) are programming errors: the
/// crate panics on them rather than surfacing a recoverable error.
pub trait Game: Default + Sync {
    /// An opaque action label. Chance and player actions share the value
    /// space but are never compared across node kinds.
    type Action: Copy + Default + Debug + PartialEq + Send + Sync;

    /// Identifies one concrete history, private information of both players
    /// included.
    type State: Copy + Eq + Hash + Debug + Send + Sync;

    /// Identifies what the acting player knows: their private information
    /// plus the public history. Several states may share one info set.
    type InfoSet: Copy + Ord + Hash + Debug + Send + Sync;

    /// Upper bound on this game's player-node fan-out
    /// (must be <= [`MAX_PLAYER_ACTIONS`]).
    const MAX_PLAYER_ACTIONS: usize;

    /// Upper bound on this game's chance-node fan-out
    /// (must be <= [`MAX_CHANCE_ACTIONS`]).
    const MAX_CHANCE_ACTIONS: usize;

    /// Returns to the initial history.
    fn reset(&mut self);

    /// Snapshot of the current history. `set_state(state())` is the identity.
    fn state(&self) -> Self::State;

    /// Restores a snapshot taken with [`Game::state`].
    fn set_state(&mut self, state: Self::State);

    /// The given player's knowledge at the current history.
    fn info_set(&self, player: Player) -> Self::InfoSet;

    /// Whose turn it is; [`Player::Chance`] at stochastic events.
    fn current_player(&self) -> Player;

    /// Whether the current node is a chance node.
    #[inline]
    fn is_chance(&self) -> bool {
        self.current_player() == Player::Chance
    }

    /// True iff the history is terminal.
    fn is_over(&self) -> bool;

    /// Fills `out` with the legal actions, in a canonical order that is
    /// stable across calls and across histories sharing an info set.
    fn actions(&self, out: &mut ActionList<Self::Action>);

    /// Chance nodes only: fills `out` with one positive integer weight per
    /// action (unnormalized probabilities; any positive sum).
    fn chance_weights(&self, out: &mut ActionList<u32>);

    /// Descends one ply.
    fn play(&mut self, action: Self::Action);

    /// Backs out the last ply; `undo(a)` after `play(a)` restores the prior
    /// state exactly.
    fn undo(&mut self, action: Self::Action);

    /// Terminal nodes only: the signed payoff for `player` in units of the
    /// smallest stake. P1 and P2 payoffs sum to zero.
    fn payoff(&self, player: Player) -> i32;

    /// Chance nodes only: draws an action according to
    /// [`Game::chance_weights`].
    fn sample_action<R: Rng>(&self, rng: &mut R) -> Self::Action {
        let mut actions = ActionList::new();
        self.actions(&mut actions);
        let mut weights = ActionList::new();
        self.chance_weights(&mut weights);
        let total: u32 = weights.iter().sum();
        assert!(total > 0, "chance weights must have a positive sum");
        let mut r = rng.gen_range(0..total);
        for i in 0..actions.len() {
            if r < weights[i] {
                return actions[i];
            }
            r -= weights[i];
        }
        actions[actions.len() - 1]
    }

    /// The `(info_set, action)` pairs `player`'s strategy traverses on the
    /// way from the root to `state`, in root-to-leaf order. Used by the best
    /// response only.
    fn info_sets_and_actions(
        state: Self::State,
        player: Player,
    ) -> Vec<(Self::InfoSet, Self::Action)>;

    /// Product of the normalized chance probabilities along the path from the
    /// root to `state`. Used by the best response only.
    fn chance_reach_proba(state: Self::State) -> f64;
}
