//! Counterfactual regret minimization (CFR) solvers for two-player,
//! zero-sum, imperfect-information games with chance.
//!
//! This library provides:
//! - the [`Game`] contract concrete games implement, driven by `play`/`undo`
//! - [`GameTree`], a flat index-based snapshot of the reachable state space
//! - [`CfrSolver`] running vanilla CFR, Linear CFR, CFR+ or Discounted CFR
//!   in parallel over a shared, cache-line-isolated info-set table
//! - [`MccfrSolver`] with external, outcome and chance sampling
//! - [`Strategy`] (the averaged policy), [`best_response`] and
//!   [`exploitability`]
//! - bundled [`games`]: Rock-Paper-Scissors, Kuhn poker, Leduc no-raise
//!
//! # Examples
//!
//! See the bundled demos:
//! ```bash
//! cargo run --example rps
//! cargo run --example kuhn
//! cargo run --example leduc
//! ```

pub mod best_response;
pub mod cfr;
pub mod game;
pub mod games;
pub mod mccfr;
pub mod strategy;
pub mod table;
pub mod tree;

pub use best_response::{best_response, evaluate, exploitability};
pub use cfr::{CfrSolver, CfrVariant, DiscountParams, SolverConfig};
pub use game::{ActionList, Game, Player, MAX_CHANCE_ACTIONS, MAX_PLAYER_ACTIONS};
pub use mccfr::{MccfrSolver, SamplingScheme};
pub use strategy::{play_once, Strategy};
pub use table::InfoSetTable;
pub use tree::GameTree;
