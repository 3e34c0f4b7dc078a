//! Bundled games implementing the [`crate::game::Game`] contract.
//!
//! All three encode the action history in a `u64`, three bits per ply, with
//! the ply count in the upper half of the packed state. They double as the
//! test fixtures for the solvers.

pub mod kuhn;
pub mod leduc;
pub mod rps;

pub use kuhn::Kuhn;
pub use leduc::LeducNoRaise;
pub use rps::Rps;
