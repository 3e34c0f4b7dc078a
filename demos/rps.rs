//! Rock-Paper-Scissors solved with vanilla CFR.
//!
//! The equilibrium is uniform (1/3, 1/3, 1/3) for both players and the game
//! value is 0.
//!
//! Run with: `cargo run --example rps`

use cfr_solver::games::rps::Action;
use cfr_solver::games::Rps;
use cfr_solver::{evaluate, exploitability, CfrSolver, CfrVariant, Game, GameTree, Player, SolverConfig};

fn main() {
    let tree = GameTree::<Rps>::new();
    let config = SolverConfig::default().with_variant(CfrVariant::Vanilla);
    let solver = CfrSolver::new(&tree, config).expect("invalid solver config");

    let iterations = 100_000;
    println!("Training vanilla CFR for {} iterations...", iterations);
    solver.solve(iterations);
    let avg = solver.average_strategy();

    let actions = [Action::Rock, Action::Paper, Action::Scissors];
    let mut game = Rps::default();
    for (player, label) in [(Player::P1, "Player 1"), (Player::P2, "Player 2")] {
        let probs = avg
            .get_strategy(&game.info_set(player))
            .expect("unsolved info set");
        println!("{}:", label);
        for (action, p) in actions.iter().zip(probs) {
            println!("  {:8?} {:.4}", action, p);
        }
        game.play(Action::Rock);
    }

    println!("game value:     {:+.5}", evaluate(&tree, &avg, &avg));
    println!("exploitability: {:.2e}", exploitability(&tree, &avg));
}
