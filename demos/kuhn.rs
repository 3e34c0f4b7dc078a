//! Kuhn poker solved with CFR+.
//!
//! The equilibrium value for P1 is -1/18. P1's opening bet frequency with
//! the Jack (alpha) is free in [0, 1/3]; the King bets 3*alpha and the Queen
//! never bets.
//!
//! Run with: `cargo run --example kuhn`

use cfr_solver::games::kuhn::Action;
use cfr_solver::games::Kuhn;
use cfr_solver::{evaluate, exploitability, CfrSolver, Game, GameTree, Player, SolverConfig};

fn main() {
    let tree = GameTree::<Kuhn>::new();
    println!("Kuhn tree: {} nodes", tree.len());

    let solver = CfrSolver::new(&tree, SolverConfig::default()).expect("invalid solver config");
    let iterations = 1_000_000;
    println!("Training CFR+ for {} iterations...", iterations);
    solver.solve(iterations);
    let avg = solver.average_strategy();

    println!("P1 opening bet frequency by card:");
    for card in [Action::Jack, Action::Queen, Action::King] {
        let mut game = Kuhn::default();
        game.play(card);
        game.play(if card == Action::Jack {
            Action::Queen
        } else {
            Action::Jack
        });
        let probs = avg
            .get_strategy(&game.info_set(Player::P1))
            .expect("unsolved info set");
        println!("  {:?}: bet {:.4}", card, probs[1]);
    }

    let value = evaluate(&tree, &avg, &avg);
    println!("game value:     {:+.5} (expected {:+.5})", value, -1.0 / 18.0);
    println!("exploitability: {:.2e}", exploitability(&tree, &avg));
}
