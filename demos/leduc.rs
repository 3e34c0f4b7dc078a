//! Leduc no-raise solved with Linear CFR, compared against external-sampling
//! MCCFR on the same tree.
//!
//! Run with: `cargo run --example leduc`

use cfr_solver::games::LeducNoRaise;
use cfr_solver::{
    evaluate, exploitability, CfrSolver, CfrVariant, GameTree, MccfrSolver, SamplingScheme,
    SolverConfig,
};

fn main() {
    let tree = GameTree::<LeducNoRaise>::new();
    println!("Leduc (no raise) tree: {} nodes", tree.len());

    let config = SolverConfig::default().with_variant(CfrVariant::Linear);
    let solver = CfrSolver::new(&tree, config).expect("invalid solver config");
    let iterations = 200_000;
    println!("Training Linear CFR for {} iterations...", iterations);
    solver.solve(iterations);
    let avg = solver.average_strategy();
    println!("  game value:     {:+.5}", evaluate(&tree, &avg, &avg));
    println!("  exploitability: {:.2e}", exploitability(&tree, &avg));

    let mccfr = MccfrSolver::new(&tree, SamplingScheme::External, SolverConfig::default())
        .expect("invalid solver config");
    let samples = 2_000_000;
    println!("Training external-sampling MCCFR for {} iterations...", samples);
    mccfr.solve(samples);
    let avg = mccfr.average_strategy();
    println!("  game value:     {:+.5}", evaluate(&tree, &avg, &avg));
    println!("  exploitability: {:.2e}", exploitability(&tree, &avg));
}
