//! DynaMOSA CLI - Generate covering inputs for a branch program from JSON.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use dynamosa::{
    program::{InputVariation, PathSolver, ProgramEvaluator},
    schema::ProblemFile,
    search::{SearchEngine, TournamentBreeder},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <problem.json>", args[0]);
        eprintln!();
        eprintln!("Search for inputs covering every line and branch of a program.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  problem.json  Program under test plus search configuration");
        eprintln!();
        eprintln!("An example problem is printed with the --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_problem();
        return;
    }

    let problem_path = PathBuf::from(&args[1]);

    // Load problem
    let problem_str = fs::read_to_string(&problem_path).unwrap_or_else(|e| {
        eprintln!("Error reading problem file: {}", e);
        std::process::exit(1);
    });

    let problem: ProblemFile = serde_json::from_str(&problem_str).unwrap_or_else(|e| {
        eprintln!("Error parsing problem: {}", e);
        std::process::exit(1);
    });

    let program = Arc::new(problem.program.compile().unwrap_or_else(|e| {
        eprintln!("Invalid program: {}", e);
        std::process::exit(1);
    }));
    let config = problem.config;

    println!("DynaMOSA Search");
    println!("===============");
    println!("Program: {} ({} inputs)", program.name(), program.inputs());
    println!(
        "Goals: {} ({} lines, {} branches)",
        program.goals().len(),
        program.lines().len(),
        program.branches().len()
    );
    println!("Population: {}", config.population.size);
    if let Some(max) = config.budget.max_generations {
        println!("Max generations: {}", max);
    }
    if let Some(ms) = config.budget.time_budget_ms {
        println!("Time budget: {:.1}s", ms as f64 / 1000.0);
    }
    println!();

    let variation = InputVariation::new(program.inputs(), program.bounds());
    let breeder = match config.random_seed {
        Some(seed) => TournamentBreeder::new(variation, config.breeding.clone(), seed),
        None => TournamentBreeder::from_entropy(variation, config.breeding.clone()),
    };
    let evaluator = ProgramEvaluator::new(Arc::clone(&program));
    let solver = PathSolver::new(Arc::clone(&program));

    let mut engine = SearchEngine::new(config, program.goals().clone(), breeder, evaluator)
        .unwrap_or_else(|e| {
            eprintln!("Error creating search: {}", e);
            std::process::exit(1);
        })
        .with_directed_generator(solver);

    println!("Running search...");
    let mut reported = 0;
    let result = engine
        .run_with_callback(|progress| {
            // Report every coverage change
            if progress.covered_goals > reported {
                reported = progress.covered_goals;
                println!(
                    "  Generation {}: {}/{} covered, {} active, stall {}/{} ({:.2}s)",
                    progress.generation,
                    progress.covered_goals,
                    progress.total_goals,
                    progress.current_goals,
                    progress.stall_count,
                    progress.stall_threshold,
                    progress.elapsed_seconds
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    let stats = &result.stats;
    println!();
    println!("Finished: {:?}", stats.stop_reason);
    println!(
        "  Coverage: {}/{} ({:.1}%)",
        stats.covered_goals,
        stats.total_goals,
        stats.coverage() * 100.0
    );
    println!("  Generations: {}", stats.generations);
    println!("  Evaluations: {}", stats.evaluations);
    println!(
        "  Directed rounds: {} ({} improving)",
        stats.directed_rounds, stats.improving_directed_rounds
    );
    println!("  Time: {:.2}s", stats.elapsed_seconds);
    println!();

    println!("Archive:");
    for (goal, candidate) in result.archive.iter() {
        let name = result.goals.get(goal).map(|g| g.name()).unwrap_or("?");
        println!("  {:<32} {}", name, candidate.test);
    }
    let uncovered: Vec<&str> = result
        .goals
        .iter()
        .filter(|g| !result.archive.contains(g.id()))
        .map(|g| g.name())
        .collect();
    if !uncovered.is_empty() {
        println!();
        println!("Uncovered: {}", uncovered.join(", "));
    }

    if let Some(path) = problem.archive_output {
        match result.archive.save_json(&result.goals, &path) {
            Ok(()) => println!("Archive written to {}", path.display()),
            Err(e) => eprintln!("Error writing archive: {}", e),
        }
    }
}

fn print_example_problem() {
    let problem = ProblemFile::example();

    println!("Example problem (problem.json):");
    match serde_json::to_string_pretty(&problem) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example: {}", e),
    }
}
