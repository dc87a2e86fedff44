//! neuroflap CLI - Evolve obstacle-course agents from a JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;

use neuroflap::{
    compute::evolution::EvolutionDriver,
    schema::{EvolutionConfig, StopReason},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [generations] [--save history.nfh]", args[0]);
        eprintln!();
        eprintln!("Evolve neural-network agents on a scrolling obstacle course.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json   Path to evolution configuration file");
        eprintln!("  generations   Number of generations to run (default: 50)");
        eprintln!("  --save PATH   Write the recorded history to PATH when done");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let mut generations: usize = 50;
    let mut save_path: Option<PathBuf> = None;

    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        if arg == "--save" {
            let Some(path) = rest.next() else {
                eprintln!("--save requires a path");
                std::process::exit(1);
            };
            save_path = Some(PathBuf::from(path));
        } else {
            generations = arg.parse().unwrap_or_else(|e| {
                eprintln!("Invalid generation count '{}': {}", arg, e);
                std::process::exit(1);
            });
        }
    }

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: EvolutionConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    println!("neuroflap evolution");
    println!("===================");
    println!(
        "World: {}x{}, gap {}, spawn every {} ticks",
        config.world.width, config.world.height, config.world.gap_height, config.world.spawn_interval
    );
    println!(
        "Population: {} agents, hidden layer {}",
        config.genetic.population_size, config.network.hidden
    );
    println!(
        "Mutation: rate {}, strength {}; elitism {}",
        config.genetic.mutation_rate, config.genetic.mutation_strength, config.genetic.elitism_rate
    );
    println!("Generations: {}", generations);
    println!();

    let mut driver = EvolutionDriver::new(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    println!("Running evolution...");
    let report_every = (generations / 10).max(1);
    let summary = driver
        .run_batch(generations, |progress| {
            // Only per-generation reports arrive with tick 0.
            let completed = progress.generation.saturating_sub(1);
            if progress.tick == 0 && completed > 0 && completed % report_every == 0 {
                println!(
                    "  Generation {}/{}: best ever {:.0}, last avg {:.1}",
                    completed, generations, progress.best_fitness, progress.average_fitness
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    let history = driver.fitness_history();
    println!();
    println!("Results:");
    println!("  Generations: {}", summary.generations);
    println!("  Best fitness: {:.0}", summary.best_fitness);
    if let (Some(best), Some(avg)) = (history.best_fitness.last(), history.average_fitness.last()) {
        println!("  Last generation: best {:.0}, avg {:.1}", best, avg);
    }
    println!(
        "  Tick bound reached: {} of {} generations",
        summary.tick_bound_hits, summary.generations
    );
    if summary.stop_reason == StopReason::Cancelled {
        println!("  Stopped early");
    }
    println!(
        "Time: {:.2}s ({:.0} ticks/s)",
        summary.elapsed_seconds,
        summary.total_ticks as f64 / summary.elapsed_seconds.max(1e-9)
    );

    if let Some(path) = save_path {
        let mut file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Error creating {}: {}", path.display(), e);
            std::process::exit(1);
        });
        if let Err(e) = driver.save_history(&mut file) {
            eprintln!("Error saving history: {}", e);
            std::process::exit(1);
        }
        println!("History saved to {}", path.display());
    }
}

fn print_example_config() {
    let config = EvolutionConfig {
        random_seed: Some(42),
        ..Default::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
