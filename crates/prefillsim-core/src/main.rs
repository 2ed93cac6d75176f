//! Prefillsim CLI — benchmark cache-aware prefill routing without GPUs.

use clap::{Parser, Subcommand};
use prefillsim_core::config::SimConfig;
use prefillsim_core::{stats, trace};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "prefillsim",
    about = "Benchmark cache-aware prefill routing policies without GPUs",
    version
)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with a single selector.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to JSONL trace file (overrides the config's trace.path).
        #[arg(short, long)]
        trace: Option<PathBuf>,
        /// Selector name (overrides the config's routing.selector).
        #[arg(short, long)]
        selector: Option<String>,
        /// Write the run report to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare multiple selectors on the same trace.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Path to JSONL trace file (overrides the config's trace.path).
        #[arg(short, long)]
        trace: Option<PathBuf>,
        /// Comma-separated selector names (default: all).
        #[arg(short = 'S', long, value_delimiter = ',')]
        selectors: Vec<String>,
        /// Write all run reports to a JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a synthetic trace.
    GenTrace {
        /// Number of requests.
        #[arg(long, default_value = "10000")]
        requests: u64,
        /// Size of the block-ID pool.
        #[arg(long, default_value = "1000")]
        blocks: u64,
        /// Fraction of the pool treated as hot.
        #[arg(long, default_value = "0.1")]
        hotspot_ratio: f64,
        /// Access skew exponent (0 = uniform, 1 = extreme).
        #[arg(long, default_value = "0.5")]
        skew: f64,
        /// Fraction of requests that walk sequential block runs.
        #[arg(long, default_value = "0.7")]
        sequential_ratio: f64,
        /// Blocks per request before deduplication.
        #[arg(long, default_value = "12")]
        request_length: usize,
        /// RNG seed.
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List available selectors and eviction policies.
    ListSelectors,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "prefillsim_core=debug,prefillsim_routing=debug"
    } else {
        "prefillsim_core=info,prefillsim_routing=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            trace: trace_path,
            selector,
            output,
        } => {
            let mut sim_config = load_config(&config);
            if let Some(name) = selector {
                sim_config.routing.selector = name;
            }
            let requests = load_requests(&sim_config, trace_path.as_deref());

            let report = prefillsim_core::run_simulation(&sim_config, &requests)
                .unwrap_or_else(|e| {
                    eprintln!("Error running simulation: {}", e);
                    std::process::exit(1);
                });
            println!("{}", stats::format_table(&report));

            if let Some(output_path) = output {
                write_json(&output_path, &report);
            }
        }
        Commands::Compare {
            config,
            trace: trace_path,
            selectors,
            output,
        } => {
            let sim_config = load_config(&config);
            let requests = load_requests(&sim_config, trace_path.as_deref());

            let names: Vec<&str> = if selectors.is_empty() {
                prefillsim_routing::available_selectors()
            } else {
                selectors.iter().map(|s| s.as_str()).collect()
            };

            let reports = prefillsim_core::compare_selectors(&sim_config, &requests, &names);
            println!("{}", stats::format_comparison_table(&reports));
            for report in &reports {
                println!("{}", stats::format_table(report));
            }

            if let Some(output_path) = output {
                write_json(&output_path, &reports);
            }
        }
        Commands::GenTrace {
            requests,
            blocks,
            hotspot_ratio,
            skew,
            sequential_ratio,
            request_length,
            seed,
            output,
        } => {
            let generated = generate_trace(
                requests,
                blocks,
                hotspot_ratio,
                skew,
                sequential_ratio,
                request_length,
                seed,
            );
            trace::write_trace(&generated, &output).unwrap_or_else(|e| {
                eprintln!("Error writing trace: {}", e);
                std::process::exit(1);
            });
            println!("Generated {} requests to {}", generated.len(), output.display());
        }
        Commands::ListSelectors => {
            println!("Available selectors:");
            for name in prefillsim_routing::available_selectors() {
                println!("  - {}", name);
            }
            println!("Available eviction policies:");
            for name in prefillsim_routing::available_evictions() {
                println!("  - {}", name);
            }
        }
    }
}

fn load_config(path: &std::path::Path) -> SimConfig {
    SimConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    })
}

fn load_requests(
    config: &SimConfig,
    trace_path: Option<&std::path::Path>,
) -> Vec<prefillsim_routing::Request> {
    let path = trace_path
        .map(PathBuf::from)
        .or_else(|| config.trace.path.as_ref().map(PathBuf::from));

    match path {
        Some(p) => trace::load_trace(&p).unwrap_or_else(|e| {
            eprintln!("Error loading trace: {}", e);
            std::process::exit(1);
        }),
        None => {
            eprintln!("No trace file specified. Use --trace or set trace.path in config.");
            std::process::exit(1);
        }
    }
}

fn write_json<T: serde::Serialize>(path: &std::path::Path, value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        std::process::exit(1);
    });
    std::fs::write(path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
    println!("Results written to {}", path.display());
}

/// Generate a synthetic workload: a weighted hot set with Zipf-style skew,
/// mixing sequential block runs with weighted random picks.
fn generate_trace(
    num_requests: u64,
    pool_size: u64,
    hotspot_ratio: f64,
    skew: f64,
    sequential_ratio: f64,
    request_length: usize,
    seed: u64,
) -> Vec<prefillsim_routing::Request> {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let pool = pool_size.max(1);
    let hot_count = ((pool as f64 * hotspot_ratio.clamp(0.0, 1.0)) as u64).max(1);

    // Zipf-style weights over the hot set; a flat floor for the rest.
    let mut weights = Vec::with_capacity(pool as usize);
    for i in 0..pool {
        if i < hot_count {
            weights.push(1.0 / ((i + 1) as f64).powf(skew * 2.0));
        } else {
            weights.push(0.001);
        }
    }
    let total_weight: f64 = weights.iter().sum();

    let mut pick_weighted = move |rng: &mut ChaCha8Rng| -> u64 {
        let r = rng.gen::<f64>() * total_weight;
        let mut cumulative = 0.0;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if r <= cumulative {
                return i as u64;
            }
        }
        pool - 1
    };

    (0..num_requests)
        .map(|i| {
            let mut hash_ids: Vec<u64> = if rng.gen::<f64>() < sequential_ratio {
                let start = pick_weighted(&mut rng);
                (start..pool).take(request_length).collect()
            } else {
                (0..request_length).map(|_| pick_weighted(&mut rng)).collect()
            };

            // Drop duplicates, keeping first occurrence order.
            let mut seen = std::collections::HashSet::new();
            hash_ids.retain(|id| seen.insert(*id));

            prefillsim_routing::Request {
                timestamp: i * 10,
                input_length: (hash_ids.len() as u32) * prefillsim_routing::BLOCK_SIZE_TOKENS,
                output_length: 64 + rng.gen_range(0..128),
                hash_ids,
            }
        })
        .collect()
}
