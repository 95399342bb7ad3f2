//! easyfilter-check: CLI tool for fetching filter lists and checking URLs against them.

use clap::{Parser, Subcommand};
use easyfilter::{
    normalize_url, parse_rules, FilterConfig, FilterEngine, HttpSource, RuleSource, RuleStore,
    Snapshot,
};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "easyfilter-check")]
#[command(version = "0.1.0")]
#[command(about = "Fetch EasyList filter lists and check URLs against them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download filter lists and save them as a local snapshot
    Fetch {
        /// Directory to save the snapshot in
        #[arg(short, long, default_value = "easyfilter-cache")]
        cache_dir: PathBuf,

        /// Endpoint URL (repeatable; defaults to EasyList + EasyPrivacy)
        #[arg(short, long)]
        endpoint: Vec<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check URLs against an EasyList-format file
    Check {
        /// Filter list file to load rules from
        #[arg(short, long)]
        list: PathBuf,

        /// URLs to check
        urls: Vec<String>,

        /// Show the rule lines that matched
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run a live engine load and report its statistics
    Stats {
        /// Directory for the snapshot and verdict caches
        #[arg(short, long, default_value = "easyfilter-cache")]
        cache_dir: PathBuf,

        /// File of URLs (one per line) to replay through the engine
        #[arg(short, long)]
        urls: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            cache_dir,
            endpoint,
            verbose,
        } => {
            if let Err(e) = fetch_lists(&cache_dir, &endpoint, verbose) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Check {
            list,
            urls,
            verbose,
        } => {
            if let Err(e) = check_urls(&list, &urls, verbose) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Stats { cache_dir, urls } => {
            if let Err(e) = live_stats(&cache_dir, urls.as_ref()) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn fetch_lists(
    cache_dir: &PathBuf,
    endpoints: &[String],
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoints: Vec<String> = if endpoints.is_empty() {
        FilterConfig::default().endpoints
    } else {
        endpoints.to_vec()
    };

    let mut merged = RuleStore::new();
    for url in &endpoints {
        if verbose {
            println!("Fetching {}", url);
        }
        let source = HttpSource::new(url, Duration::from_secs(60));
        match source.fetch() {
            Ok(store) => {
                if verbose {
                    println!(
                        "  {} exceptions, {} exclusions",
                        store.exception_count(),
                        store.exclusion_count()
                    );
                }
                merged.add_all(&store);
            }
            Err(e) => {
                eprintln!("  Warning: failed to fetch {}: {}", url, e);
            }
        }
    }

    let snapshot = Snapshot::new(cache_dir.clone());
    snapshot.save(&merged)?;
    println!(
        "Saved {} rules ({} exceptions, {} exclusions) to {:?}",
        merged.rule_count(),
        merged.exception_count(),
        merged.exclusion_count(),
        cache_dir
    );
    Ok(())
}

fn check_urls(
    list: &PathBuf,
    urls: &[String],
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::open(list)?;
    let store = parse_rules(file);
    println!(
        "Loaded {} rules ({} exceptions, {} exclusions) from {:?}",
        store.rule_count(),
        store.exception_count(),
        store.exclusion_count(),
        list
    );

    for url in urls {
        let normalized = normalize_url(url);
        let excluded = store.matches_exclusion(&normalized);
        let excepted = store.matches_exception(&normalized);
        let verdict = if excluded && excepted {
            "allow (exception)"
        } else if excluded {
            "block"
        } else {
            "allow"
        };
        println!("{:18} {}", verdict, url);

        if verbose {
            for rule in store.exclusions().filter(|r| r.applies(&normalized)) {
                println!("    exclusion: {}", rule.original_line());
            }
            for rule in store.exceptions().filter(|r| r.applies(&normalized)) {
                println!("    exception: {}", rule.original_line());
            }
        }
    }
    Ok(())
}

fn live_stats(
    cache_dir: &PathBuf,
    urls: Option<&PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = FilterConfig::default().with_cache_dir(cache_dir.clone());
    let engine = FilterEngine::new(config);

    let start = Instant::now();
    engine.load();
    if !engine.wait_until_ready(Duration::from_secs(120)) {
        return Err("engine did not become ready within 120s".into());
    }
    println!(
        "Engine ready in {}ms with {} rules",
        start.elapsed().as_millis(),
        engine.rule_count()
    );

    if let Some(path) = urls {
        let content = fs::read_to_string(path)?;
        let mut total = 0usize;
        let mut blocked = 0usize;
        for url in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            total += 1;
            let block = engine.matches_exclusion(url)
                && !(engine.is_with_exception() && engine.matches_exception(url));
            if block {
                blocked += 1;
            }
        }
        println!("Replayed {} URLs, {} blocked", total, blocked);
    }

    let stats = engine.stats();
    println!("Requests:    {}", stats.requests);
    println!(
        "Cache hits:  {} ({:.1}%)",
        stats.cache_hits,
        stats.cache_hit_rate()
    );
    println!(
        "Filter hits: {} ({:.1}%)",
        stats.filter_hits,
        stats.filter_hit_rate()
    );
    Ok(())
}
