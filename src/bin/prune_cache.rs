//! Cache maintenance binary — inspect, prune, or wipe the on-disk stores.
//!
//! Usage: cargo run --release --bin prune_cache -- [OPTIONS]
//!
//! Options:
//!   --root <DIR>         Cache root directory (default: "kagami-cache")
//!   --namespace <NAME>   Restrict to one namespace (default: all)
//!   --max-age-days <N>   Evict entries idle for more than N days (default: 7)
//!   --clear              Wipe the selected namespaces instead of age-pruning
//!   --stats              Print per-namespace counts and sizes, change nothing

use std::path::PathBuf;
use std::sync::Arc;

use kagami::cache::janitor::EvictionJanitor;
use kagami::cache::policy::ResourceCategory;
use kagami::cache::registry::{CacheConfig, CacheStores};
use kagami::cache::telemetry::human_size;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let root = parse_str_arg(&args, "--root").unwrap_or_else(|| "kagami-cache".to_string());
    let namespace = parse_str_arg(&args, "--namespace");
    let max_age_days = parse_u64_arg(&args, "--max-age-days").unwrap_or(7);
    let clear = args.iter().any(|a| a == "--clear");
    let stats_only = args.iter().any(|a| a == "--stats");

    let config = CacheConfig {
        root: PathBuf::from(&root),
    };
    let stores = Arc::new(CacheStores::open(&config));

    let category = namespace.as_deref().map(|ns| {
        ResourceCategory::from_namespace(ns).unwrap_or_else(|| {
            let known: Vec<&str> = ResourceCategory::ALL.iter().map(|c| c.namespace()).collect();
            eprintln!("Unknown namespace '{}'. Known: {}", ns, known.join(", "));
            std::process::exit(1);
        })
    });

    if stats_only {
        print_stats(&stores).await;
        return;
    }

    let janitor = EvictionJanitor::new(stores.clone());

    if clear {
        let result = match category {
            Some(c) => janitor.clear_all(c).await,
            None => janitor.clear_everything().await,
        };
        result.expect("Failed to clear cache");
        match category {
            Some(c) => println!("Cleared namespace '{}'", c.namespace()),
            None => println!("Cleared all namespaces"),
        }
    } else {
        let max_age_secs = max_age_days * 86_400;
        let report = match category {
            Some(c) => janitor.cleanup(c, max_age_secs).await,
            None => janitor.cleanup_all(max_age_secs).await,
        }
        .expect("Cleanup failed");

        println!(
            "Evicted {} entries ({}) older than {} days",
            report.deleted_count,
            human_size(report.deleted_bytes),
            max_age_days
        );
    }

    println!();
    print_stats(&stores).await;
}

async fn print_stats(stores: &CacheStores) {
    let report = stores.stats().await;

    println!("=== Kagami Cache ===");
    println!("Root: {}", stores.root().display());
    for ns in &report.namespaces {
        println!(
            "  {:<18} {:>6} entries  {:>10}",
            ns.namespace,
            ns.count,
            human_size(ns.total_bytes)
        );
    }
    println!(
        "  {:<18} {:>6} entries  {:>10}",
        "total",
        report.total_count(),
        human_size(report.total_bytes())
    );
}

fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.clone())
}
