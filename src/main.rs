//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `shopscan` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Ctrl-C handling
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::process;
use tokio_util::sync::CancellationToken;

use shopscan::config::{Command, Opt};
use shopscan::initialization::{init_crypto_provider, init_logger_with};
use shopscan::{list_crawls, run_crawl, run_detect, CrawlConfig, DetectConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.into(), opt.log_format).context("Failed to initialize logger")?;
    init_crypto_provider();

    // First Ctrl-C stops dispatching new work; rows already written are kept
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let outcome = match opt.command {
        Command::Crawl(args) if args.list_crawls => {
            let config = CrawlConfig::from(args);
            list_crawls(&config.index).await.map(|collections| {
                for collection in &collections {
                    println!("{}\t{}", collection.id, collection.name);
                }
            })
        }
        Command::Crawl(args) => run_crawl(CrawlConfig::from(args), cancel).await.map(|report| {
            println!(
                "✅ Discovered {} domain{} from {} shard{} in {:.1}s",
                report.index.domains_admitted,
                if report.index.domains_admitted == 1 { "" } else { "s" },
                report.index.shards,
                if report.index.shards == 1 { "" } else { "s" },
                report.elapsed_seconds
            );
            println!("Domains saved in {}", report.discovery_path.display());
            if let (Some(live), Some(path)) = (&report.live, &report.detection_path) {
                println!(
                    "Live detection: {} detected, {} unknown, {} unreachable - saved in {}",
                    live.detected,
                    live.unknown,
                    live.unreachable,
                    path.display()
                );
            }
        }),
        Command::Detect(args) => run_detect(DetectConfig::from(args), cancel).await.map(|report| {
            println!(
                "✅ Classified {} domain{} ({} detected, {} unknown, {} unreachable) in {:.1}s",
                report.live.probed,
                if report.live.probed == 1 { "" } else { "s" },
                report.live.detected,
                report.live.unknown,
                report.live.unreachable,
                report.elapsed_seconds
            );
            println!("Results saved in {}", report.output.display());
        }),
    };

    if let Err(e) = outcome {
        eprintln!("shopscan error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}
