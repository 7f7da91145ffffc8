// src/main.rs
use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use std::io::{self, BufRead};
use std::process;
use std::sync::atomic::Ordering;

mod backends;
mod cli;
mod config;
mod engine;
mod expand;
mod normalize;
mod ratelimit;
mod session;
mod sink;
mod target;
mod types;

use cli::Args;
use config::CredentialStore;
use engine::{Module, ReconEngine};
use types::Config;

const BANNER: &str = r#"    ____             __  ____
   / __ \__  _______/ /_/ __ \___  _________  ____
  / /_/ / / / / ___/ __/ /_/ / _ \/ ___/ __ \/ __ \
 / _, _/ /_/ (__  ) /_/ _, _/  __/ /__/ /_/ / / / /
/_/ |_|\__,_/____/\__/_/ |_|\___/\___/\____/_/ /_/

        Terminal OSINT Investigations
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    if !args.silent {
        println!("{}", BANNER);
        println!(
            "        v{} ({}, built {})\n",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH"),
            env!("BUILD_TIME")
        );
    }

    if args.list_backends {
        list_backends(&args);
        return Ok(());
    }

    let targets = get_targets_from_args(&args);
    if targets.is_empty() {
        error!("No input provided. Use -t <target> or pipe targets to stdin");
        process::exit(1);
    }

    let module_override = match args.module.as_deref() {
        Some(name) => match Module::parse(name) {
            Some(module) => Some(module),
            None => {
                error!("Unknown module: {}", name);
                process::exit(1);
            }
        },
        None => None,
    };

    let engine = ReconEngine::new(args.clone()).await?;

    // Ctrl-C stops new dispatches; in-flight calls finish or time out.
    let cancel_flag = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, aborting new dispatches");
            cancel_flag.store(true, Ordering::Relaxed);
        }
    });

    let mut total_records = 0usize;
    let mut total_found = 0usize;

    for raw in targets {
        if engine.cancel_flag().load(Ordering::Relaxed) {
            break;
        }

        let target = match target::parse_target(&raw, None) {
            Ok(target) => target,
            Err(e) => {
                error!("Skipping '{}': {}", raw, e);
                continue;
            }
        };
        let module = module_override.unwrap_or_else(|| Module::default_for(target.kind));

        match engine.run(module, &target).await {
            Ok(report) => {
                total_records += report.stats.records;
                total_found += report.stats.found;
                info!(
                    "Completed {} on {}: {} records in {:.2}s",
                    module.name(),
                    target.normalized,
                    report.stats.records,
                    report.stats.duration.as_secs_f64()
                );
            }
            Err(e) => {
                error!("Investigation of {} failed: {}", target.normalized, e);
                if engine.args().verbose {
                    eprintln!("Error details: {:?}", e);
                }
            }
        }
    }

    if !engine.args().silent {
        info!(
            "Done: {} records total, {} positive",
            total_records, total_found
        );
    }

    Ok(())
}

fn list_backends(args: &Args) {
    println!("Available backends:\n");

    let config = Config::default();
    let credentials = CredentialStore::load(args.credentials_path.as_deref()).unwrap_or_default();
    let all = backends::get_all_backends(&config, &credentials);

    let mut keyed = Vec::new();
    let mut free = Vec::new();
    for backend in all {
        let info = backend.info();
        if info.needs_key {
            keyed.push(format!("{} *", info.name));
        } else {
            free.push(info.name);
        }
    }

    println!("Open backends ({})", free.len());
    for name in free {
        println!("  {}", name);
    }

    println!("\nAPI backends ({})", keyed.len());
    for name in keyed {
        println!("  {}", name);
    }

    println!("\n* = Requires API key");
    println!("\nTo configure API keys, create a credentials.toml and pass --credentials");
}

fn get_targets_from_args(args: &Args) -> Vec<String> {
    let mut targets = Vec::new();

    if !args.target.is_empty() {
        targets.extend(args.target.clone());
    }

    if args.use_stdin() {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            if let Ok(target) = line {
                let trimmed = target.trim();
                if !trimmed.is_empty() {
                    targets.push(trimmed.to_string());
                }
            }
        }
    }

    targets
}
