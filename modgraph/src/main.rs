// modgraph/src/main.rs
use std::process;

use clap::Parser;
use colored::Colorize;
use modgraph_common::error::Result;
use modgraph_core::{GraphOptions, ModuleGraph, NoParse};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod cli;
use cli::CliArgs;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let level_filter = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("MODGRAPH_LOG")
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();

    if let Err(e) = run(&args).await {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }
    debug!("Graph walk completed successfully.");
}

async fn run(args: &CliArgs) -> Result<()> {
    let options = GraphOptions {
        basedir: args.basedir.clone(),
        extensions: args.extensions.clone(),
        transform_key: args
            .transform_key
            .as_deref()
            .map(|key| key.split('.').map(str::to_string).collect())
            .unwrap_or_default(),
        no_parse: if args.no_parse {
            NoParse::All
        } else {
            NoParse::Off
        },
        paths: args.paths.clone(),
        ..GraphOptions::default()
    };

    let mut graph = ModuleGraph::new(options);
    for entry in &args.entries {
        graph.add_entry(entry.clone());
    }

    let mut rx = graph.stream();
    let mut count = 0usize;
    while let Some(item) = rx.recv().await {
        let record = item?;
        let line = if args.pretty {
            serde_json::to_string_pretty(&record)?
        } else {
            serde_json::to_string(&record)?
        };
        println!("{line}");
        count += 1;
    }
    debug!("Emitted {count} module records.");
    Ok(())
}
