// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for building and querying posting indices

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use humansize::{SizeFormatter, BINARY};
use posting_index::{
    config::DEFAULT_SEED, verify, Builder, Catalog, CatalogOptions, Config, CsvSource, Field,
    Index,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> (bool, LevelFilter) {
    let is_verbose = !quiet && verbose > 0;

    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let registry = Registry::default();

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("PIDX_LOG")
        .from_env_lossy();

    let subscriber = registry.with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));

    (is_verbose, level_filter)
}

fn parse_bucket_count(s: &str) -> Result<u64, String> {
    let n = s.parse::<u64>().map_err(|e| e.to_string())?;

    if n.is_power_of_two() {
        Ok(n)
    } else {
        Err(format!("{n} is not a power of two"))
    }
}

fn parse_seed(s: &str) -> Result<u64, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse::<u64>(),
    }
    .map_err(|e| e.to_string())
}

/// CLI tool for building and querying posting indices
#[derive(Parser, Debug)]
#[command(name = "pidx")]
#[command(about = "CLI tool for building and querying posting indices")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the index directory (will be created if it doesn't exist)
    index_path: PathBuf,

    /// Command to run
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Build the title and author indices of a CSV file, replacing existing ones
    Build {
        /// CSV file with a header line, title in the first column, author in the second
        csv: PathBuf,

        /// Number of title buckets (power of two)
        #[arg(long, default_value_t = 4_096, value_parser = parse_bucket_count)]
        title_buckets: u64,

        /// Number of author buckets (power of two)
        #[arg(long, default_value_t = 4_096, value_parser = parse_bucket_count)]
        author_buckets: u64,

        /// Hash seed (decimal or 0x-prefixed hex)
        #[arg(long, default_value_t = DEFAULT_SEED, value_parser = parse_seed)]
        seed: u64,
    },
    /// Print the record offsets stored under a key
    Get {
        /// Index to query ("title", "author" or a column number)
        field: Field,

        /// The key to look up
        key: String,
    },
    /// Print the records matching a title and/or an author
    Search {
        /// Title to match
        #[arg(short, long, default_value = "")]
        title: String,

        /// Author to match
        #[arg(short, long, default_value = "")]
        author: String,

        /// CSV file the indices were built from
        #[arg(long)]
        csv: PathBuf,
    },
    /// Append a record to the CSV file and index it
    Add {
        /// CSV file the indices were built from
        #[arg(long)]
        csv: PathBuf,

        /// The CSV line to append
        line: String,
    },
    /// Show index statistics
    Info,
    /// Check the structure of every index
    Verify,
}

fn index_names(folder: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(folder)
        .map(|dir| {
            dir.filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.extension()
                        .is_some_and(|ext| ext == posting_index::file::BUCKETS_FILE_EXT)
                })
                .filter_map(|path| {
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    names.sort();
    names
}

fn open_index(folder: &Path, name: &str) -> posting_index::Result<Index> {
    Config::new(folder, name).read_only(true).open()
}

fn file_size(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => SizeFormatter::new(meta.len(), BINARY).to_string(),
        Err(e) => format!("? ({e})"),
    }
}

fn handle_build(
    folder: &Path,
    csv: &Path,
    title_buckets: u64,
    author_buckets: u64,
    seed: u64,
) -> posting_index::Result<()> {
    let source = CsvSource::open(csv)?;

    let (_, stats) = Builder::new(&source)
        .index(
            Field::Title,
            Config::new(folder, "title")
                .bucket_count(title_buckets)
                .seed(seed),
        )
        .index(
            Field::Author,
            Config::new(folder, "author")
                .bucket_count(author_buckets)
                .seed(seed),
        )
        .build()?;

    println!(
        "OK ({} records, {} indexed, {} skipped)",
        stats.records, stats.indexed, stats.skipped
    );

    Ok(())
}

fn handle_get(folder: &Path, field: Field, key: &str) -> posting_index::Result<()> {
    let index = open_index(folder, &field.name())?;
    let hits = index.lookup(key)?;

    for offset in &hits {
        println!("{offset}");
    }
    println!("({} hits)", hits.len());

    Ok(())
}

fn handle_search(folder: &Path, csv: &Path, title: &str, author: &str) -> posting_index::Result<()> {
    let catalog = Catalog::open_or_build(folder, csv, &CatalogOptions::default())?;
    let records = catalog.search(title, author)?;

    for record in &records {
        println!("{record}");
    }
    println!("({} records)", records.len());

    Ok(())
}

fn handle_add(folder: &Path, csv: &Path, line: &str) -> posting_index::Result<()> {
    let mut catalog = Catalog::open_or_build(folder, csv, &CatalogOptions::default())?;
    let offset = catalog.add(line)?;

    println!("OK (record at offset {offset})");

    Ok(())
}

fn print_info(folder: &Path) -> posting_index::Result<()> {
    println!("Path: {}", folder.display());

    for name in index_names(folder) {
        let index = open_index(folder, &name)?;

        let buckets_path = index.bucket_table().path();
        let nodes_path = index.node_store().path();

        println!("Index {name:?}:");
        println!("  Buckets: {}", index.bucket_count());
        println!("  Seed: {:#018x}", index.seed());
        println!("  Bucket table: {}", file_size(buckets_path));
        println!("  Node store: {}", file_size(nodes_path));
    }

    Ok(())
}

fn handle_verify(folder: &Path) -> posting_index::Result<bool> {
    let mut ok = true;

    for name in index_names(folder) {
        let index = open_index(folder, &name)?;
        let report = verify(&index)?;

        println!(
            "Index {name:?}: {} nodes, {} postings, {}/{} buckets used, longest chain {}, avg chain {:.2}",
            report.nodes,
            report.postings,
            report.buckets_used,
            report.buckets,
            report.longest_chain,
            report.avg_chain_len(),
        );

        for issue in &report.issues {
            println!("  {issue:?}");
        }

        ok &= report.is_ok();
    }

    Ok(ok)
}

fn execute_command(folder: &Path, cmd: ToolCommand) -> posting_index::Result<bool> {
    match cmd {
        ToolCommand::Build {
            csv,
            title_buckets,
            author_buckets,
            seed,
        } => handle_build(folder, &csv, title_buckets, author_buckets, seed)?,
        ToolCommand::Get { field, key } => handle_get(folder, field, &key)?,
        ToolCommand::Search { title, author, csv } => handle_search(folder, &csv, &title, &author)?,
        ToolCommand::Add { csv, line } => handle_add(folder, &csv, &line)?,
        ToolCommand::Info => print_info(folder)?,
        ToolCommand::Verify => return handle_verify(folder),
    }
    Ok(true)
}

fn main() {
    let args = ToolArgs::parse();
    let (verbose, level_filter) = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();

    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match execute_command(&args.index_path, args.command) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            let note = if verbose {
                ""
            } else {
                ". Note: Use -v (one or multiple times) for more information"
            };
            die!("Error: {}{}", e, note);
        }
    }
}
