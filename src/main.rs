use std::fs::OpenOptions;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagedb::repl;
use pagedb::storage::table::Table;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "db", version = VERSION, about = "A single-file embedded relational store.")]
struct Cli {
    /// Path to the database file. Created if it doesn't already exist.
    filename: String,
}

fn main() {
    let cli = Cli::parse();

    let log_path = format!("{}.log", cli.filename);
    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .expect("failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut table = match Table::open(std::path::Path::new(&cli.filename)) {
        Ok(table) => table,
        Err(e) => {
            println!("Unable to open database file: {}", e);
            std::process::exit(1);
        }
    };

    repl::run(&mut table);
}
