//! Lore CLI - incremental document ingestion for retrieval-augmented generation

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Lore - keep a retrieval index in step with a folder of documents
#[derive(Parser)]
#[command(name = "lore")]
#[command(version)]
#[command(about = "Incremental document ingestion for retrieval-augmented generation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the platform default
    #[arg(short, long, global = true, env = "LORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every new or changed document under the documents root
    Ingest {
        /// Documents root (overrides the configured one)
        #[arg(short, long)]
        root: Option<String>,

        /// Reprocess every document regardless of recorded state
        #[arg(short, long)]
        force: bool,

        /// Segment output file (JSON lines)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ingest a single document
    Add {
        /// Path to the document
        path: String,

        /// Reprocess even if unchanged
        #[arg(short, long)]
        force: bool,

        /// Segment output file (JSON lines)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List candidate documents and whether the next run would process them
    Scan {
        /// Documents root (overrides the configured one)
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Show recorded processing state
    Status {
        /// Documents root (overrides the configured one)
        #[arg(short, long)]
        root: Option<String>,

        /// List every failed document with its error
        #[arg(long)]
        failed: bool,
    },

    /// Watch the documents root and ingest changes as they happen
    Watch {
        /// Documents root (overrides the configured one)
        #[arg(short, long)]
        root: Option<String>,

        /// Segment output file (JSON lines)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file location
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lore=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lore=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Ingest {
            root,
            force,
            output,
        } => commands::ingest::run(config, root, force, output),
        Commands::Add {
            path,
            force,
            output,
        } => commands::add::run(config, &path, force, output),
        Commands::Scan { root } => commands::scan::run(config, root),
        Commands::Status { root, failed } => commands::status::run(config, root, failed),
        Commands::Watch { root, output } => commands::watch::run(config, root, output),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(config),
            ConfigCommands::Init { force } => commands::config::init(config, force),
            ConfigCommands::Path => commands::config::path(config),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
