//! Flowform CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "flowform")]
#[command(about = "Convert questionnaire flow graphs to and from relational records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./flowform.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export an editor graph as a record batch
    Export {
        /// Graph JSON with `nodes` and `edges`
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Graph name (defaults to the name carried by the input)
        #[arg(short, long)]
        name: Option<String>,

        /// Embed node positions and edge rendering hints
        #[arg(long)]
        with_layout: bool,

        /// Criteria catalog used to complete partial criteria
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Export even when the graph has no start node
        #[arg(short, long)]
        force: bool,
    },
    /// Import a record batch (or editor graph) as an editor graph
    Import {
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Criteria catalog used to resolve question tags
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Import, export and re-import a file and report what changed
    Roundtrip { input: PathBuf },
    /// Manage a criteria catalog file
    Criteria {
        /// Catalog JSON file
        #[arg(long, default_value = "criteria.json")]
        catalog: PathBuf,

        #[command(subcommand)]
        action: CriteriaAction,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
pub enum CriteriaAction {
    /// List all criteria, sorted by label
    List,
    /// Add a criterion
    Add {
        #[arg(long)]
        value: String,
        #[arg(long)]
        label: String,
        /// Id to use instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },
    /// Remove a criterion by id
    Remove { id: String },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("flowform={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Flowform v{}", env!("CARGO_PKG_VERSION"));
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Export {
            input,
            output,
            name,
            with_layout,
            catalog,
            force,
        } => {
            let options = commands::ExportOptions {
                name,
                with_layout,
                catalog,
                force,
            };
            commands::export(&config, &input, output.as_deref(), &options)
        }
        Commands::Import { input, output, catalog } => {
            commands::import(&config, &input, output.as_deref(), catalog.as_deref())
        }
        Commands::Roundtrip { input } => commands::roundtrip(&config, &input),
        Commands::Criteria { catalog, action } => commands::criteria(&catalog, action),
        Commands::Version => {
            println!("Flowform v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
