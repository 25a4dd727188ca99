use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::sync::Arc;
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use concept_graph::data_loader;
use concept_graph::{
    reduce, Dataset, DisplayAction, DisplayOptions, DisplayOutput, GraphContainer, ViewerConfig,
};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DataArgs {
    /// JSON dataset file
    #[clap(short, long, required_unless_present = "concepts")]
    data: Option<String>,
    /// Concepts CSV/TSV file, used together with --edges
    #[clap(long, requires = "edges", conflicts_with = "data")]
    concepts: Option<String>,
    /// Edges CSV/TSV file
    #[clap(long, requires = "concepts")]
    edges: Option<String>,
    /// YAML viewer configuration; built-in categories when omitted
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the displayed rows
    Rows {
        #[clap(flatten)]
        input: DataArgs,
        /// JSON display options; configured defaults when omitted
        #[clap(short, long)]
        options: Option<String>,
        /// JSON action applied to the options, in order
        #[clap(short, long)]
        action: Vec<String>,
        #[clap(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print graph statistics and category summaries
    Stats {
        #[clap(flatten)]
        input: DataArgs,
    },
    /// Write the default configuration
    Init {
        #[clap(short, long)]
        config: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Rows {
            input,
            options,
            action,
            format,
        } => {
            let (dataset, config) = load_input(&input)?;
            let container = GraphContainer::new(&dataset, &config)?;

            let mut state = Arc::new(match options {
                Some(path) => DisplayOptions::from_json(&fs::read_to_string(&path)?)
                    .with_context(|| format!("reading display options from {}", path))?,
                None => config.default_options(),
            });
            for raw in &action {
                let action = DisplayAction::parse(raw)
                    .with_context(|| format!("parsing action {}", raw))?;
                state = reduce(&state, &action);
            }

            let output = container.display(&state);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Text => print_rows(&container, &output),
            }
        }
        Commands::Stats { input } => {
            let (dataset, config) = load_input(&input)?;
            let container = GraphContainer::new(&dataset, &config)?;
            println!("{}", container.stats());
            let output = container.display(&config.default_options());
            for category in &output.categories {
                println!(
                    "{:<24} {:?} active:{} members:{} shown:{} hidden:{} affected:{}",
                    category.name,
                    category.rule,
                    category.active,
                    category.members,
                    category.shown_rows,
                    category.hidden_rows,
                    category.affected_rows
                );
            }
        }
        Commands::Init { config } => {
            info!("Writing default configuration: {}", config);
            let serialized = ViewerConfig::default().to_yaml()?;
            fs::write(&config, serialized)?;
        }
    }

    Ok(())
}

fn load_input(input: &DataArgs) -> Result<(Dataset, ViewerConfig)> {
    let config = match &input.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => ViewerConfig::default(),
    };
    let dataset = match (&input.data, &input.concepts, &input.edges) {
        (Some(data), _, _) => data_loader::load_dataset(data)
            .with_context(|| format!("loading dataset from {}", data))?,
        (None, Some(concepts), Some(edges)) => data_loader::load_dataset_csv(concepts, edges)
            .with_context(|| format!("loading {} and {}", concepts, edges))?,
        _ => anyhow::bail!("either --data or --concepts with --edges is required"),
    };
    Ok((dataset, config))
}

fn print_rows(container: &GraphContainer, output: &DisplayOutput) {
    for row in &output.rows {
        let name = container
            .node(row.concept_id.as_str())
            .map(|record| record.display_name())
            .unwrap_or_else(|| row.concept_id.as_str());
        let marker = match (row.has_children, row.children_shown) {
            (false, _) => " ",
            (true, true) => "-",
            (true, false) => "+",
        };
        let occurrence = match row.node_occurrence {
            Some(n) if n > 0 => format!(" (occurrence {})", n + 1),
            _ => String::new(),
        };
        println!(
            "{}{} {} [{}] drc:{} descendants:{}{}",
            "  ".repeat(row.depth),
            marker,
            name,
            row.concept_id,
            row.drc,
            row.descendant_count,
            occurrence
        );
    }
    println!(
        "{} of {} rows shown, {} hidden",
        output.rows.len(),
        output.total_rows,
        output.hidden_rows
    );
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
