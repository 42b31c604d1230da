use anyhow::{bail, Result};
use atlas_graph::{GraphError, HEADER_ID, MEMBER_FIELD};
use atlas_search::NameIndex;
use clap::{Args, Parser, Subcommand};
use config::AtlasConfig;
use pipeline::{load_graph, match_records, tree_records, TermTable};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

pub mod config;
pub mod pipeline;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "atlas")]
#[command(about = "Normalize and query anatomical atlas graphs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to atlas.toml (relation catalog overrides, name substitutions)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged flat node table
    Flatten(DocumentArgs),

    /// List the header-rooted hierarchy, leaves before their containers
    Tree(TreeArgs),

    /// Print the ancestor chain of a node
    Ancestors(AncestorsArgs),

    /// Search structure and group names
    Search(SearchArgs),

    /// Match hierarchy names against a terminology table
    Match(MatchArgs),
}

#[derive(Args)]
struct DocumentArgs {
    /// Atlas JSON documents, merged in the order given
    #[arg(required = true)]
    documents: Vec<PathBuf>,
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    input: DocumentArgs,

    /// Hierarchy relation to descend
    #[arg(long, default_value = MEMBER_FIELD)]
    field: String,
}

#[derive(Args)]
struct AncestorsArgs {
    /// Identifier of the starting node
    id: String,

    #[command(flatten)]
    input: DocumentArgs,

    /// Relation to walk upwards
    #[arg(long, default_value = MEMBER_FIELD)]
    field: String,
}

#[derive(Args)]
struct SearchArgs {
    /// Search terms; all must match
    query: String,

    #[command(flatten)]
    input: DocumentArgs,

    /// Maximum number of hits
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[derive(Args)]
struct MatchArgs {
    #[command(flatten)]
    input: DocumentArgs,

    /// JSON array of {name, id, hierarchy} terminology entries
    #[arg(long)]
    terms: PathBuf,

    /// Hierarchy relation to descend
    #[arg(long, default_value = MEMBER_FIELD)]
    field: String,
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => AtlasConfig::load(path)?,
        None => AtlasConfig::default(),
    };

    match cli.command {
        Commands::Flatten(args) => {
            let graph = load_graph(&args.documents, config.catalog())?;
            emit(&graph.flat_table().to_json(), cli.pretty)
        }
        Commands::Tree(args) => {
            let graph = load_graph(&args.input.documents, config.catalog())?;
            if graph.header().is_none() {
                bail!("No {HEADER_ID} node in input");
            }
            emit(&tree_records(&graph, &args.field)?, cli.pretty)
        }
        Commands::Ancestors(args) => {
            let graph = load_graph(&args.input.documents, config.catalog())?;
            if graph.node(&args.id).is_none() {
                return Err(GraphError::NodeNotFound(args.id).into());
            }
            let ancestors = graph.ancestors(&args.id, &args.field);
            let chain: Vec<&str> = ancestors.iter().map(|node| node.id.as_str()).collect();
            emit(&chain, cli.pretty)
        }
        Commands::Search(args) => {
            let graph = load_graph(&args.input.documents, config.catalog())?;
            let mut index = NameIndex::build(&graph);
            emit(&index.search(&args.query, args.limit)?, cli.pretty)
        }
        Commands::Match(args) => {
            let graph = load_graph(&args.input.documents, config.catalog())?;
            if graph.header().is_none() {
                bail!("No {HEADER_ID} node in input");
            }
            let terms = TermTable::load(&args.terms)?;
            let records = tree_records(&graph, &args.field)?;
            let matches = match_records(&records, &config.substitutions, &terms);
            log::info!(
                "Matched {} of {} records",
                matches.iter().filter(|m| m.term_id.is_some()).count(),
                matches.len()
            );
            emit(&matches, cli.pretty)
        }
    }
}
