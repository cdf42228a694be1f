//! Inspection CLI over kingraph_core.
//!
//! Every command loads records into a record store (a SQLite file via
//! `--db`, or an in-memory store seeded from `--records`), runs one core
//! operation and prints JSON to stdout.

use clap::{Args, Parser, Subcommand, ValueEnum};
use kingraph_core::db::{open_db, open_db_in_memory};
use kingraph_core::{
    anonymize, init_logging, AnonymizeOptions, FamilyService, LayoutDirection, LayoutParams,
    LayoutStrategy, PersonId, PersonRecord, SqlitePersonRepository, TreeDirection, TreeOptions,
};
use log::info;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "kingraph")]
#[command(about = "Family relationship graph inspection", version)]
struct Cli {
    /// Absolute directory for rolling log files; logging is off without it.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level used with --log-dir.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List family components, largest first
    Components {
        #[command(flatten)]
        source: Source,
    },

    /// Derive a bounded tree around one person
    Tree {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        tree: TreeArgs,
    },

    /// Derive a tree and compute its layout
    Layout {
        #[command(flatten)]
        source: Source,
        #[command(flatten)]
        tree: TreeArgs,
        /// JSON file with layout parameters
        #[arg(long)]
        params: Option<PathBuf>,
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        #[arg(long, value_enum)]
        layout_direction: Option<LayoutDirectionArg>,
    },

    /// Write records into a SQLite store and reconcile reciprocal links
    Import {
        /// JSON array of person records
        #[arg(long)]
        records: PathBuf,
        /// SQLite store to create or extend
        #[arg(long)]
        db: PathBuf,
    },

    /// Print an anonymized copy of a record file
    Anonymize {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        keep_dates: bool,
        #[arg(long)]
        keep_places: bool,
    },
}

#[derive(Args)]
struct Source {
    /// JSON array of person records
    #[arg(long, conflicts_with = "db", required_unless_present = "db")]
    records: Option<PathBuf>,
    /// Existing SQLite store
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Args)]
struct TreeArgs {
    /// Root person id
    #[arg(long)]
    root: String,
    /// JSON file with tree options; flags below override it
    #[arg(long)]
    options: Option<PathBuf>,
    #[arg(long, value_enum)]
    direction: Option<DirectionArg>,
    /// Generation limit, 0 for unlimited
    #[arg(long)]
    generations: Option<u32>,
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Ancestors,
    Descendants,
    Full,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Standard,
    Compact,
    Timeline,
    Hourglass,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutDirectionArg {
    TopDown,
    LeftRight,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let Some(dir) = &cli.log_dir {
        init_logging(&cli.log_level, &dir.to_string_lossy())?;
    }

    match cli.command {
        Command::Components { source } => {
            let conn = connect(&source)?;
            let mut service = service_for(&conn, &source)?;
            print_json(&service.components()?)
        }
        Command::Tree { source, tree } => {
            let conn = connect(&source)?;
            let mut service = service_for(&conn, &source)?;
            let options = tree_options(&tree)?;
            print_json(&service.derive_tree(&PersonId::new(tree.root.as_str()), &options)?)
        }
        Command::Layout {
            source,
            tree,
            params,
            strategy,
            layout_direction,
        } => {
            let conn = connect(&source)?;
            let mut service = service_for(&conn, &source)?;
            let options = tree_options(&tree)?;
            let mut params: LayoutParams = match params {
                Some(path) => read_json(&path)?,
                None => LayoutParams::default(),
            };
            if let Some(strategy) = strategy {
                params.strategy = match strategy {
                    StrategyArg::Standard => LayoutStrategy::Standard,
                    StrategyArg::Compact => LayoutStrategy::Compact,
                    StrategyArg::Timeline => LayoutStrategy::Timeline,
                    StrategyArg::Hourglass => LayoutStrategy::Hourglass,
                };
            }
            if let Some(direction) = layout_direction {
                params.direction = match direction {
                    LayoutDirectionArg::TopDown => LayoutDirection::TopDown,
                    LayoutDirectionArg::LeftRight => LayoutDirection::LeftRight,
                };
            }
            print_json(&service.layout_tree(&PersonId::new(tree.root.as_str()), &options, &params)?)
        }
        Command::Import { records, db } => {
            let records = read_records(&records)?;
            let conn = open_db(&db)?;
            let mut service = FamilyService::new(SqlitePersonRepository::try_new(&conn)?);
            let report = service.bulk_import(&records)?;
            info!(
                "event=cli_import module=cli status=ok written={} reconciled={}",
                report.written,
                report.reconciled.len()
            );
            print_json(&report)
        }
        Command::Anonymize {
            records,
            keep_dates,
            keep_places,
        } => {
            let records: Vec<PersonRecord> = read_json(&records)?;
            let options = AnonymizeOptions {
                keep_dates,
                keep_places,
            };
            print_json(&anonymize(&records, options))
        }
    }
}

fn connect(source: &Source) -> CliResult<Connection> {
    let conn = match &source.db {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    Ok(conn)
}

/// Service over `conn`, seeded from `--records` when given.
fn service_for<'conn>(
    conn: &'conn Connection,
    source: &Source,
) -> CliResult<FamilyService<SqlitePersonRepository<'conn>>> {
    let mut service = FamilyService::new(SqlitePersonRepository::try_new(conn)?);
    if let Some(path) = &source.records {
        let records = read_records(path)?;
        service.bulk_import(&records)?;
    }
    Ok(service)
}

fn tree_options(args: &TreeArgs) -> CliResult<TreeOptions> {
    let mut options: TreeOptions = match &args.options {
        Some(path) => read_json(path)?,
        None => TreeOptions::default(),
    };
    if let Some(direction) = args.direction {
        options.direction = match direction {
            DirectionArg::Ancestors => TreeDirection::Ancestors,
            DirectionArg::Descendants => TreeDirection::Descendants,
            DirectionArg::Full => TreeDirection::Full,
        };
    }
    if let Some(limit) = args.generations {
        options.generation_limit = limit;
    }
    if let Some(collection) = &args.collection {
        options.collection_filter = Some(collection.clone());
    }
    Ok(options)
}

/// Record file contents; records without an id get a fresh one.
fn read_records(path: &Path) -> CliResult<Vec<PersonRecord>> {
    let mut records: Vec<PersonRecord> = read_json(path)?;
    let assigned = assign_missing_ids(&mut records);
    if assigned > 0 {
        info!("event=assign_ids module=cli status=ok assigned={assigned}");
    }
    Ok(records)
}

fn assign_missing_ids(records: &mut [PersonRecord]) -> usize {
    let mut assigned = 0;
    for record in records.iter_mut().filter(|record| record.id.as_str().trim().is_empty()) {
        record.id = PersonId::generate();
        assigned += 1;
    }
    assigned
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let file = File::open(path)
        .map_err(|err| format!("cannot open `{}`: {err}", path.display()))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
