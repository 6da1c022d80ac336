//! Maintenance CLI for the TuneChain document store.
//!
//! # Responsibility
//! - Drive admin operations (stats, export/import, clear, dedupe) against a
//!   store directory without going through the HTTP layer.
//! - Offer read-only inspection (`get`, `search`) for debugging seeds.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tunechain_store::{
    default_log_level, init_logging, paginate, sort_by, Collection, Document, DocumentStore,
    LogConfig, Record, SortOrder, StoreConfig, StoreError,
};

#[derive(Parser)]
#[command(name = "tunechain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and maintain TuneChain collection files")]
struct Cli {
    /// Store directory (defaults to TUNECHAIN_DATA_DIR, then ./data)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Write rolling logs to this absolute directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print record counts per collection
    Stats,
    /// Print (or write) a collection as a JSON array
    Export {
        collection: Collection,
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Replace a collection with the JSON array in FILE
    Import {
        collection: Collection,
        file: PathBuf,
    },
    /// Empty one collection, or every collection with --all
    Clear(ClearArgs),
    /// Drop later records that repeat an earlier id
    Dedupe { collection: Collection },
    /// Print one record, including soft-deleted ones
    Get { collection: Collection, id: String },
    /// Case-insensitive search over named fields
    Search(SearchArgs),
}

#[derive(Args)]
struct ClearArgs {
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    collection: Option<Collection>,
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct SearchArgs {
    collection: Collection,
    text: String,
    /// Field to match; repeatable
    #[arg(short, long = "field", required = true)]
    fields: Vec<String>,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long, default_value = "asc")]
    order: SortOrder,
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    page: i64,
    #[arg(long, default_value_t = 10)]
    limit: i64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let config = LogConfig::new(level, log_dir).with_stderr_mirror(true);
        if let Err(err) = init_logging(&config) {
            eprintln!("tunechain: logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_command module=cli status=error error={}", err);
            eprintln!("tunechain: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StoreError> {
    let mut config = StoreConfig::from_env()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    let store = DocumentStore::open(config)?;

    match cli.command {
        Command::Stats => {
            for (collection, count) in store.stats()? {
                println!("{collection:<14}{count}");
            }
        }
        Command::Export { collection, out } => {
            let json = store.export(collection)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).map_err(|source| StoreError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    println!("exported {collection} to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Import { collection, file } => {
            let json = std::fs::read_to_string(&file).map_err(|source| StoreError::Io {
                path: file.clone(),
                source,
            })?;
            let imported = store.import(collection, &json)?;
            println!("imported {imported} records into {collection}");
        }
        Command::Clear(args) => match args.collection {
            Some(collection) if !args.all => {
                store.clear(collection)?;
                println!("cleared {collection}");
            }
            _ => {
                store.clear_all()?;
                println!("cleared all collections");
            }
        },
        Command::Dedupe { collection } => {
            let removed = store.remove_duplicates(collection)?;
            println!("removed {removed} duplicate records from {collection}");
        }
        Command::Get { collection, id } => match store.get::<Document>(collection, &id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("no record `{id}` in {collection}"),
        },
        Command::Search(args) => {
            let fields: Vec<&str> = args.fields.iter().map(String::as_str).collect();
            let mut hits: Vec<Record> = store.search(args.collection, &args.text, &fields)?;
            if let Some(field) = &args.sort {
                hits = sort_by(hits, field, args.order);
            }
            let page = paginate(&hits, args.page, args.limit);
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }
    Ok(())
}
