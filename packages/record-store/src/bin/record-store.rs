//! Record Store CLI
//!
//! Imports address book data files into an in-memory store and queries it.
//!
//! # Usage
//!
//! ```bash
//! # Import and print a summary
//! cargo run --bin record-store -- load --config store.yaml --file data/addressbook.txt
//!
//! # Import, then print one index bucket
//! cargo run --bin record-store -- view --file data/addressbook.txt --index byGender --value Male
//!
//! # Answer the address book questions
//! cargo run --bin record-store -- questions --config store.yaml --number 3
//!
//! # Keep re-importing while the files change
//! cargo run --bin record-store -- watch --config store.yaml
//! ```

use clap::{Args, Parser, Subcommand};
use record_store::ingest::LoaderHandle;
use record_store::{
    questions, AddressBookParser, DataFileLoader, DataFileWatcher, ImportReconciler, IngestEvent,
    IngestReport, IngestWriter, Question, StoreConfig, View,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "record-store")]
#[command(about = "In-memory record store with mark-and-sweep imports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ImportArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data file to import (repeatable, added to the configured ones)
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import all data files and print a summary
    Load {
        #[command(flatten)]
        import: ImportArgs,
    },

    /// Import, then print an index view
    View {
        #[command(flatten)]
        import: ImportArgs,

        /// Index name
        #[arg(short, long)]
        index: String,

        /// Bucket key; omit to list the keys
        #[arg(short, long)]
        value: Option<String>,
    },

    /// Import, then answer the address book questions
    Questions {
        #[command(flatten)]
        import: ImportArgs,

        /// Answer only this question (1-3)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
        number: Option<u8>,
    },

    /// Import, then re-import data files whenever they change
    Watch {
        #[command(flatten)]
        import: ImportArgs,
    },
}

#[derive(Serialize)]
struct LoadSummary {
    revision: u64,
    entry_count: usize,
    #[serde(flatten)]
    report: IngestReport,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Load { import } => {
            let config = load_config(&import)?;
            if config.watch.enabled {
                info!("watch enabled in configuration, watching after the import");
                return run_watch(&config);
            }
            let (writer, report) = run_import(&config)?;
            let store = writer.reconciler().store().read();
            let summary = LoadSummary {
                revision: store.revision(),
                entry_count: store.entry_count(),
                report,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::View {
            import,
            index,
            value,
        } => {
            let config = load_config(&import)?;
            let (writer, _) = run_import(&config)?;
            let store = writer.reconciler().store().read();
            let json = match store.view(&index, value.as_deref())? {
                View::Keys(keys) => serde_json::to_string_pretty(&keys)?,
                View::Records(records) => serde_json::to_string_pretty(&records)?,
            };
            println!("{}", json);
        }
        Commands::Questions { import, number } => {
            let config = load_config(&import)?;
            let (writer, _) = run_import(&config)?;
            let store = writer.reconciler().store().read();
            let answers = match number.and_then(|n| Question::from_number(n as usize)) {
                Some(question) => vec![questions::answer(&store, question)?],
                None => questions::answer_all(&store)?,
            };
            println!("{}", serde_json::to_string_pretty(&answers)?);
        }
        Commands::Watch { import } => {
            let config = load_config(&import)?;
            run_watch(&config)?;
        }
    }

    Ok(())
}

/// Read configuration, apply environment and command line, install logging
fn load_config(import: &ImportArgs) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let mut config = match &import.config {
        Some(path) => StoreConfig::from_yaml(path)?,
        None => StoreConfig::default(),
    };
    config.apply_env()?;
    for file in &import.files {
        if !config.data_files.contains(file) {
            config.data_files.push(file.clone());
        }
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(config)
}

fn start_loader(
    config: &StoreConfig,
) -> Result<(DataFileLoader, LoaderHandle, Receiver<IngestEvent>), Box<dyn std::error::Error>> {
    let mut loader = DataFileLoader::new();
    for path in &config.data_files {
        loader.add_data_file(path)?;
    }

    let (handle, events) = DataFileLoader::spawn(Arc::new(AddressBookParser::new()));
    loader.load(&handle)?;
    Ok((loader, handle, events))
}

/// Import every data file once and wait for the worker to finish
fn run_import(
    config: &StoreConfig,
) -> Result<(IngestWriter, IngestReport), Box<dyn std::error::Error>> {
    let (_loader, mut handle, events) = start_loader(config)?;
    handle.close();

    let mut writer = IngestWriter::new(ImportReconciler::new(config.build_store().shared()));
    let report = writer.drain(&events)?;
    handle.join()?;

    for source in &report.unfinished {
        warn!("{} was not fully imported", source);
    }
    Ok((writer, report))
}

fn run_watch(config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (loader, handle, events) = start_loader(config)?;

    let requester = handle
        .requester()
        .ok_or("loader closed before the watcher started")?;
    let mut watcher = DataFileWatcher::new(config.watch_config(loader.files().to_vec()), requester)?;
    watcher.start()?;

    let mut writer = IngestWriter::new(ImportReconciler::new(config.build_store().shared()));
    for event in &events {
        if let Some(summary) = writer.apply(event)? {
            let store = writer.reconciler().store().read();
            info!(
                "{} pass {}: +{} ={} -{} (revision {}, {} entries)",
                summary.source,
                summary.pass,
                summary.inserted,
                summary.reconfirmed,
                summary.removed.len(),
                store.revision(),
                store.entry_count()
            );
        }
    }

    watcher.stop()?;
    handle.join()?;
    Ok(())
}
