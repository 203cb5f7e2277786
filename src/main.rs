use atlas_lineage::catalog::{Attributes, InMemoryCatalog};
use atlas_lineage::config::LineageConfig;
use atlas_lineage::lineage::{
    AggregateInterval, ColumnDescriptor, Granularity, LineageAssembler, LineageKey, Snapshot,
    detect_changes,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use tracing_subscriber::EnvFilter;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "atlas-lineage")]
#[command(about = "Metadata catalog lineage tools", long_about = None)]
struct Cli {
    /// Optional config.json (namespace, key prefix length, head strictness).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a lineage key into year and month.
    Key {
        #[arg(long)]
        key: String,

        /// Acronym width; falls back to the config, then to the leading letters.
        #[arg(long)]
        prefix_len: Option<usize>,
    },

    /// Detect column changes in a {key: [columns]} file.
    Changes {
        #[arg(long)]
        snapshots: String,
    },

    /// Resolve the current head of an entity's lineage.
    Head {
        #[arg(long)]
        catalog: String,

        #[arg(long)]
        guid: String,
    },

    /// Build monthly snapshots, timeline and change processes for a table.
    Monthly {
        #[arg(long)]
        catalog: String,

        #[arg(long)]
        table: String,

        #[arg(long)]
        snapshots: String,
    },

    /// Build an interval aggregate for an ETL batch.
    Aggregate {
        #[arg(long)]
        catalog: String,

        #[arg(long)]
        table: String,

        /// {"start_year", "end_year", "start_month"?, "end_month"?}
        #[arg(long)]
        interval: String,

        /// Process attributes; must contain "id_process".
        #[arg(long)]
        process: String,

        #[arg(long)]
        annual: bool,
    },

    /// Register columns of a table from a JSON list of column descriptors.
    Columns {
        #[arg(long)]
        catalog: String,

        #[arg(long)]
        table: String,

        #[arg(long)]
        columns: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LineageConfig::from_file(path)?,
        None => LineageConfig::default(),
    };

    match cli.cmd {
        Commands::Key { key, prefix_len } => {
            let parsed = match prefix_len.or(config.key_prefix_len) {
                Some(n) => LineageKey::parse(&key, n)?,
                None => key.parse::<LineageKey>()?,
            };
            print_json(&serde_json::json!({
                "key": parsed.raw,
                "acronym": parsed.acronym,
                "year": parsed.year(),
                "month": parsed.month,
            }))?;
        }
        Commands::Changes { snapshots } => {
            let data: BTreeMap<String, Vec<String>> = read_json(&snapshots)?;
            print_json(&detect_changes(&Snapshot::from_map(&data)))?;
        }
        Commands::Head { catalog, guid } => {
            let assembler = LineageAssembler::new(load_catalog(&catalog)?, config);
            print_json(&assembler.resolve_current_lineage_head(&guid)?)?;
        }
        Commands::Monthly {
            catalog,
            table,
            snapshots,
        } => {
            let data: BTreeMap<String, Vec<String>> = read_json(&snapshots)?;
            let mut assembler = LineageAssembler::new(load_catalog(&catalog)?, config);
            let out = assembler.build_monthly_lineage(&table, &data)?;
            save_catalog(&catalog, assembler.catalog())?;
            print_json(&out)?;
        }
        Commands::Aggregate {
            catalog,
            table,
            interval,
            process,
            annual,
        } => {
            let interval: AggregateInterval = read_json(&interval)?;
            let process: Attributes = read_json(&process)?;
            let granularity = if annual {
                Granularity::Annual
            } else {
                Granularity::Monthly
            };
            let mut assembler = LineageAssembler::new(load_catalog(&catalog)?, config);
            let out =
                assembler.build_interval_aggregate(&interval, &table, &process, granularity)?;
            save_catalog(&catalog, assembler.catalog())?;
            print_json(&out)?;
        }
        Commands::Columns {
            catalog,
            table,
            columns,
        } => {
            let columns: Vec<ColumnDescriptor> = read_json(&columns)?;
            let mut assembler = LineageAssembler::new(load_catalog(&catalog)?, config);
            let out = assembler.register_columns(&table, &columns)?;
            save_catalog(&catalog, assembler.catalog())?;
            print_json(&out)?;
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path))
}

fn load_catalog(path: &str) -> Result<InMemoryCatalog> {
    read_json(path).with_context(|| format!("load catalog {}", path))
}

fn save_catalog(path: &str, catalog: &InMemoryCatalog) -> Result<()> {
    let text = serde_json::to_string_pretty(catalog)?;
    fs::write(path, text).with_context(|| format!("write catalog {}", path))?;
    tracing::info!(path, entities = catalog.len(), "saved catalog");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
