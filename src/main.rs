use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use climate_catalog::{
    AttrValue, Catalog, CatalogConfig, DatasetRecord, Descriptor, Executor, Index, Selection,
    Series, WorkerPool,
};
use serde_json::{Value as JsonValue, json};

#[derive(Parser)]
#[command(name = "climate-catalog", about = "Index and query climate model output", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (otherwise RUST_LOG, defaulting to warnings)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load (or build) the index of a directory and print it
    Index {
        dir: PathBuf,

        /// Ignore any cached index
        #[arg(long)]
        force: bool,

        /// Store the index as the directory's cache afterwards
        #[arg(long)]
        write: bool,

        /// Extract attributes with this many worker threads
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read variables from the files matching a descriptor
    Select {
        dir: PathBuf,

        /// Exact-match filter, repeatable (e.g. --where variable_id=pr)
        #[arg(long = "where", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Variable to read, repeatable
        #[arg(long = "var", required = true)]
        variables: Vec<String>,

        /// Keep files as separate series instead of merging along time
        #[arg(long)]
        separate: bool,
    },

    /// Delete the cached index of a directory
    ClearCache { dir: PathBuf },
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn parse_descriptor(filters: &[String]) -> Result<Descriptor> {
    let mut desc = Descriptor::new();
    for f in filters {
        let Some((key, value)) = f.split_once('=') else {
            bail!("filter '{f}' is not of the form KEY=VALUE");
        };
        desc.insert(key.trim().to_string(), AttrValue::infer(value.trim()));
    }
    Ok(desc)
}

/// Attribute as a plain JSON value, without the enum tag used in the cache.
fn attr_json(value: &AttrValue) -> JsonValue {
    match value {
        AttrValue::String(s) => json!(s),
        AttrValue::Integer(i) => json!(i),
        AttrValue::Float(f) => json!(f),
        AttrValue::Bool(b) => json!(b),
        AttrValue::List(items) => items.iter().map(attr_json).collect(),
    }
}

fn record_json(record: &DatasetRecord) -> JsonValue {
    let attributes: serde_json::Map<String, JsonValue> = record
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), attr_json(v)))
        .collect();
    json!({
        "filename": record.filename,
        "source": record.source,
        "start_year": record.start_year,
        "end_year": record.end_year,
        "variable_id": record.variable_id,
        "attributes": attributes,
    })
}

fn print_index(index: &Index, json: bool) -> Result<()> {
    if json {
        let records: Vec<JsonValue> = index.iter().map(record_json).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    for r in index {
        let period = match (r.start_year, r.end_year) {
            (Some(s), Some(e)) => format!("{s}-{e}"),
            _ => "-".to_string(),
        };
        println!(
            "{}\t{}\t{}\t{}",
            r.filename.display(),
            r.source,
            r.variable_id.as_deref().unwrap_or("-"),
            period
        );
    }
    Ok(())
}

fn describe_series(s: &Series) -> String {
    let vars: Vec<String> = s
        .variables
        .iter()
        .map(|(name, v)| format!("{name}{:?}", v.shape))
        .collect();
    format!("{} steps, {}", s.time.len(), vars.join(" "))
}

fn run(cli: Cli) -> Result<()> {
    let catalog = Catalog::default().with_config(CatalogConfig::from_env());

    match cli.command {
        Command::Index {
            dir,
            force,
            write,
            jobs,
            json,
        } => {
            let pool = jobs.map(WorkerPool::new).transpose()?;
            let executor = pool.as_ref().map(|p| p as &dyn Executor);
            let outcome = catalog
                .load_or_build(&dir, executor, force)
                .with_context(|| format!("indexing {}", dir.display()))?;
            if write {
                catalog.write_cache(&dir, &outcome.value)?;
            }
            print_index(&outcome.value, json)?;
            if !outcome.is_clean() {
                eprintln!("{} file(s) skipped", outcome.warnings.len());
            }
        }
        Command::Select {
            dir,
            filters,
            variables,
            separate,
        } => {
            let desc = parse_descriptor(&filters)?;
            let vars: Vec<&str> = variables.iter().map(String::as_str).collect();
            let outcome = catalog.select(&dir, &desc, &vars, !separate, None)?;
            match &outcome.value {
                Selection::Merged(m) => {
                    println!("{} file(s), {} steps along '{}'", m.n(), m.time.len(), m.dimension);
                    for (name, v) in &m.variables {
                        println!("  {name} dims={:?} shape={:?}", v.dims, v.shape);
                    }
                }
                Selection::Separate(series) => {
                    for s in series {
                        let name = s.filename.as_deref().unwrap_or_else(|| dir.as_path());
                        println!("{}: {}", name.display(), describe_series(s));
                    }
                }
            }
            if !outcome.is_clean() {
                eprintln!("{} file(s) skipped", outcome.warnings.len());
            }
        }
        Command::ClearCache { dir } => {
            if catalog.clear_cache(&dir)? {
                println!("removed {}", catalog.cache_path(&dir).display());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
