//! conftree - typed configuration tree CLI tool
//!
//! Loads YAML/JSON documents into a config typed by a schema document,
//! then validates, merges, queries or dumps them.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use conftree::schema::Schema;
use conftree::value;
use conftree::Config;

/// conftree - typed configuration tree CLI tool
#[derive(Debug, Parser)]
#[command(name = "conftree", version)]
struct Cli {
    /// Path to the schema file
    #[arg(short, long)]
    schema: PathBuf,

    /// Name of the type in the schema to use (default: first type)
    #[arg(short, long)]
    type_name: Option<String>,

    /// Output location. Use '-' for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all types in the schema
    ListTypes,
    /// Validate a YAML/JSON file against the schema
    Validate { file: PathBuf },
    /// Merge files in order over the type's defaults
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the resolved value at a path
    Get { file: PathBuf, path: String },
    /// Print the whole config
    Dump {
        file: PathBuf,
        /// Resolve interpolations before printing
        #[arg(long)]
        resolve: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CONFTREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn run(cli: Cli) -> Result<()> {
    let schema_content = fs::read_to_string(&cli.schema)
        .with_context(|| format!("failed to read schema file {:?}", cli.schema))?;
    let schema = Schema::from_yaml(&schema_content)?;

    let type_name = match cli.type_name {
        Some(name) => name,
        None => match schema.type_names().first() {
            Some(name) => name.to_string(),
            None => bail!("no types found in schema"),
        },
    };

    let mut output: Box<dyn Write> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        Box::new(
            fs::File::create(&cli.output)
                .with_context(|| format!("failed to create output file {:?}", cli.output))?,
        )
    };

    match cli.command {
        Command::ListTypes => {
            for name in schema.type_names() {
                writeln!(output, "{}", name)?;
            }
        }
        Command::Validate { file } => {
            let cfg = load(&schema, &type_name, &[file])?;
            cfg.to_object().context("validation failed")?;
            writeln!(output, "Validation successful")?;
        }
        Command::Merge { files } => {
            let cfg = load(&schema, &type_name, &files)?;
            write!(output, "{}", cfg.to_yaml()?)?;
        }
        Command::Get { file, path } => {
            let cfg = load(&schema, &type_name, &[file])?;
            let resolved = cfg.get(&path)?;
            write!(output, "{}", value::to_yaml(&resolved)?)?;
        }
        Command::Dump { file, resolve } => {
            let cfg = load(&schema, &type_name, &[file])?;
            let container = cfg.to_container(resolve)?;
            write!(output, "{}", value::to_yaml(&container)?)?;
        }
    }
    Ok(())
}

/// Builds the named type and merges each file over it in order.
fn load(schema: &Schema, type_name: &str, files: &[PathBuf]) -> Result<Config> {
    let mut cfg = Config::from_schema(schema, type_name)?;
    for file in files {
        let document = read_document(file)?;
        cfg.merge_with(&document)
            .with_context(|| format!("failed to merge {:?}", file))?;
    }
    Ok(cfg)
}

fn read_document(file: &Path) -> Result<value::Value> {
    let content = fs::read_to_string(file).with_context(|| format!("failed to read file {:?}", file))?;
    let is_json = file.extension().is_some_and(|ext| ext == "json");
    let document = if is_json {
        value::from_json(&content)?
    } else {
        value::from_yaml(&content)?
    };
    Ok(document)
}
