//! jsonsql CLI
//!
//! Query JSON files with SQL from the terminal:
//! - Inspecting the inferred schema of a JSON document
//! - Emitting editor completion items (native or Monaco shape)
//! - Validating and running queries, rendered as tables or JSON
//! - An interactive explorer shell

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use jsonsql_core::{flatten_array, generate_completion_items, infer_schema_with, normalize_data};
use jsonsql_query::{validate_query, Explorer, ExplorerConfig, QueryValidation};
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod render;
mod repl;

#[derive(Parser)]
#[command(name = "jsonsql")]
#[command(author, version, about = "jsonsql: query JSON data with SQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the inferred schema (column, type, nullability).
    Schema {
        #[command(flatten)]
        data: DataArgs,
        /// Emit the schema as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print editor completion items for the inferred schema.
    Complete {
        #[command(flatten)]
        data: DataArgs,
        /// Emit Monaco-shaped items (numeric `kind`, `insertText`)
        #[arg(long)]
        monaco: bool,
    },

    /// Check a query against the mutating-keyword denylist.
    Validate {
        /// SQL text
        sql: String,
    },

    /// Validate and run a query against a JSON document.
    Query {
        #[command(flatten)]
        data: DataArgs,
        /// SQL text
        sql: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Interactive shell over a JSON document.
    Repl {
        #[command(flatten)]
        data: DataArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Input JSON file (`-` for stdin)
    input: PathBuf,
    /// JSON config file (tableName, maxRows, flatten, initialQuery, sampleSize, detectDates)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Table name the data is bound to
    #[arg(long)]
    table: Option<String>,
    /// Flatten nested objects into dot-path columns
    #[arg(long)]
    flatten: bool,
    /// Maximum rows returned per query (0 = unlimited)
    #[arg(long)]
    max_rows: Option<usize>,
    /// Rows sampled for schema inference
    #[arg(long)]
    sample_size: Option<usize>,
    /// Treat RFC 3339 / YYYY-MM-DD strings as DATE during inference
    #[arg(long)]
    detect_dates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl DataArgs {
    /// Defaults, then the config file, then explicit flags.
    fn config(&self) -> Result<ExplorerConfig> {
        let mut config = match &self.config {
            Some(path) => ExplorerConfig::from_json_file(path)?,
            None => ExplorerConfig::default(),
        };
        if let Some(table) = &self.table {
            config.table_name = table.clone();
        }
        if self.flatten {
            config.flatten = true;
        }
        if let Some(max_rows) = self.max_rows {
            config.max_rows = max_rows;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if self.detect_dates {
            config.detect_dates = true;
        }
        config.validate()?;
        Ok(config)
    }

    fn load(&self) -> Result<(Value, ExplorerConfig)> {
        let config = self.config()?;
        let data = read_json(&self.input)?;
        Ok((data, config))
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?
    };
    tracing::debug!(path = %path.display(), bytes = text.len(), "read input");
    serde_json::from_str(&text).map_err(|e| anyhow!("Invalid JSON in {}: {e}", path.display()))
}

/// Normalized and optionally flattened rows, the way the explorer prepares them.
fn prepare_rows(data: Value, config: &ExplorerConfig) -> Vec<Value> {
    let rows = normalize_data(data);
    if config.flatten {
        flatten_array(&rows)
    } else {
        rows
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Schema { data, json } => {
            let (value, config) = data.load()?;
            let rows = prepare_rows(value, &config);
            let schema = infer_schema_with(&rows, &config.table_name, &config.infer_options());
            if json {
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                print!("{}", render::render_schema(&schema, rows.len()));
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Complete { data, monaco } => {
            let (value, config) = data.load()?;
            let rows = prepare_rows(value, &config);
            let schema = infer_schema_with(&rows, &config.table_name, &config.infer_options());
            let items = generate_completion_items(&schema);
            let out = if monaco {
                Value::Array(items.iter().map(|i| i.to_monaco()).collect())
            } else {
                serde_json::to_value(&items)?
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { sql } => {
            let verdict = QueryValidation::check(&sql);
            match &verdict.error {
                None => println!("{}", "valid".green().bold()),
                Some(reason) => println!("{} {reason}", "invalid:".red().bold()),
            }
            Ok(if verdict.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::Query { data, sql, format } => {
            // Fail fast before reading the input.
            validate_query(&sql)?;

            let (value, config) = data.load()?;
            let mut explorer = Explorer::new(value, config)?;
            let result = explorer.run_query(sql)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
                OutputFormat::Table => {
                    print!("{}", render::render_result(result));
                    eprintln!("{}", render::render_timing(result).dimmed());
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Repl { data } => {
            let (value, config) = data.load()?;
            let explorer = Explorer::new(value, config)?;
            repl::cmd_repl(explorer)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
