mod config;

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use squril_core::Query;
use squril_sql::{Backend, SqlGenerator, Statement};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{BackendKind, CliConfig, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "squril", version)]
#[command(about = "Compile structured query URIs to SQL for JSON document tables")]
struct Cli {
    /// YAML file with default backend, table and format.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log parsing and lowering details to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a query string into select, update and delete statements.
    Compile(CompileArgs),
    /// Parse a query string and print its term model.
    Parse(ParseArgs),
    /// Print a backend's one-time initialization statements.
    InitSql(InitSqlArgs),
}

#[derive(Debug, Args)]
struct CompileArgs {
    /// Target dialect (default: sqlite).
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
    /// Table holding the JSON documents.
    #[arg(long)]
    table: Option<String>,
    /// Query string, e.g. `select=name&where=age=gt.30`.
    #[arg(long)]
    query: String,
    /// Update payload as inline JSON.
    #[arg(long, conflicts_with = "data_file")]
    data: Option<String>,
    /// Update payload read from a JSON file.
    #[arg(long)]
    data_file: Option<PathBuf>,
    /// Output format (default: json).
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Query string to parse.
    #[arg(long)]
    query: String,
    /// Output format (default: json).
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Debug, Args)]
struct InitSqlArgs {
    /// Target dialect (default: sqlite).
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Command::Compile(args) => run_compile(args, &config),
        Command::Parse(args) => run_parse(args, &config),
        Command::InitSql(args) => run_init_sql(args, &config),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("squril=debug,squril_core=debug,squril_sql=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<CliConfig, String> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let config = CliConfig::load(path)?;
    debug!(path = %path.display(), ?config, "Loaded config");
    Ok(config)
}

fn run_compile(args: CompileArgs, config: &CliConfig) -> Result<(), String> {
    let kind = args.backend.or(config.backend).unwrap_or(BackendKind::Sqlite);
    let format = args.format.or(config.format).unwrap_or(OutputFormat::Json);
    let table = args
        .table
        .or_else(|| config.table.clone())
        .ok_or_else(|| "Specify --table or set `table` in the config file".to_string())?;
    let payload = read_payload(args.data, args.data_file)?;

    let backend = kind.backend();
    let compiled = SqlGenerator::new(backend, &table, &args.query, payload.as_ref())
        .map_err(|err| err.to_string())?;

    #[derive(Serialize)]
    struct CompileOutput<'a> {
        backend: &'a str,
        table: &'a str,
        select: &'a Statement,
        #[serde(skip_serializing_if = "Option::is_none")]
        update: Option<&'a Statement>,
        delete: &'a Statement,
    }

    let output = CompileOutput {
        backend: backend.name(),
        table: compiled.table(),
        select: compiled.select(),
        update: compiled.update(),
        delete: compiled.delete(),
    };

    match format {
        OutputFormat::Text => {
            print_statement(backend, "select", output.select);
            if let Some(update) = output.update {
                print_statement(backend, "update", update);
            }
            print_statement(backend, "delete", output.delete);
            Ok(())
        }
        structured => print_structured(&output, structured),
    }
}

fn run_parse(args: ParseArgs, config: &CliConfig) -> Result<(), String> {
    let format = args.format.or(config.format).unwrap_or(OutputFormat::Json);
    let query = Query::parse(&args.query).map_err(|err| err.to_string())?;
    match format {
        OutputFormat::Text => {
            println!("{query:#?}");
            Ok(())
        }
        structured => print_structured(&query, structured),
    }
}

fn run_init_sql(args: InitSqlArgs, config: &CliConfig) -> Result<(), String> {
    let kind = args.backend.or(config.backend).unwrap_or(BackendKind::Sqlite);
    let statements = kind.backend().init_sql();
    if statements.is_empty() {
        eprintln!("{} needs no initialization", kind.backend().name());
    }
    for statement in statements {
        println!("{statement}\n");
    }
    Ok(())
}

fn read_payload(data: Option<String>, data_file: Option<PathBuf>) -> Result<Option<Value>, String> {
    let text = match (data, data_file) {
        (Some(data), _) => data,
        (None, Some(path)) => fs::read_to_string(&path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?,
        (None, None) => return Ok(None),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| format!("Invalid JSON payload: {err}"))
}

fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), String> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| format!("Failed to serialize output: {e}"))?,
        _ => serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize output: {e}"))?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn print_statement(backend: &dyn Backend, label: &str, statement: &Statement) {
    println!("-- {label}");
    println!("{};", statement.sql);
    for (i, param) in statement.params.iter().enumerate() {
        println!("--   {} = {}", backend.placeholder(i + 1), param.to_sql_text());
    }
}
