//! Siphon CLI - run tabular ETL pipelines against SQL backends
//!
//! # Main Commands
//!
//! ```bash
//! siphon run pipeline.json         # Load, transform, store
//! siphon load Sales                # Dump a table as JSON records
//! siphon store Sales data.json     # Write JSON records to a table (replace)
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! siphon query "SELECT * FROM Sales WHERE Amount > 500"
//! siphon exec "DELETE FROM Sales WHERE Amount < 50"
//! siphon transforms                # Show available transforms
//! siphon example-pipeline          # Show an example pipeline JSON
//! ```
//!
//! The connection comes from a JSON descriptor (`--connection`) or from
//! `SIPHON_*` environment variables; a `.env` file is honored.

use clap::{Parser, Subcommand};
use siphon::{
    example_pipeline, run, transforms_description, Backend as _, ConnectionConfig, Dataset,
    Pipeline,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "siphon")]
#[command(about = "Load SQL tables, transform in memory, write back", long_about = None)]
struct Cli {
    /// Connection descriptor JSON file (default: SIPHON_* environment)
    #[arg(short, long, global = true)]
    connection: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline: load source, apply transforms, store destination
    Run {
        /// Pipeline JSON file
        pipeline: PathBuf,

        /// Output file for result records (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the store step
        #[arg(long)]
        dry_run: bool,
    },

    /// Dump all rows of a table as JSON records
    Load {
        /// Table name
        table: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write JSON records to a table, replacing it if it exists
    Store {
        /// Table name
        table: String,

        /// Input JSON file (array of records)
        input: PathBuf,
    },

    /// Run a query and print the rows as JSON records
    Query {
        /// SQL text
        sql: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Execute a statement and print the number of rows affected
    Exec {
        /// SQL text
        sql: String,
    },

    /// Show available transforms
    Transforms,

    /// Show an example pipeline
    ExamplePipeline,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            pipeline,
            output,
            dry_run,
        } => cmd_run(cli.connection.as_deref(), &pipeline, output.as_deref(), dry_run),

        Commands::Load { table, output } => {
            cmd_load(cli.connection.as_deref(), &table, output.as_deref())
        }

        Commands::Store { table, input } => {
            cmd_store(cli.connection.as_deref(), &table, &input)
        }

        Commands::Query { sql, output } => {
            cmd_query(cli.connection.as_deref(), &sql, output.as_deref())
        }

        Commands::Exec { sql } => cmd_exec(cli.connection.as_deref(), &sql),

        Commands::Transforms => cmd_transforms(),

        Commands::ExamplePipeline => cmd_example_pipeline(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Resolve the connection descriptor: file first, environment otherwise.
fn connection_config(path: Option<&Path>) -> Result<ConnectionConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(ConnectionConfig::from_env()?),
    }
}

fn cmd_run(
    connection: Option<&Path>,
    pipeline_path: &Path,
    output: Option<&Path>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Pipeline: {}", pipeline_path.display());

    let content = fs::read_to_string(pipeline_path)?;
    let mut pipeline = Pipeline::from_json(&content)?;
    if !pipeline.description.is_empty() {
        eprintln!("   {}", pipeline.description);
    }
    if dry_run {
        pipeline.destination_table = None;
    }

    let config = connection_config(connection)?;
    let result = run(&config, &pipeline)?;

    eprintln!("\n⚙️  {} rows in, {} rows out", result.rows_loaded, result.dataset.len());
    if result.rows_stored > 0 {
        if let Some(ref destination) = pipeline.destination_table {
            eprintln!("   💾 Replaced table: {}", destination);
        }
    }
    eprintln!("   Took {} ms", result.duration_ms);

    let json = serde_json::to_string_pretty(&result.dataset.to_records())?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_load(
    connection: Option<&Path>,
    table: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📖 Loading table: {}", table);

    let config = connection_config(connection)?;
    let mut backend = config.connect()?;
    let dataset = backend.load_table(table)?;
    eprintln!("✅ {} rows, {} columns", dataset.len(), dataset.columns().len());

    let json = serde_json::to_string_pretty(&dataset.to_records())?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_store(
    connection: Option<&Path>,
    table: &str,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📥 Storing into table: {}", table);

    let content = fs::read_to_string(input)?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    let dataset = Dataset::from_records(&records)?;

    let config = connection_config(connection)?;
    let mut backend = config.connect()?;
    backend.store_table(table, &dataset)?;
    eprintln!("✅ Replaced '{}' with {} rows", table, dataset.len());
    Ok(())
}

fn cmd_query(
    connection: Option<&Path>,
    sql: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = connection_config(connection)?;
    let mut backend = config.connect()?;
    let dataset = backend.query(sql)?;
    eprintln!("✅ {} rows", dataset.len());

    let json = serde_json::to_string_pretty(&dataset.to_records())?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_exec(connection: Option<&Path>, sql: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = connection_config(connection)?;
    let mut backend = config.connect()?;
    let affected = backend.execute(sql)?;
    eprintln!("✅ {} rows affected", affected);
    Ok(())
}

fn cmd_transforms() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", transforms_description());
    Ok(())
}

fn cmd_example_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_pipeline().to_json()?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
