use clap::{Parser, Subcommand};
use std::path::PathBuf;
use table_bridge::catalog::{DEFAULT_CATALOG, DEFAULT_DATABASE, resolve};
use table_bridge::formats::Format;
use table_bridge::runner::{LoadArgs, inspect_batch_file, run_load};

#[derive(Parser, Clone)]
#[command(name = "table-bridge", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Infer a schema for a file, convert its rows and load them into a table
    Load {
        /// Path to the source file
        source: PathBuf,

        /// File format (csv, tsv, json, parquet) - auto-detected from extension if not specified
        #[arg(short, long)]
        format: Option<String>,

        /// Field names replacing the inferred ones (format: a,b,c)
        #[arg(short, long)]
        names: Option<String>,

        /// Skip verifying records against a supplied schema
        #[arg(long)]
        no_verify: bool,

        /// Treat the first line of a delimited file as data
        #[arg(long)]
        no_header: bool,

        /// Register the table as a temporary view at this path
        #[arg(long)]
        view: Option<String>,

        /// Catalog to switch the session to before loading
        #[arg(long)]
        catalog: Option<String>,

        /// Database to switch the session to before loading
        #[arg(long)]
        database: Option<String>,

        /// Write the loaded rows to this batch file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quiet mode - minimal output, only show summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Resolve an object path against a current catalog and database
    Resolve {
        path: String,

        #[arg(long, default_value = DEFAULT_CATALOG)]
        catalog: String,

        #[arg(long, default_value = DEFAULT_DATABASE)]
        database: String,
    },

    /// Print the schema and rows of a batch file
    Inspect {
        file: PathBuf,

        /// Maximum number of rows to print
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Load {
            source,
            format,
            names,
            no_verify,
            no_header,
            view,
            catalog,
            database,
            output,
            quiet,
        } => {
            init_tracing(quiet);

            let format = format.as_deref().map(Format::parse).transpose()?;
            let names = names.as_deref().map(cli::parse_names).transpose()?;

            let load_args = LoadArgs {
                source,
                format,
                names,
                verify_schema: !no_verify,
                has_header: !no_header,
                view,
                catalog,
                database,
                output,
            };
            run_loader(load_args, quiet).await?;
        }
        Command::Resolve {
            path,
            catalog,
            database,
        } => {
            let resolved = resolve(&path, &catalog, &database)?;
            println!("{}", resolved);
        }
        Command::Inspect { file, limit } => {
            init_tracing(true);
            let (schema, rows) = inspect_batch_file(&file)?;
            println!("Schema: {}", schema);
            println!("Rows: {}", rows.len());
            for row in rows.iter().take(limit) {
                println!("{}", row);
            }
            if rows.len() > limit {
                println!("... {} more", rows.len() - limit);
            }
        }
    }
    Ok(())
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("table_bridge=warn")
    } else {
        EnvFilter::new("table_bridge=info")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run_loader(load_args: LoadArgs, quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Table Bridge");
        println!("============");
        println!("Source: {}", load_args.source.display());
        if let Some(view) = &load_args.view {
            println!("View: {}", view);
        }
        println!();
    }

    let result = run_load(load_args).await?;

    println!();
    println!("Load Summary");
    println!("============");
    println!("Table ID: {}", result.table_id);
    println!("Schema: {}", result.schema);
    println!("Rows loaded: {}", result.rows_loaded);
    if let Some(view) = &result.view {
        println!("View: {}", view);
    }
    if let Some(output) = &result.output {
        println!("Batch file: {}", output.display());
    }
    println!("Duration: {:.2}s", result.duration.as_secs_f64());

    Ok(())
}

/// CLI utility functions for parsing command-line arguments
mod cli {
    /// Parse a field name list "a,b,c"
    pub fn parse_names(names: &str) -> anyhow::Result<Vec<String>> {
        let parsed: Vec<String> = names.split(',').map(|n| n.trim().to_string()).collect();

        if let Some(pos) = parsed.iter().position(String::is_empty) {
            return Err(anyhow::anyhow!(
                "Field name {} is empty in '{}'. Expected format: 'a,b,c'",
                pos + 1,
                names
            ));
        }

        Ok(parsed)
    }

}
