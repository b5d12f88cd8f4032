//! Censo CLI - municipalities where women outnumber men
//!
//! # Main Commands
//!
//! ```bash
//! censo states                         # List states
//! censo municipalities RJ              # List municipalities of a state
//! censo report RJ --min-population 50000 --csv out.csv
//! censo serve                          # Start HTTP server (port 3000)
//! censo cache list                     # Inspect cached IBGE responses
//! ```

use clap::{Parser, Subcommand};
use censo::report::render::{render_table, BAR_WIDTH};
use censo::{
    resolve_state, run_report_for_session, Config, IbgeClient, Notice, ReportOptions,
    ResponseCache, SessionGuards, TableApi,
};
use std::path::{Path, PathBuf};

/// Session key of CLI runs
const CLI_SESSION: &str = "cli";

#[derive(Parser)]
#[command(name = "censo")]
#[command(about = "Brazilian municipalities where women outnumber men (IBGE Census 2010)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the states
    States,

    /// List the municipalities of a state
    Municipalities {
        /// State id, acronym or name
        state: String,
    },

    /// Build the report for a state
    Report {
        /// State id, acronym or name
        state: String,

        /// Minimum total population (inclusive)
        #[arg(short, long, default_value = "0")]
        min_population: u64,

        /// Size of the top-N rankings
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Write the CSV export to this file (a directory gets the default file name)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the full report as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,

        /// Table API: sidra or agregados
        #[arg(long)]
        api: Option<TableApi>,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Manage cached IBGE responses
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached responses
    List,

    /// Delete all cached responses
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command {
        Commands::States => cmd_states(config).await,

        Commands::Municipalities { state } => cmd_municipalities(config, &state).await,

        Commands::Report {
            state,
            min_population,
            top,
            csv,
            json,
            api,
            no_cache,
        } => {
            let mut config = if no_cache { config.without_cache() } else { config };
            if let Some(api) = api {
                config.table_api = api;
            }
            let options = ReportOptions {
                min_total_population: min_population,
                top,
            };
            cmd_report(config, &state, options, csv.as_deref(), json.as_deref()).await
        }

        Commands::Serve { port, no_cache } => {
            let config = if no_cache { config.without_cache() } else { config };
            cmd_serve(port, config).await
        }

        Commands::Cache { action } => cmd_cache(config, action),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_states(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = IbgeClient::new(config)?;
    let states = client.try_list_states().await?;

    for s in &states {
        println!("{:>2}  {}  {}", s.id, s.acronym, s.name);
    }
    eprintln!("{} states", states.len());
    Ok(())
}

async fn cmd_municipalities(config: Config, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = IbgeClient::new(config)?;
    let state = resolve_state(&client, query).await?;
    let municipalities = client.try_list_municipalities(state.id).await?;

    for m in &municipalities {
        println!("{}  {}", m.code, m.name);
    }
    eprintln!("{} municipalities in {}", municipalities.len(), state.name);
    Ok(())
}

async fn cmd_report(
    config: Config,
    query: &str,
    options: ReportOptions,
    csv_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = IbgeClient::new(config)?;
    let state = resolve_state(&client, query).await?;

    let guards = SessionGuards::new();
    let report = run_report_for_session(&client, &guards, CLI_SESSION, &state, &options).await?;

    match report.notice() {
        Some(Notice::Error(message)) => return Err(message.into()),
        // Exports are still written: a header-only CSV and the empty report
        Some(Notice::NoMatches(message)) => println!("{}", message),
        None => {
            println!(
                "Municipalities of {} with more women than men ({} of {})\n",
                state.name,
                report.rows.len(),
                report.municipalities_seen
            );
            println!("{}", render_table(&report.rows));

            for chart in report.charts(options.top) {
                println!("{}", chart.render_text(BAR_WIDTH));
            }
        }
    }

    if let Some(path) = csv_path {
        let path = report.write_csv(path)?;
        eprintln!("CSV written to: {}", path.display());
    }

    if let Some(path) = json_path {
        report.write_json(path)?;
        eprintln!("JSON written to: {}", path.display());
    }

    Ok(())
}

async fn cmd_serve(port: u16, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    censo::server::start_server(port, config).await
}

fn cmd_cache(config: Config, action: CacheAction) -> Result<(), Box<dyn std::error::Error>> {
    let cache = ResponseCache::new(&config.cache_dir, config.cache_ttl_hours);

    match action {
        CacheAction::List => {
            let entries = cache.list();
            if entries.is_empty() {
                eprintln!("No cached responses in {}", cache.dir().display());
                return Ok(());
            }

            eprintln!("Cached responses ({}):\n", entries.len());
            for entry in entries {
                let state = if cache.is_fresh(&entry) { "fresh" } else { "stale" };
                println!("  {} [{}]", entry.key, state);
                println!("     URL: {}", entry.url);
                println!("     Fetched: {}", entry.fetched_at);
            }
        }

        CacheAction::Clear => {
            let removed = cache.clear()?;
            eprintln!("Removed {} cached responses", removed);
        }
    }

    Ok(())
}
