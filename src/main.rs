//! AirAware CLI
//!
//! Command-line interface for historical air quality and weather reports.

#![forbid(unsafe_code)]

use airaware::request::parse_date;
use airaware::{AirAwareConfig, AirAwareError, AnalysisRequest, PersistentCache, RawRequest, Workflow};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// AirAware - air quality trends and their weather context
#[derive(Parser, Debug)]
#[command(name = "airaware", author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(long, global = true, env = "AIRAWARE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug output for airaware itself
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse air quality and weather for one or more locations
    Analyze {
        /// Locations to analyse, e.g. "New Delhi, India"
        #[arg(short, long, num_args = 1..)]
        locations: Vec<String>,
        /// First day (YYYY-MM-DD), default 60 days ago
        #[arg(short = 's', long)]
        start_date: Option<String>,
        /// Last day (YYYY-MM-DD), default three days after the start
        #[arg(short = 'e', long)]
        end_date: Option<String>,
        /// Pollutants, e.g. pm25 pm10 o3
        #[arg(short, long, num_args = 1..)]
        parameters: Vec<String>,
        /// Name printed on the report
        #[arg(long)]
        author: Option<String>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Bypass the response cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Show the bounding box used for a location
    Geocode {
        location: String,
    },
    /// Show daily historical weather for a location
    Weather {
        location: String,
        #[arg(short = 's', long)]
        start_date: String,
        /// Defaults to the start date
        #[arg(short = 'e', long)]
        end_date: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

fn open_cache(config: &AirAwareConfig, disabled: bool) -> Option<Arc<PersistentCache>> {
    if disabled || !config.cache.enabled {
        return None;
    }
    match PersistentCache::open(&config.cache.location) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(err) => {
            warn!(
                "Cache unavailable at {}: {}. Continuing without it.",
                config.cache.location, err
            );
            None
        }
    }
}

async fn run(args: Args, config: AirAwareConfig) -> airaware::Result<()> {
    match args.command {
        Command::Analyze {
            locations,
            start_date,
            end_date,
            parameters,
            author,
            format,
            output,
            no_cache,
        } => {
            let today = chrono::Local::now().date_naive();
            let request = AnalysisRequest::from_raw(
                RawRequest {
                    locations,
                    start_date,
                    end_date,
                    parameters,
                    author,
                },
                &config.defaults,
                today,
            )?;

            let workflow = Workflow::from_config(&config, open_cache(&config, no_cache))?;
            let report = workflow.run(&request).await;

            let rendered = match format {
                OutputFormat::Markdown => report.to_markdown(),
                OutputFormat::Json => report.to_json()?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    info!("Report written to {}", path.display());
                }
                None => println!("{rendered}"),
            }
            if report.locations.is_empty() {
                return Err(AirAwareError::general(
                    "None of the requested locations could be analysed.",
                ));
            }
        }
        Command::Geocode { location } => {
            let workflow = Workflow::from_config(&config, open_cache(&config, false))?;
            let place = workflow.locate(&location).await?;
            println!("{}", place.display_name);
            println!("  center:       {}", place.format_coordinates());
            println!("  bounding box: {}", place.bounding_box);
            println!("  openaq bbox:  {}", place.bounding_box.to_openaq_param());
        }
        Command::Weather {
            location,
            start_date,
            end_date,
        } => {
            let start = parse_date(&start_date)?;
            let end = end_date.as_deref().map(parse_date).transpose()?.unwrap_or(start);
            if start > end {
                return Err(AirAwareError::validation(format!(
                    "Start date {start} cannot be after end date {end}."
                )));
            }
            let workflow = Workflow::from_config(&config, open_cache(&config, false))?;
            let (place, days) = workflow.weather_for(&location, start, end).await?;
            println!("{}", place.display_name);
            for day in days {
                println!(
                    "  {}  {:<24} {:>9}  {:>10}  {:>5}",
                    day.date,
                    day.format_temperature(),
                    day.format_precipitation(),
                    day.format_wind(),
                    day.format_humidity()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AirAwareConfig::load_from_path(args.config.clone())
        .context("Failed to load configuration")?;
    let telemetry = airaware::logging::init(&config, args.verbose)
        .context("Failed to initialise logging")?;

    if let Err(err) = run(args, config).await {
        tracing::error!("{err}");
        eprintln!("Error: {}", err.user_message());
        drop(telemetry);
        std::process::exit(1);
    }
    Ok(())
}
