//! commutematch CLI - Debug tool for commuting classification
//!
//! Usage:
//!   commutematch-cli classify --trips <file> [--stations <file>] [--output <file>]
//!
//! This tool reads trip and station CSV files, runs the classification
//! pipeline over every user, and prints the resulting commuting
//! categories, helping to understand how trips are being clustered and
//! resolved.

use clap::{Parser, Subcommand};
use log::warn;
use serde::Deserialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commutematch::{
    CommutePipeline, DailyCommutingFlow, PipelineConfig, TransitStation, TripPoint, TripRecord,
    TripStore,
};

#[derive(Parser)]
#[command(name = "commutematch-cli")]
#[command(about = "Debug tool for commuting pattern classification", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every user's commuting pattern
    Classify {
        /// CSV file of trip records
        /// (user_id,trip_id,origin_x,origin_y,destination_x,destination_y,start_time,end_time,date)
        #[arg(short, long)]
        trips: PathBuf,

        /// CSV file of transit stations (station_id,x,y)
        #[arg(short, long)]
        stations: Option<PathBuf>,

        /// Output file for the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transfer distance threshold in meters
        #[arg(long, default_value = "50.0")]
        transfer_distance: f64,
    },
}

/// Raw trip row as it appears in the CSV file.
#[derive(Debug, Deserialize)]
struct TripRow {
    user_id: String,
    trip_id: String,
    origin_x: f64,
    origin_y: f64,
    destination_x: f64,
    destination_y: f64,
    start_time: String,
    end_time: String,
    date: String,
}

/// Raw station row as it appears in the CSV file.
#[derive(Debug, Deserialize)]
struct StationRow {
    station_id: String,
    x: f64,
    y: f64,
}

/// Per-user entry in the JSON report.
#[derive(Debug, serde::Serialize)]
struct UserReport {
    user_id: String,
    flow: DailyCommutingFlow,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{:5}] {}", record.level(), record.args())
        })
        .init();

    match cli.command {
        Commands::Classify {
            trips,
            stations,
            output,
            transfer_distance,
        } => run_classify(
            &trips,
            stations.as_deref(),
            output.as_deref(),
            transfer_distance,
        ),
    }
}

fn run_classify(
    trips_path: &Path,
    stations_path: Option<&Path>,
    output_path: Option<&Path>,
    transfer_distance: f64,
) -> ExitCode {
    let store = match load_trips(trips_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error reading trips from {}: {e}", trips_path.display());
            return ExitCode::FAILURE;
        }
    };

    let stations = match stations_path {
        Some(path) => match load_stations(path) {
            Ok(stations) => stations,
            Err(e) => {
                eprintln!("Error reading stations from {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    let mut config = PipelineConfig::default();
    config.resolver.transfer_distance_threshold = transfer_distance;

    let pipeline = match CommutePipeline::new(config, stations) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error building pipeline: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stats = pipeline.stats(&store);
    println!(
        "Loaded {} trips for {} users, {} stations",
        stats.trip_count, stats.user_count, stats.station_count
    );

    let results = pipeline.classify_store(&store);
    for (user_id, flow) in &results {
        println!(
            "  {user_id}: {} ({} member trips, round-trip rate {:.3})",
            flow.commuting_category, flow.total_member_count, flow.cycling_round_trip_rate
        );
    }
    println!("Classified {} of {} users", results.len(), stats.user_count);

    if let Some(path) = output_path {
        let report: Vec<UserReport> = results
            .into_iter()
            .map(|(user_id, flow)| UserReport { user_id, flow })
            .collect();

        let file = match File::create(path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Error creating {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = serde_json::to_writer_pretty(BufWriter::new(file), &report) {
            eprintln!("Error writing report to {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        println!("Report written to {}", path.display());
    }

    ExitCode::SUCCESS
}

/// Load trip rows into a per-user store, skipping malformed rows.
fn load_trips(path: &Path) -> Result<TripStore, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut store = TripStore::new();

    for (row_index, row) in reader.deserialize::<TripRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed trip row {}: {e}", row_index + 1);
                continue;
            }
        };

        match TripRecord::new(
            &row.trip_id,
            TripPoint::new(row.origin_x, row.origin_y),
            TripPoint::new(row.destination_x, row.destination_y),
            &row.start_time,
            &row.end_time,
            &row.date,
        ) {
            Ok(trip) => store.add(&row.user_id, trip),
            Err(e) => warn!("skipping trip row {}: {e}", row_index + 1),
        }
    }

    Ok(store)
}

/// Load station rows, skipping malformed ones.
fn load_stations(path: &Path) -> Result<Vec<TransitStation>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut stations = Vec::new();

    for (row_index, row) in reader.deserialize::<StationRow>().enumerate() {
        match row {
            Ok(row) => stations.push(TransitStation::new(
                &row.station_id,
                TripPoint::new(row.x, row.y),
            )),
            Err(e) => warn!("skipping malformed station row {}: {e}", row_index + 1),
        }
    }

    Ok(stations)
}
