//! `rotation` CLI: generate, preview and apply yearly turn schedules.
//!
//! ## Usage
//!
//! ```sh
//! # Print the events a request would produce (request on stdin)
//! rotation generate < request.json
//!
//! # Same, as a table using member names from the property config
//! rotation generate -r request.json -c property.toml --format table
//!
//! # Dry run against a JSON store file
//! rotation preview -r request.json -s store.json
//!
//! # Replace the range in the store file
//! rotation apply -r request.json -s store.json -c property.toml
//!
//! # Per-day occupancy for a property
//! rotation occupancy -s store.json --property lake-house --from 2025-01-01 --to 2025-02-01
//! ```
//!
//! Logs go to stderr. `RUST_LOG` controls the filter (default `warn`); `-v`
//! and `-vv` raise it to `info` and `debug`.

use std::io::{self, Read};
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rotation_engine::interval::parse_instant;
use rotation_engine::{
    generate_schedule, occupancy_for_range, regenerate, EventType, GeneratedEvent, Interval,
    MemberDirectory, MemoryStore, PropertyConfig, ReplacePlan, ScheduleRequest, StoreSnapshot,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rotation", version, about = "Yearly turn-schedule generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the events for a request without touching any store
    Generate {
        /// Request JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        request: Option<String>,
        /// Property config TOML file
        #[arg(short, long)]
        config: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Show what applying a request would delete and insert
    Preview {
        /// Request JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        request: Option<String>,
        /// Store JSON file (treated as empty if it does not exist)
        #[arg(short, long)]
        store: String,
        /// Property config TOML file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Regenerate the request's range and write the store back
    Apply {
        /// Request JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        request: Option<String>,
        /// Store JSON file (created if it does not exist)
        #[arg(short, long)]
        store: String,
        /// Property config TOML file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Report per-day occupancy of a property
    Occupancy {
        /// Store JSON file
        #[arg(short, long)]
        store: String,
        #[arg(long)]
        property: String,
        /// First day (inclusive)
        #[arg(long)]
        from: String,
        /// Last day (exclusive)
        #[arg(long)]
        to: String,
        /// Bookings the property holds per day (defaults to the config's max_slots, else 1)
        #[arg(long)]
        capacity: Option<u32>,
        /// Property config TOML file
        #[arg(short, long)]
        config: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Table,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            request,
            config,
            output,
            format,
        } => {
            let request = load_request(request.as_deref())?;
            let config = load_config(config.as_deref())?;
            let events = generate_schedule(&request, config.as_ref())
                .context("Failed to generate schedule")?;
            info!(count = events.len(), "generated events");

            let rendered = match format {
                Format::Json => to_json(&events)?,
                Format::Table => {
                    let directory = config.map(|c| c.directory()).unwrap_or_default();
                    events_table(&events, &directory)
                }
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::Preview {
            request,
            store,
            config,
        } => {
            let request = load_request(request.as_deref())?;
            let config = load_config(config.as_deref())?;
            let store = MemoryStore::from_snapshot(load_store(&store)?);

            let plan =
                ReplacePlan::build(&request, config.as_ref()).context("Invalid schedule request")?;
            let preview = plan.preview(&store).context("Failed to read store")?;
            write_output(None, &to_json(&preview)?)?;
        }
        Commands::Apply {
            request,
            store: store_path,
            config,
        } => {
            let request = load_request(request.as_deref())?;
            let config = load_config(config.as_deref())?;
            let mut store = MemoryStore::from_snapshot(load_store(&store_path)?);

            let outcome = regenerate(&mut store, &request, config.as_ref());
            write_output(None, &to_json(&outcome)?)?;

            if !outcome.success {
                process::exit(1);
            }
            let snapshot = store.snapshot().context("Failed to read store")?;
            save_store(&store_path, &snapshot)?;
        }
        Commands::Occupancy {
            store,
            property,
            from,
            to,
            capacity,
            config,
            format,
        } => {
            let config = load_config(config.as_deref())?;
            let capacity = capacity
                .or_else(|| config.as_ref().map(|c| c.max_slots))
                .unwrap_or(1);
            let range = Interval::normalized(parse_instant(&from)?, parse_instant(&to)?)
                .context("Invalid occupancy range")?;

            let events: Vec<GeneratedEvent> = load_store(&store)?
                .events
                .into_iter()
                .filter(|e| e.property_id == property)
                .collect();
            let days = occupancy_for_range(&events, &range, capacity);

            let rendered = match format {
                Format::Json => to_json(&days)?,
                Format::Table => {
                    let mut out = String::from("day         occupied  free  flags\n");
                    for day in &days {
                        let mut flags = Vec::new();
                        if day.maintenance {
                            flags.push("maintenance");
                        }
                        if day.conflict {
                            flags.push("conflict");
                        }
                        if day.overbooked {
                            flags.push("overbooked");
                        }
                        out.push_str(&format!(
                            "{}  {:>8}  {:>4}  {}\n",
                            day.day,
                            day.occupied,
                            day.free,
                            flags.join(",")
                        ));
                    }
                    out
                }
            };
            write_output(None, &rendered)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_request(path: Option<&str>) -> Result<ScheduleRequest> {
    let json = read_input(path)?;
    serde_json::from_str(&json).context("Failed to parse schedule request JSON")
}

fn load_config(path: Option<&str>) -> Result<Option<PropertyConfig>> {
    match path {
        Some(path) => {
            let config = PropertyConfig::from_file(path)
                .with_context(|| format!("Failed to load property config: {}", path))?;
            debug!(property_id = %config.id, "loaded property config");
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

fn load_store(path: &str) -> Result<StoreSnapshot> {
    if !Path::new(path).exists() {
        debug!(path, "store file missing, starting empty");
        return Ok(StoreSnapshot::default());
    }
    let json = read_input(Some(path))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse store file: {}", path))
}

fn save_store(path: &str, snapshot: &StoreSnapshot) -> Result<()> {
    write_output(Some(path), &to_json(snapshot)?)?;
    info!(
        path,
        events = snapshot.events.len(),
        blockers = snapshot.blockers.len(),
        "store written"
    );
    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    json.push('\n');
    Ok(json)
}

/// One line per event: dates, type, member name and initials.
fn events_table(events: &[GeneratedEvent], directory: &MemberDirectory) -> String {
    let mut out = String::from("start       end         type         member\n");
    for event in events {
        let member = match event.member_id.as_deref() {
            Some(id) => format!("{} ({})", directory.display_name(id), directory.initials(id)),
            None => "-".to_string(),
        };
        let kind = match event.event_type {
            EventType::Turn => "turn",
            EventType::Request => "request",
            EventType::Maintenance => "maintenance",
        };
        out.push_str(&format!(
            "{}  {}  {:<11}  {}\n",
            event.range.start.format("%Y-%m-%d"),
            event.range.end.format("%Y-%m-%d"),
            kind,
            member
        ));
    }
    out
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
