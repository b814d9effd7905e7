//! Glycostat CLI
//!
//! Command-line interface for the statistics engine:
//! - Compute statistics over a JSON event export
//! - Generate a default config file

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use glycostat::config::{generate_default_config, Config, LoggingConfig};
use glycostat::events::{load_events, ActiveDays, TimeRange};
use glycostat::stats::{
    parse_timezone, BgSource, GlucoseUnits, StatKind, StatRecord, StatsEngine,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "glycostat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Glycemic statistics over diabetes device exports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute statistics for a window
    Stats {
        /// JSON event export (array of events)
        input: PathBuf,
        /// First local day of the window (YYYY-MM-DD)
        #[arg(short, long)]
        start: NaiveDate,
        /// Window length in days
        #[arg(short, long, default_value = "14")]
        days: u32,
        /// IANA timezone (overrides config)
        #[arg(short, long)]
        timezone: Option<String>,
        /// Only count these weekdays, e.g. "mon,tue,wed" or "1,2,3"
        #[arg(short, long)]
        active_days: Option<ActiveDays>,
        /// Glucose source for average and variability (cbg, smbg)
        #[arg(short, long)]
        bg_source: Option<BgSource>,
        /// Units of glucose values in the export (mg/dL, mmol/L)
        #[arg(short, long)]
        units: Option<GlucoseUnits>,
        /// Statistics to compute (default: all)
        #[arg(long = "stat")]
        stats: Vec<StatKind>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Stats {
            input,
            start,
            days,
            timezone,
            active_days,
            bg_source,
            units,
            stats,
        } => {
            if let Some(timezone) = timezone {
                config.engine.timezone = timezone;
            }
            if let Some(units) = units {
                config.engine.glucose_units = units;
            }
            if let Some(active_days) = active_days {
                config.engine.active_days = active_days;
            }
            if bg_source.is_some() {
                config.engine.bg_source = bg_source;
            }

            let tz = parse_timezone(&config.engine.timezone)?;
            let window = TimeRange::local_days(start, days, &tz)?;

            let report = load_events(&input)
                .with_context(|| format!("Failed to load events from {:?}", input))?;
            if report.skipped > 0 {
                tracing::warn!("{} malformed events skipped", report.skipped);
            }

            let mut engine = StatsEngine::new(report.events, config.engine.options(window))?;

            let kinds = if stats.is_empty() {
                StatKind::all().to_vec()
            } else {
                stats
            };
            let records = kinds
                .into_iter()
                .map(|kind| engine.stat(kind))
                .collect::<Result<Vec<_>, _>>()?;

            match cli.format {
                OutputFormat::Json => print_json(&mut engine, &records)?,
                OutputFormat::Table => print_table(&mut engine, start, days, &records)?,
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("glycostat={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json(engine: &mut StatsEngine, records: &[StatRecord]) -> anyhow::Result<()> {
    let window = engine.window();
    let sources = engine.bg_sources();
    let pump = engine.latest_pump();
    let index = engine.index_stats();
    let stats: serde_json::Map<String, serde_json::Value> = records
        .iter()
        .map(|r| Ok((r.kind().to_string(), serde_json::to_value(r)?)))
        .collect::<Result<_, serde_json::Error>>()?;

    let output = serde_json::json!({
        "window": window,
        "timezone": engine.timezone().name(),
        "glucoseUnits": engine.glucose_units(),
        "bgSources": sources,
        "pump": pump,
        "index": index,
        "stats": stats,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_table(
    engine: &mut StatsEngine,
    start: NaiveDate,
    days: u32,
    records: &[StatRecord],
) -> anyhow::Result<()> {
    let sources = engine.bg_sources();
    let index = engine.index_stats();

    println!("Glycostat v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Window:     {} + {} days ({})", start, days, engine.timezone().name());
    println!("Units:      {}", engine.glucose_units());
    println!(
        "Events:     {} loaded, {} weekdays covered",
        index.total_events, index.weekdays_covered
    );
    println!(
        "BG source:  {} (cbg: {}, smbg: {})",
        sources.current,
        yes_no(sources.cbg),
        yes_no(sources.smbg)
    );
    if let Some(pump) = engine.latest_pump() {
        println!(
            "Pump:       {} {}{}",
            pump.manufacturer.as_deref().unwrap_or("-"),
            pump.device_model.as_deref().unwrap_or("-"),
            if pump.automated_delivery { " (automated)" } else { "" }
        );
    }
    println!();

    println!("{:<30} {:<26} {}", "Statistic", "Field", "Value");
    println!("{}", "-".repeat(72));

    for record in records {
        let name = record.kind().to_string();
        if record.insufficient_data() {
            println!("{:<30} {:<26} {}", name, "-", "insufficient data");
            continue;
        }

        let fields = flatten(&serde_json::to_value(record)?);
        for (i, (field, value)) in fields.iter().enumerate() {
            let label = if i == 0 { name.as_str() } else { "" };
            println!("{:<30} {:<26} {}", label, field, value);
        }
    }

    Ok(())
}

/// Flatten a record into (field, display value) pairs, one level of nesting deep
fn flatten(value: &serde_json::Value) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    if let serde_json::Value::Object(map) = value {
        for (key, v) in map {
            match v {
                serde_json::Value::Object(inner) => {
                    for (inner_key, inner_v) in inner {
                        rows.push((format!("{}.{}", key, inner_key), format_value(inner_v)));
                    }
                }
                _ => rows.push((key.clone(), format_value(v))),
            }
        }
    }
    rows
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
            Some(f) => format!("{:.2}", f),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn yes_no(present: bool) -> &'static str {
    if present {
        "yes"
    } else {
        "no"
    }
}
