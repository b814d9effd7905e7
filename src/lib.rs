//! # Glycostat
//!
//! Glycemic statistics engine - indexes time-stamped diabetes device events
//! and computes clinical summary statistics over a caller-supplied window.
//!
//! ## Features
//!
//! - **Multi-dimensional index**: date, local weekday and event kind, filtered together
//! - **Weekday restriction**: day-normalized stats scale by the active share of the week
//! - **Boundary-aware insulin**: basal segments that straddle the window are clipped
//! - **Glucose statistics**: time-in-range, variability, GMI, sensor usage
//! - **Insulin & carbs**: basal/bolus split, time in automated delivery, carb totals
//!
//! ## Modules
//!
//! - [`events`]: Event model, windows, weekday sets and JSON import
//! - [`index`]: Dimensions, the event index and query sessions
//! - [`stats`]: Statistics engine, classification and result records
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glycostat::events::{load_events, TimeRange};
//! use glycostat::stats::{EngineOptions, StatsEngine};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = load_events(Path::new("export.json"))?;
//!
//!     // Two weeks starting at local midnight in New York
//!     let tz = glycostat::stats::parse_timezone("America/New_York")?;
//!     let start = chrono::NaiveDate::from_ymd_opt(2018, 2, 1).unwrap();
//!     let window = TimeRange::local_days(start, 14, &tz)?;
//!
//!     let options = EngineOptions::new(window).timezone("America/New_York");
//!     let mut engine = StatsEngine::new(report.events, options)?;
//!
//!     let tir = engine.time_in_range()?;
//!     if !tir.insufficient_data {
//!         println!("Time in target: {:.0}%", tir.target_fraction() * 100.0);
//!     }
//!
//!     let gmi = engine.glucose_management_indicator();
//!     println!("GMI insufficient: {}", gmi.insufficient_data);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
pub mod index;
pub mod stats;

// Re-export top-level types for convenience
pub use events::{
    ActiveDays, Event, EventData, EventError, EventKind, EventResult, TimeRange, ONE_DAY,
    ONE_HOUR, ONE_MINUTE,
};

pub use index::{Dimension, EventIndex, IndexStats, Predicate, QuerySession};

pub use stats::{
    classify_glucose, BgSource, ClassificationMode, EngineOptions, GlucoseBounds, GlucoseRange,
    GlucoseUnits, StatKind, StatRecord, StatsEngine, StatsError, StatsResult,
};

pub use config::{Config, ConfigError, EngineConfig, LoggingConfig};
