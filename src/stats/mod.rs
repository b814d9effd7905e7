//! Glycostat Statistics
//!
//! - **engine**: `StatsEngine`, the window-scoped query surface
//! - **results**: one result record per statistic
//! - **classify**: glucose units, bounds, range classification, CGM sampling intervals
//! - **overlap**: clipping of duration-bearing events to the window
//! - **error**: Error types

pub mod classify;
pub mod engine;
pub mod error;
pub mod overlap;
pub mod results;

pub use classify::{
    classify_glucose, sampling_interval, BgSource, ClassificationMode, GlucoseBounds,
    GlucoseRange, GlucoseUnits, DEFAULT_CGM_SAMPLING_INTERVAL, MGDL_PER_MMOLL,
};
pub use engine::{
    parse_timezone, EngineOptions, StatsEngine, GMI_MIN_CGM_COVERAGE, GMI_MIN_DAYS,
    STDDEV_MIN_SAMPLES,
};
pub use error::{StatsError, StatsResult};
pub use overlap::{duration_in_range, event_duration_in_range, resolve_overlapping_start};
pub use results::{
    AverageGlucose, BasalBolus, BgSources, Carbs, CoefficientOfVariation,
    GlucoseManagementIndicator, PumpInfo, RangeBuckets, ReadingsInRange, SensorUsage,
    StandardDeviation, StatKind, StatRecord, TimeInAuto, TimeInRange, TotalInsulin,
};
