//! Statistic result records
//!
//! One plain record per metric. Records serialize with camelCase field names;
//! `NaN` fields serialize as `null`. A record with `insufficientData: true`
//! should be rendered as a placeholder, not as its numeric value.

use crate::events::ONE_DAY;
use crate::stats::classify::{BgSource, GlucoseRange};
use crate::stats::error::StatsError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Mean glucose of the active source
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageGlucose {
    pub average_glucose: f64,
    pub total: usize,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDeviation {
    pub average_glucose: f64,
    pub standard_deviation: f64,
    pub total: usize,
    pub insufficient_data: bool,
}

/// Standard deviation as a percentage of the mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoefficientOfVariation {
    pub coefficient_of_variation: f64,
    pub total: usize,
    pub insufficient_data: bool,
}

/// Estimated A1c (%) from mean CGM glucose
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseManagementIndicator {
    pub glucose_management_indicator: f64,
    pub total: usize,
    pub insufficient_data: bool,
}

/// Per-range accumulator shared by the range statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBuckets {
    pub very_low: f64,
    pub low: f64,
    pub target: f64,
    pub high: f64,
    pub very_high: f64,
    pub total: f64,
}

impl RangeBuckets {
    /// Accumulate `weight` into the bucket for `range` and into `total`
    pub fn add(&mut self, range: GlucoseRange, weight: f64) {
        let bucket = match range {
            GlucoseRange::VeryLow => &mut self.very_low,
            GlucoseRange::Low => &mut self.low,
            GlucoseRange::Target => &mut self.target,
            GlucoseRange::High => &mut self.high,
            GlucoseRange::VeryHigh => &mut self.very_high,
        };
        *bucket += weight;
        self.total += weight;
    }

    /// Every field multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            very_low: self.very_low * factor,
            low: self.low * factor,
            target: self.target * factor,
            high: self.high * factor,
            very_high: self.very_high * factor,
            total: self.total * factor,
        }
    }

    /// Rescale to one day: each field becomes `value × ONE_DAY / total`
    pub fn per_day(&self) -> Self {
        if self.total == 0.0 {
            return *self;
        }
        self.scaled(ONE_DAY as f64 / self.total)
    }

    /// Sum of the five buckets
    pub fn bucket_sum(&self) -> f64 {
        self.very_low + self.low + self.target + self.high + self.very_high
    }
}

/// CGM time per range, in milliseconds (per day when the window spans more than one)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInRange {
    pub very_low: f64,
    pub low: f64,
    pub target: f64,
    pub high: f64,
    pub very_high: f64,
    pub total: f64,
    pub insufficient_data: bool,
}

impl TimeInRange {
    pub(crate) fn from_buckets(buckets: RangeBuckets, insufficient_data: bool) -> Self {
        Self {
            very_low: buckets.very_low,
            low: buckets.low,
            target: buckets.target,
            high: buckets.high,
            very_high: buckets.very_high,
            total: buckets.total,
            insufficient_data,
        }
    }

    /// Share of `total` spent in the target range, 0..=1
    pub fn target_fraction(&self) -> f64 {
        if self.total > 0.0 {
            self.target / self.total
        } else {
            f64::NAN
        }
    }
}

/// Meter readings per range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsInRange {
    /// Raw reading counts
    pub counts: RangeBuckets,
    /// `counts / effective_days`, only for windows longer than one day
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_average: Option<RangeBuckets>,
}

/// CGM wear time relative to the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorUsage {
    /// Fraction of the effective window covered by CGM samples
    pub sensor_usage: f64,
    /// Sum of sample sampling intervals, in milliseconds
    pub sampled_duration: i64,
    pub total: usize,
}

/// Basal and bolus insulin units (per day when the window spans more than one)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasalBolus {
    pub basal: f64,
    pub bolus: f64,
    /// Number of basal and bolus events contributing
    pub total: usize,
}

/// Basal time under automated vs. manual delivery, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInAuto {
    pub automated: f64,
    pub manual: f64,
    pub total: f64,
    pub insufficient_data: bool,
}

/// Carbohydrate grams (per day when the window spans more than one)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Carbs {
    pub carbs: f64,
    /// Number of wizard and food events contributing
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalInsulin {
    pub total_insulin: f64,
    pub basal: f64,
    pub bolus: f64,
    pub total: usize,
}

/// Which glucose sources have in-window data, and which one is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BgSources {
    pub cbg: bool,
    pub smbg: bool,
    pub current: BgSource,
}

/// Most recent insulin pump seen in the uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpInfo {
    /// Lowercased first manufacturer
    pub manufacturer: Option<String>,
    pub device_model: Option<String>,
    /// Whether the pump can run automated basal
    pub automated_delivery: bool,
}

/// Every statistic the engine can compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    AverageGlucose,
    StandardDeviation,
    CoefficientOfVariation,
    GlucoseManagementIndicator,
    TimeInRange,
    ReadingsInRange,
    SensorUsage,
    BasalBolus,
    TimeInAuto,
    Carbs,
    TotalInsulin,
}

impl StatKind {
    pub fn all() -> &'static [StatKind] {
        &[
            StatKind::AverageGlucose,
            StatKind::StandardDeviation,
            StatKind::CoefficientOfVariation,
            StatKind::GlucoseManagementIndicator,
            StatKind::TimeInRange,
            StatKind::ReadingsInRange,
            StatKind::SensorUsage,
            StatKind::BasalBolus,
            StatKind::TimeInAuto,
            StatKind::Carbs,
            StatKind::TotalInsulin,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            StatKind::AverageGlucose => "average-glucose",
            StatKind::StandardDeviation => "standard-deviation",
            StatKind::CoefficientOfVariation => "coefficient-of-variation",
            StatKind::GlucoseManagementIndicator => "glucose-management-indicator",
            StatKind::TimeInRange => "time-in-range",
            StatKind::ReadingsInRange => "readings-in-range",
            StatKind::SensorUsage => "sensor-usage",
            StatKind::BasalBolus => "basal-bolus",
            StatKind::TimeInAuto => "time-in-auto",
            StatKind::Carbs => "carbs",
            StatKind::TotalInsulin => "total-insulin",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StatKind {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('_', "-");
        let kind = match name.as_str() {
            "gmi" => StatKind::GlucoseManagementIndicator,
            "cv" => StatKind::CoefficientOfVariation,
            "tir" => StatKind::TimeInRange,
            other => StatKind::all()
                .iter()
                .copied()
                .find(|k| k.name() == other)
                .ok_or_else(|| StatsError::InvalidArgument(format!("unknown statistic '{}'", s)))?,
        };
        Ok(kind)
    }
}

/// Any statistic result, serialized as the inner record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatRecord {
    AverageGlucose(AverageGlucose),
    StandardDeviation(StandardDeviation),
    CoefficientOfVariation(CoefficientOfVariation),
    GlucoseManagementIndicator(GlucoseManagementIndicator),
    TimeInRange(TimeInRange),
    ReadingsInRange(ReadingsInRange),
    SensorUsage(SensorUsage),
    BasalBolus(BasalBolus),
    TimeInAuto(TimeInAuto),
    Carbs(Carbs),
    TotalInsulin(TotalInsulin),
}

impl StatRecord {
    pub fn kind(&self) -> StatKind {
        match self {
            StatRecord::AverageGlucose(_) => StatKind::AverageGlucose,
            StatRecord::StandardDeviation(_) => StatKind::StandardDeviation,
            StatRecord::CoefficientOfVariation(_) => StatKind::CoefficientOfVariation,
            StatRecord::GlucoseManagementIndicator(_) => StatKind::GlucoseManagementIndicator,
            StatRecord::TimeInRange(_) => StatKind::TimeInRange,
            StatRecord::ReadingsInRange(_) => StatKind::ReadingsInRange,
            StatRecord::SensorUsage(_) => StatKind::SensorUsage,
            StatRecord::BasalBolus(_) => StatKind::BasalBolus,
            StatRecord::TimeInAuto(_) => StatKind::TimeInAuto,
            StatRecord::Carbs(_) => StatKind::Carbs,
            StatRecord::TotalInsulin(_) => StatKind::TotalInsulin,
        }
    }

    /// Whether the record should be shown as a placeholder
    pub fn insufficient_data(&self) -> bool {
        match self {
            StatRecord::AverageGlucose(r) => r.insufficient_data,
            StatRecord::StandardDeviation(r) => r.insufficient_data,
            StatRecord::CoefficientOfVariation(r) => r.insufficient_data,
            StatRecord::GlucoseManagementIndicator(r) => r.insufficient_data,
            StatRecord::TimeInRange(r) => r.insufficient_data,
            StatRecord::TimeInAuto(r) => r.insufficient_data,
            StatRecord::ReadingsInRange(r) => r.counts.total == 0.0,
            StatRecord::SensorUsage(r) => r.total == 0,
            StatRecord::BasalBolus(r) => r.total == 0,
            StatRecord::Carbs(r) => r.total == 0,
            StatRecord::TotalInsulin(r) => r.total == 0,
        }
    }
}
