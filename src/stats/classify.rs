//! Glucose units, bounds and classification
//!
//! Bounds are expressed in the same units as the event values; the engine
//! never converts readings, only the GMI formula converts its mean to mg/dL.

use crate::events::{Event, EventData, EventKind, ONE_MINUTE};
use crate::stats::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// mg/dL per mmol/L of glucose
pub const MGDL_PER_MMOLL: f64 = 18.01559;

/// Nominal interval between CGM samples, by device-id prefix
const CGM_SAMPLING_INTERVALS: &[(&str, i64)] = &[("AbbottFreeStyleLibre", 15 * ONE_MINUTE)];

/// Interval for CGM devices not listed above
pub const DEFAULT_CGM_SAMPLING_INTERVAL: i64 = 5 * ONE_MINUTE;

/// Unit of glucose values and bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnits {
    #[serde(rename = "mg/dL")]
    #[default]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnits {
    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnits::MgDl => "mg/dL",
            GlucoseUnits::MmolL => "mmol/L",
        }
    }

    /// Convert a value in these units to mg/dL
    pub fn to_mgdl(self, value: f64) -> f64 {
        match self {
            GlucoseUnits::MgDl => value,
            GlucoseUnits::MmolL => value * MGDL_PER_MMOLL,
        }
    }
}

impl fmt::Display for GlucoseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GlucoseUnits {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mg/dl" | "mgdl" => Ok(GlucoseUnits::MgDl),
            "mmol/l" | "mmoll" | "mmol" => Ok(GlucoseUnits::MmolL),
            other => Err(StatsError::InvalidArgument(format!(
                "unknown glucose units '{}' (expected mg/dL or mmol/L)",
                other
            ))),
        }
    }
}

/// Classification thresholds, in the engine's glucose units
///
/// `target_lower_bound..=target_upper_bound` is the target range. Values below
/// `very_low_threshold` or above `very_high_threshold` are the outer buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseBounds {
    pub very_low_threshold: f64,
    pub target_lower_bound: f64,
    pub target_upper_bound: f64,
    pub very_high_threshold: f64,
}

impl Default for GlucoseBounds {
    fn default() -> Self {
        Self::for_units(GlucoseUnits::MgDl)
    }
}

impl GlucoseBounds {
    /// Standard consensus bounds for a unit
    pub fn for_units(units: GlucoseUnits) -> Self {
        match units {
            GlucoseUnits::MgDl => Self {
                very_low_threshold: 54.0,
                target_lower_bound: 70.0,
                target_upper_bound: 180.0,
                very_high_threshold: 250.0,
            },
            GlucoseUnits::MmolL => Self {
                very_low_threshold: 3.0,
                target_lower_bound: 3.9,
                target_upper_bound: 10.0,
                very_high_threshold: 13.9,
            },
        }
    }

    /// Check the target range is finite and non-empty
    pub fn validate(&self) -> StatsResult<()> {
        let (lower, upper) = (self.target_lower_bound, self.target_upper_bound);
        if !lower.is_finite() || !upper.is_finite() {
            return Err(StatsError::InvalidArgument(format!(
                "glucose target bounds must be numeric (lower={}, upper={})",
                lower, upper
            )));
        }
        if lower >= upper {
            return Err(StatsError::InvalidArgument(format!(
                "glucose target lower bound {} must be below upper bound {}",
                lower, upper
            )));
        }
        Ok(())
    }
}

/// Clinical range of a glucose value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GlucoseRange {
    VeryLow,
    Low,
    Target,
    High,
    VeryHigh,
}

/// Number of buckets `classify_glucose` splits into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMode {
    /// low / target / high
    ThreeWay,
    /// veryLow / low / target / high / veryHigh
    FiveWay,
}

/// Classify a glucose value against `bounds`
///
/// Fails with `InvalidArgument` when the bounds are invalid or the value is
/// not a positive number.
pub fn classify_glucose(
    bounds: &GlucoseBounds,
    value: f64,
    mode: ClassificationMode,
) -> StatsResult<GlucoseRange> {
    bounds.validate()?;
    if value.is_nan() || value <= 0.0 {
        return Err(StatsError::InvalidArgument(format!(
            "glucose value must be a positive number, got {}",
            value
        )));
    }

    let range = match mode {
        ClassificationMode::ThreeWay => {
            if value < bounds.target_lower_bound {
                GlucoseRange::Low
            } else if value > bounds.target_upper_bound {
                GlucoseRange::High
            } else {
                GlucoseRange::Target
            }
        }
        ClassificationMode::FiveWay => {
            if value < bounds.very_low_threshold {
                GlucoseRange::VeryLow
            } else if value < bounds.target_lower_bound {
                GlucoseRange::Low
            } else if value <= bounds.target_upper_bound {
                GlucoseRange::Target
            } else if value <= bounds.very_high_threshold {
                GlucoseRange::High
            } else {
                GlucoseRange::VeryHigh
            }
        }
    };

    Ok(range)
}

/// Nominal sampling interval (ms) of a CGM reading's device family
///
/// Used as the duration weight of one sample. `None` for non-CGM events.
pub fn sampling_interval(event: &Event) -> Option<i64> {
    match &event.data {
        EventData::Cbg(_) => {
            let device = event.device_id.as_deref().unwrap_or_default();
            let interval = CGM_SAMPLING_INTERVALS
                .iter()
                .find(|(prefix, _)| device.starts_with(*prefix))
                .map(|(_, interval)| *interval)
                .unwrap_or(DEFAULT_CGM_SAMPLING_INTERVAL);
            Some(interval)
        }
        _ => None,
    }
}

/// Which glucose kind the glucose statistics read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BgSource {
    /// Continuous glucose monitor
    Cbg,
    /// Fingerstick meter
    Smbg,
}

impl BgSource {
    pub fn kind(self) -> EventKind {
        match self {
            BgSource::Cbg => EventKind::Cbg,
            BgSource::Smbg => EventKind::Smbg,
        }
    }
}

impl fmt::Display for BgSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

impl FromStr for BgSource {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbg" => Ok(BgSource::Cbg),
            "smbg" => Ok(BgSource::Smbg),
            other => Err(StatsError::InvalidArgument(format!(
                "unknown bg source '{}' (expected cbg or smbg)",
                other
            ))),
        }
    }
}
