//! Clinical event types
//!
//! Every record ingested by the engine is an `Event`: the shared temporal
//! fields plus one `EventData` variant per clinical kind.
//!
//! The JSON shape mirrors diabetes device exports:
//!
//! ```json
//! { "type": "basal", "normalTime": "2018-02-01T01:00:00Z",
//!   "deliveryType": "scheduled", "rate": 0.25, "duration": 3600000 }
//! ```

use crate::events::time::ONE_HOUR;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminant of an event, used as the by-kind index key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Continuous glucose monitor sample
    Cbg,
    /// Self-monitored (fingerstick meter) glucose reading
    Smbg,
    /// Basal insulin delivery segment
    Basal,
    /// Bolus insulin dose
    Bolus,
    /// Bolus calculator entry (carries carb input)
    Wizard,
    /// Logged food intake
    Food,
    /// Device upload record
    Upload,
}

impl EventKind {
    /// Get all kinds for iteration
    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::Cbg,
            EventKind::Smbg,
            EventKind::Basal,
            EventKind::Bolus,
            EventKind::Wizard,
            EventKind::Food,
            EventKind::Upload,
        ]
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Cbg => write!(f, "cbg"),
            EventKind::Smbg => write!(f, "smbg"),
            EventKind::Basal => write!(f, "basal"),
            EventKind::Bolus => write!(f, "bolus"),
            EventKind::Wizard => write!(f, "wizard"),
            EventKind::Food => write!(f, "food"),
            EventKind::Upload => write!(f, "upload"),
        }
    }
}

/// A single time-stamped clinical record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Upstream record identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Canonical, ascending-sortable timestamp
    pub normal_time: DateTime<Utc>,
    /// Identifier of the device that produced the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Kind-specific payload
    #[serde(flatten)]
    pub data: EventData,
}

/// Kind-specific payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventData {
    Cbg(GlucoseReading),
    Smbg(GlucoseReading),
    Basal(BasalDelivery),
    Bolus(BolusDelivery),
    Wizard(WizardEntry),
    Food(FoodEntry),
    Upload(DeviceUpload),
}

/// Glucose value in the engine's configured units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// NaN when the export omits it
    #[serde(default = "missing_value")]
    pub value: f64,
}

fn missing_value() -> f64 {
    f64::NAN
}

/// How a basal segment was programmed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    #[default]
    Scheduled,
    Temp,
    Suspend,
    Automated,
}

/// Basal delivery: `rate` U/hr for `duration` ms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasalDelivery {
    /// Units per hour; absent for suspends
    #[serde(default)]
    pub rate: Option<f64>,
    /// Programmed duration in milliseconds
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub delivery_type: DeliveryType,
}

impl BasalDelivery {
    /// Insulin delivered over `millis` of this segment
    pub fn dose_over(&self, millis: i64) -> f64 {
        self.rate.unwrap_or(0.0) * millis as f64 / ONE_HOUR as f64
    }
}

/// Bolus dose, split into immediate and extended portions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BolusDelivery {
    #[serde(default)]
    pub normal: Option<f64>,
    #[serde(default)]
    pub extended: Option<f64>,
    /// Extended delivery duration in milliseconds
    #[serde(default)]
    pub duration: Option<i64>,
}

impl BolusDelivery {
    /// Total programmed units; absent portions count as 0
    pub fn units(&self) -> f64 {
        self.normal.unwrap_or(0.0) + self.extended.unwrap_or(0.0)
    }
}

/// Bolus calculator entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardEntry {
    /// Carbohydrates entered, in grams
    #[serde(default)]
    pub carb_input: Option<f64>,
    #[serde(default)]
    pub insulin_carb_ratio: Option<f64>,
    /// Id of the bolus this calculation produced
    #[serde(default)]
    pub bolus: Option<String>,
}

/// Logged food intake
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    #[serde(default)]
    pub nutrition: Option<Nutrition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(default, alias = "carb")]
    pub carbohydrate: Option<Carbohydrate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Carbohydrate {
    #[serde(default)]
    pub net: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
}

impl FoodEntry {
    /// Net carbohydrate grams, 0 when not recorded
    pub fn net_carbs(&self) -> f64 {
        self.nutrition
            .as_ref()
            .and_then(|n| n.carbohydrate.as_ref())
            .and_then(|c| c.net)
            .unwrap_or(0.0)
    }
}

/// Device upload record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpload {
    #[serde(default)]
    pub device_manufacturers: Vec<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    /// e.g. "insulin-pump", "cgm", "bgm"
    #[serde(default)]
    pub device_tags: Vec<String>,
}

impl DeviceUpload {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.device_tags.iter().any(|t| t == tag)
    }
}

impl Event {
    /// Create an event at a specific instant
    pub fn new(normal_time: DateTime<Utc>, data: EventData) -> Self {
        Self {
            id: None,
            normal_time,
            device_id: None,
            data,
        }
    }

    pub fn cbg(normal_time: DateTime<Utc>, value: f64) -> Self {
        Self::new(normal_time, EventData::Cbg(GlucoseReading { value }))
    }

    pub fn smbg(normal_time: DateTime<Utc>, value: f64) -> Self {
        Self::new(normal_time, EventData::Smbg(GlucoseReading { value }))
    }

    pub fn basal(
        normal_time: DateTime<Utc>,
        rate: f64,
        duration: i64,
        delivery_type: DeliveryType,
    ) -> Self {
        Self::new(
            normal_time,
            EventData::Basal(BasalDelivery {
                rate: Some(rate),
                duration,
                delivery_type,
            }),
        )
    }

    pub fn bolus(normal_time: DateTime<Utc>, normal: f64) -> Self {
        Self::new(
            normal_time,
            EventData::Bolus(BolusDelivery {
                normal: Some(normal),
                ..Default::default()
            }),
        )
    }

    pub fn wizard(normal_time: DateTime<Utc>, carb_input: f64) -> Self {
        Self::new(
            normal_time,
            EventData::Wizard(WizardEntry {
                carb_input: Some(carb_input),
                ..Default::default()
            }),
        )
    }

    pub fn food(normal_time: DateTime<Utc>, net_carbs: f64) -> Self {
        Self::new(
            normal_time,
            EventData::Food(FoodEntry {
                nutrition: Some(Nutrition {
                    carbohydrate: Some(Carbohydrate {
                        net: Some(net_carbs),
                        units: Some("grams".to_string()),
                    }),
                }),
            }),
        )
    }

    /// Builder method: set the record id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method: set the producing device
    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        match &self.data {
            EventData::Cbg(_) => EventKind::Cbg,
            EventData::Smbg(_) => EventKind::Smbg,
            EventData::Basal(_) => EventKind::Basal,
            EventData::Bolus(_) => EventKind::Bolus,
            EventData::Wizard(_) => EventKind::Wizard,
            EventData::Food(_) => EventKind::Food,
            EventData::Upload(_) => EventKind::Upload,
        }
    }

    /// Unix timestamp in milliseconds
    pub fn timestamp(&self) -> i64 {
        self.normal_time.timestamp_millis()
    }

    /// Duration in milliseconds, for kinds whose effect spans an interval
    pub fn duration(&self) -> Option<i64> {
        match &self.data {
            EventData::Basal(basal) => Some(basal.duration),
            _ => None,
        }
    }

    /// Glucose value for cbg/smbg records
    pub fn glucose_value(&self) -> Option<f64> {
        match &self.data {
            EventData::Cbg(reading) | EventData::Smbg(reading) => Some(reading.value),
            _ => None,
        }
    }
}
