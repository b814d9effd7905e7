//! Glycostat Event Model
//!
//! - **types**: `Event` and the per-kind payloads (cbg, smbg, basal, bolus, wizard, food, upload)
//! - **time**: `TimeRange` windows, `ActiveDays`, millisecond constants, weekday extraction
//! - **loader**: JSON export import
//! - **error**: Error types
//!
//! Events are immutable once handed to the engine; every derived view
//! (index keys, clipped durations, sums) is computed from them without mutation.

pub mod error;
pub mod loader;
pub mod time;
pub mod types;

pub use error::{EventError, EventResult};
pub use loader::{load_events, read_events, LoadReport};
pub use time::{weekday_index, ActiveDays, TimeRange, ONE_DAY, ONE_HOUR, ONE_MINUTE};
pub use types::{
    BasalDelivery, BolusDelivery, Carbohydrate, DeliveryType, DeviceUpload, Event, EventData,
    EventKind, FoodEntry, GlucoseReading, Nutrition, WizardEntry,
};
