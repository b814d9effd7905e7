//! JSON event import
//!
//! Reads a device export (a JSON array of event objects). Entries that fail
//! to deserialize are skipped and reported rather than aborting the import.

use crate::events::error::{EventError, EventResult};
use crate::events::types::Event;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Result of an import operation
#[derive(Debug, Default)]
pub struct LoadReport {
    pub events: Vec<Event>,
    /// Number of array entries that could not be parsed
    pub skipped: usize,
    /// One message per skipped entry, `"entry {idx}: {error}"`
    pub errors: Vec<String>,
}

/// Load events from a JSON file
pub fn load_events(path: &Path) -> EventResult<LoadReport> {
    let file = File::open(path)?;
    let report = read_events(BufReader::new(file))?;

    tracing::info!(
        "Loaded {} events from {:?} ({} skipped)",
        report.events.len(),
        path,
        report.skipped
    );

    Ok(report)
}

/// Read events from any JSON source
pub fn read_events<R: Read>(reader: R) -> EventResult<LoadReport> {
    let document: serde_json::Value = serde_json::from_reader(reader)?;

    let entries = match document {
        serde_json::Value::Array(entries) => entries,
        other => {
            return Err(EventError::Serialization(format!(
                "expected a JSON array of events, found {}",
                json_type_name(&other)
            )))
        }
    };

    let mut report = LoadReport::default();
    for (idx, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Event>(entry) {
            Ok(event) => report.events.push(event),
            Err(e) => {
                tracing::warn!("Skipping event {}: {}", idx, e);
                report.skipped += 1;
                report.errors.push(format!("entry {}: {}", idx, e));
            }
        }
    }

    Ok(report)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
