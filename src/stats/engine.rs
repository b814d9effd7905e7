//! Statistics Engine - window-scoped glycemic and insulin statistics
//!
//! Every query follows the same path:
//!
//! ```text
//! apply_date_filters(window, active_days)   → effective_days
//!        ↓
//! by_kind(kind) [+ basal overlap resolution]
//!        ↓
//! reduce → result record
//! ```
//!
//! Queries take `&mut self`: they rewrite the shared session predicates, so
//! a query cannot start while another is reading the same engine.

use crate::events::{ActiveDays, DeliveryType, Event, EventData, EventKind, TimeRange, ONE_DAY};
use crate::index::{EventIndex, IndexStats, QuerySession};
use crate::stats::classify::{
    classify_glucose, sampling_interval, BgSource, ClassificationMode, GlucoseBounds,
    GlucoseUnits, DEFAULT_CGM_SAMPLING_INTERVAL,
};
use crate::stats::error::{StatsError, StatsResult};
use crate::stats::overlap::{duration_in_range, resolve_overlapping_start};
use crate::stats::results::{
    AverageGlucose, BasalBolus, BgSources, Carbs, CoefficientOfVariation,
    GlucoseManagementIndicator, PumpInfo, RangeBuckets, ReadingsInRange, SensorUsage,
    StandardDeviation, StatKind, StatRecord, TimeInAuto, TimeInRange, TotalInsulin,
};
use chrono_tz::Tz;

/// Fewest samples for which standard deviation and CV are reported
pub const STDDEV_MIN_SAMPLES: usize = 3;

/// Shortest effective window, in days, for which GMI is reported
pub const GMI_MIN_DAYS: f64 = 14.0;

/// Share of `GMI_MIN_DAYS` that CGM samples must cover
pub const GMI_MIN_CGM_COVERAGE: f64 = 0.7;

/// Upload tag identifying an insulin pump
const INSULIN_PUMP_TAG: &str = "insulin-pump";

/// Medtronic models that can run automated basal
const AUTOMATED_DELIVERY_MODELS: &[&str] = &["1580", "1581", "1582", "1780", "1781", "1782"];

/// Construction parameters for `StatsEngine`
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub window: TimeRange,
    pub active_days: ActiveDays,
    /// Pinned glucose source; `None` picks cbg when available
    pub bg_source: Option<BgSource>,
    /// Classification bounds; `None` uses the defaults for `glucose_units`
    pub glucose_bounds: Option<GlucoseBounds>,
    pub glucose_units: GlucoseUnits,
    /// IANA timezone for weekday extraction
    pub timezone_name: String,
}

impl EngineOptions {
    pub fn new(window: TimeRange) -> Self {
        Self {
            window,
            active_days: ActiveDays::all(),
            bg_source: None,
            glucose_bounds: None,
            glucose_units: GlucoseUnits::default(),
            timezone_name: "UTC".to_string(),
        }
    }

    pub fn active_days(mut self, days: ActiveDays) -> Self {
        self.active_days = days;
        self
    }

    pub fn bg_source(mut self, source: BgSource) -> Self {
        self.bg_source = Some(source);
        self
    }

    pub fn glucose_bounds(mut self, bounds: GlucoseBounds) -> Self {
        self.glucose_bounds = Some(bounds);
        self
    }

    pub fn glucose_units(mut self, units: GlucoseUnits) -> Self {
        self.glucose_units = units;
        self
    }

    pub fn timezone(mut self, name: impl Into<String>) -> Self {
        self.timezone_name = name.into();
        self
    }
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> StatsResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| StatsError::UnknownTimezone(name.to_string()))
}

/// Query engine over one event collection
pub struct StatsEngine {
    index: EventIndex,
    session: QuerySession,
    window: TimeRange,
    active_days: ActiveDays,
    bounds: GlucoseBounds,
    units: GlucoseUnits,
    /// Source pinned by the caller
    pinned_source: Option<BgSource>,
    /// Default source for the current data and window
    default_source: Option<BgSource>,
}

impl StatsEngine {
    /// Index `events` and prepare the engine
    ///
    /// Fails on an unknown timezone or invalid glucose bounds.
    pub fn new(events: Vec<Event>, options: EngineOptions) -> StatsResult<Self> {
        let timezone = parse_timezone(&options.timezone_name)?;
        let bounds = options
            .glucose_bounds
            .unwrap_or_else(|| GlucoseBounds::for_units(options.glucose_units));
        bounds.validate()?;

        let index = EventIndex::build(events, timezone);
        tracing::info!(
            "Stats engine ready: {} events, timezone {}, {:.1} day window",
            index.len(),
            timezone,
            options.window.days()
        );

        Ok(Self {
            index,
            session: QuerySession::new(),
            window: options.window,
            active_days: options.active_days,
            bounds,
            units: options.glucose_units,
            pinned_source: options.bg_source,
            default_source: None,
        })
    }

    // ==================== Mutators ====================

    pub fn set_window(&mut self, window: TimeRange) {
        self.window = window;
        self.default_source = None;
    }

    pub fn set_active_days(&mut self, days: ActiveDays) {
        self.active_days = days;
        self.default_source = None;
    }

    /// Replace the classification bounds and the units they are expressed in
    pub fn set_glucose_bounds(&mut self, bounds: GlucoseBounds, units: GlucoseUnits) -> StatsResult<()> {
        bounds.validate()?;
        self.bounds = bounds;
        self.units = units;
        Ok(())
    }

    /// Pin the glucose source, or `None` to return to the default
    pub fn set_bg_source(&mut self, source: Option<BgSource>) {
        self.pinned_source = source;
    }

    pub fn add_events<I: IntoIterator<Item = Event>>(&mut self, events: I) -> usize {
        let added = self.index.add(events);
        self.default_source = None;
        added
    }

    pub fn remove_events<F: FnMut(&Event) -> bool>(&mut self, predicate: F) -> usize {
        let removed = self.index.remove(predicate);
        self.default_source = None;
        removed
    }

    // ==================== Accessors ====================

    pub fn window(&self) -> TimeRange {
        self.window
    }

    pub fn active_days(&self) -> &ActiveDays {
        &self.active_days
    }

    pub fn glucose_bounds(&self) -> GlucoseBounds {
        self.bounds
    }

    pub fn glucose_units(&self) -> GlucoseUnits {
        self.units
    }

    pub fn timezone(&self) -> Tz {
        self.index.timezone()
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    // ==================== Filtering ====================

    /// In-window events of one kind plus the effective day count
    fn query(&mut self, kind: EventKind) -> (Vec<&Event>, f64) {
        let days = self.session.apply_date_filters(self.window, &self.active_days);
        self.session.by_kind(kind);
        (self.session.records(&self.index), days)
    }

    /// In-window basal segments, including one running in from before the window
    fn basal_query(&mut self) -> (Vec<&Event>, f64) {
        let window = self.window;
        let days = self.session.apply_date_filters(window, &self.active_days);
        self.session.by_kind(EventKind::Basal);
        let in_window = self.session.records(&self.index);
        let basals = resolve_overlapping_start(
            &self.index,
            &mut self.session,
            window,
            EventKind::Basal,
            in_window,
        );
        (basals, days)
    }

    fn glucose_values(&mut self, source: BgSource) -> Vec<f64> {
        let (records, _) = self.query(source.kind());
        records.iter().filter_map(|e| e.glucose_value()).collect()
    }

    // ==================== Glucose Source ====================

    /// The glucose source queries read: the pinned one, else cbg when the
    /// window holds any cbg samples, else smbg
    pub fn bg_source(&mut self) -> BgSource {
        if let Some(source) = self.pinned_source {
            return source;
        }
        if let Some(source) = self.default_source {
            return source;
        }

        let (cbg, _) = self.query(EventKind::Cbg);
        let source = if cbg.is_empty() {
            BgSource::Smbg
        } else {
            BgSource::Cbg
        };
        tracing::debug!(source = %source, "Selected default bg source");

        self.default_source = Some(source);
        source
    }

    /// Availability of each glucose source in the window
    pub fn bg_sources(&mut self) -> BgSources {
        let cbg = !self.query(EventKind::Cbg).0.is_empty();
        let smbg = !self.query(EventKind::Smbg).0.is_empty();
        BgSources {
            cbg,
            smbg,
            current: self.bg_source(),
        }
    }

    // ==================== Glucose Statistics ====================

    pub fn average_glucose(&mut self) -> AverageGlucose {
        let source = self.bg_source();
        let values = self.glucose_values(source);
        let total = values.len();

        AverageGlucose {
            average_glucose: mean(&values),
            total,
            insufficient_data: total == 0,
        }
    }

    pub fn standard_deviation(&mut self) -> StandardDeviation {
        let source = self.bg_source();
        let values = self.glucose_values(source);
        let total = values.len();
        let average = mean(&values);
        let insufficient_data = total < STDDEV_MIN_SAMPLES;

        StandardDeviation {
            average_glucose: average,
            standard_deviation: if insufficient_data {
                f64::NAN
            } else {
                sample_std_dev(&values, average)
            },
            total,
            insufficient_data,
        }
    }

    pub fn coefficient_of_variation(&mut self) -> CoefficientOfVariation {
        let sd = self.standard_deviation();
        CoefficientOfVariation {
            coefficient_of_variation: if sd.insufficient_data {
                f64::NAN
            } else {
                sd.standard_deviation / sd.average_glucose * 100.0
            },
            total: sd.total,
            insufficient_data: sd.insufficient_data,
        }
    }

    /// GMI (%) = 3.31 + 0.02392 × mean glucose in mg/dL
    ///
    /// Reported only for a cbg source over at least `GMI_MIN_DAYS` effective
    /// days, with samples covering `GMI_MIN_CGM_COVERAGE` of that span.
    pub fn glucose_management_indicator(&mut self) -> GlucoseManagementIndicator {
        let source = self.bg_source();
        let units = self.units;
        let (cbg, days) = self.query(EventKind::Cbg);

        let total = cbg.len();
        let sampled: i64 = cbg.iter().filter_map(|e| sampling_interval(e)).sum();
        let values: Vec<f64> = cbg.iter().filter_map(|e| e.glucose_value()).collect();
        let required = GMI_MIN_CGM_COVERAGE * GMI_MIN_DAYS * ONE_DAY as f64;

        let insufficient_data = source != BgSource::Cbg
            || total == 0
            || days < GMI_MIN_DAYS
            || (sampled as f64) < required;

        let gmi = if insufficient_data {
            f64::NAN
        } else {
            3.31 + 0.02392 * units.to_mgdl(mean(&values))
        };

        GlucoseManagementIndicator {
            glucose_management_indicator: gmi,
            total,
            insufficient_data,
        }
    }

    /// CGM time per range, weighted by each sample's sampling interval
    ///
    /// Windows longer than one day report each range as its share of a day.
    pub fn time_in_range(&mut self) -> StatsResult<TimeInRange> {
        let bounds = self.bounds;
        let (cbg, days) = self.query(EventKind::Cbg);

        let mut buckets = RangeBuckets::default();
        for event in &cbg {
            let Some(value) = event.glucose_value() else {
                continue;
            };
            let range = classify_glucose(&bounds, value, ClassificationMode::FiveWay)?;
            let weight = sampling_interval(event).unwrap_or(DEFAULT_CGM_SAMPLING_INTERVAL);
            buckets.add(range, weight as f64);
        }

        let insufficient_data = buckets.total == 0.0;
        if days > 1.0 && !insufficient_data {
            buckets = buckets.per_day();
        }

        Ok(TimeInRange::from_buckets(buckets, insufficient_data))
    }

    /// Meter reading counts per range
    pub fn readings_in_range(&mut self) -> StatsResult<ReadingsInRange> {
        let bounds = self.bounds;
        let (smbg, days) = self.query(EventKind::Smbg);

        let mut counts = RangeBuckets::default();
        for value in smbg.iter().filter_map(|e| e.glucose_value()) {
            let range = classify_glucose(&bounds, value, ClassificationMode::FiveWay)?;
            counts.add(range, 1.0);
        }

        let daily_average = (days > 1.0).then(|| counts.scaled(1.0 / days));
        Ok(ReadingsInRange {
            counts,
            daily_average,
        })
    }

    pub fn sensor_usage(&mut self) -> SensorUsage {
        let (cbg, days) = self.query(EventKind::Cbg);
        let sampled: i64 = cbg.iter().filter_map(|e| sampling_interval(e)).sum();

        SensorUsage {
            sensor_usage: sampled as f64 / (days * ONE_DAY as f64),
            sampled_duration: sampled,
            total: cbg.len(),
        }
    }

    // ==================== Insulin & Carbs ====================

    /// Basal and bolus units; NaN for a side with no events
    pub fn basal_bolus(&mut self) -> BasalBolus {
        let window = self.window;

        let (basals, days) = self.basal_query();
        let basal_count = basals.len();
        let basal = if basals.is_empty() {
            f64::NAN
        } else {
            basals.iter().map(|e| basal_units(e, &window)).sum()
        };

        let (boluses, _) = self.query(EventKind::Bolus);
        let bolus_count = boluses.len();
        let bolus = if boluses.is_empty() {
            f64::NAN
        } else {
            boluses
                .iter()
                .map(|e| match &e.data {
                    EventData::Bolus(b) => b.units(),
                    _ => 0.0,
                })
                .sum()
        };

        let per_day = if days > 1.0 { days } else { 1.0 };
        BasalBolus {
            basal: basal / per_day,
            bolus: bolus / per_day,
            total: basal_count + bolus_count,
        }
    }

    /// Basal time split by automated vs. every other delivery type
    pub fn time_in_auto(&mut self) -> TimeInAuto {
        let window = self.window;
        let (basals, days) = self.basal_query();

        let mut automated = 0i64;
        let mut manual = 0i64;
        for event in &basals {
            let EventData::Basal(basal) = &event.data else {
                continue;
            };
            let clipped = duration_in_range(event.timestamp(), basal.duration, &window);
            if basal.delivery_type == DeliveryType::Automated {
                automated += clipped;
            } else {
                manual += clipped;
            }
        }

        let insufficient_data = basals.is_empty();
        let (mut automated, mut manual) = (automated as f64, manual as f64);
        let mut total = automated + manual;
        if days > 1.0 && total > 0.0 {
            let factor = ONE_DAY as f64 / total;
            automated *= factor;
            manual *= factor;
            total = ONE_DAY as f64;
        }

        TimeInAuto {
            automated,
            manual,
            total,
            insufficient_data,
        }
    }

    /// Wizard carb input plus logged food net carbs
    pub fn carbs(&mut self) -> Carbs {
        let (wizards, days) = self.query(EventKind::Wizard);
        let mut total = wizards.len();
        let mut carbs: f64 = wizards
            .iter()
            .map(|e| match &e.data {
                EventData::Wizard(w) => w.carb_input.unwrap_or(0.0),
                _ => 0.0,
            })
            .sum();

        let (foods, _) = self.query(EventKind::Food);
        total += foods.len();
        carbs += foods
            .iter()
            .map(|e| match &e.data {
                EventData::Food(f) => f.net_carbs(),
                _ => 0.0,
            })
            .sum::<f64>();

        if days > 1.0 {
            carbs /= days;
        }

        Carbs { carbs, total }
    }

    /// Basal plus bolus; a side with no events counts as 0
    pub fn total_insulin(&mut self) -> TotalInsulin {
        let ratio = self.basal_bolus();
        let basal = zero_if_nan(ratio.basal);
        let bolus = zero_if_nan(ratio.bolus);

        TotalInsulin {
            total_insulin: basal + bolus,
            basal,
            bolus,
            total: ratio.total,
        }
    }

    // ==================== Devices ====================

    /// Most recent upload tagged as an insulin pump, across all data
    pub fn latest_pump(&self) -> Option<PumpInfo> {
        let uploads = self.index.of_kind(EventKind::Upload);
        uploads.iter().rev().find_map(|event| match &event.data {
            EventData::Upload(upload) if upload.has_tag(INSULIN_PUMP_TAG) => {
                let manufacturer = upload
                    .device_manufacturers
                    .first()
                    .map(|m| m.to_lowercase());
                let automated_delivery = manufacturer.as_deref() == Some("medtronic")
                    && upload
                        .device_model
                        .as_deref()
                        .is_some_and(|model| AUTOMATED_DELIVERY_MODELS.contains(&model));

                Some(PumpInfo {
                    manufacturer,
                    device_model: upload.device_model.clone(),
                    automated_delivery,
                })
            }
            _ => None,
        })
    }

    // ==================== Dispatch ====================

    /// Compute one statistic by kind
    pub fn stat(&mut self, kind: StatKind) -> StatsResult<StatRecord> {
        let record = match kind {
            StatKind::AverageGlucose => StatRecord::AverageGlucose(self.average_glucose()),
            StatKind::StandardDeviation => StatRecord::StandardDeviation(self.standard_deviation()),
            StatKind::CoefficientOfVariation => {
                StatRecord::CoefficientOfVariation(self.coefficient_of_variation())
            }
            StatKind::GlucoseManagementIndicator => {
                StatRecord::GlucoseManagementIndicator(self.glucose_management_indicator())
            }
            StatKind::TimeInRange => StatRecord::TimeInRange(self.time_in_range()?),
            StatKind::ReadingsInRange => StatRecord::ReadingsInRange(self.readings_in_range()?),
            StatKind::SensorUsage => StatRecord::SensorUsage(self.sensor_usage()),
            StatKind::BasalBolus => StatRecord::BasalBolus(self.basal_bolus()),
            StatKind::TimeInAuto => StatRecord::TimeInAuto(self.time_in_auto()),
            StatKind::Carbs => StatRecord::Carbs(self.carbs()),
            StatKind::TotalInsulin => StatRecord::TotalInsulin(self.total_insulin()),
        };
        Ok(record)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1)
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squared / (values.len() - 1) as f64).sqrt()
}

/// Units delivered by a basal segment inside `window`
fn basal_units(event: &Event, window: &TimeRange) -> f64 {
    match &event.data {
        EventData::Basal(basal) => {
            basal.dose_over(duration_in_range(event.timestamp(), basal.duration, window))
        }
        _ => 0.0,
    }
}

fn zero_if_nan(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DeviceUpload, ONE_HOUR, ONE_MINUTE};
    use crate::stats::classify::MGDL_PER_MMOLL;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn time(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 2, d, h, 0, 0).unwrap()
    }

    fn feb(d: u32, days: i64) -> TimeRange {
        let start = time(d, 0);
        TimeRange::between(start, start + Duration::days(days)).unwrap()
    }

    fn engine(events: Vec<Event>, window: TimeRange) -> StatsEngine {
        StatsEngine::new(events, EngineOptions::new(window)).unwrap()
    }

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    /// One cbg sample every five minutes for `days` days from Feb 1
    fn cgm_days(days: u32, value: f64) -> Vec<Event> {
        let start = time(1, 0);
        (0..days as i64 * 288)
            .map(|i| Event::cbg(start + Duration::minutes(5 * i), value))
            .collect()
    }

    fn insulin_day() -> Vec<Event> {
        vec![
            Event::basal(time(1, 1), 0.25, ONE_HOUR, DeliveryType::Scheduled),
            Event::basal(time(1, 2), 0.75, ONE_HOUR, DeliveryType::Scheduled),
            Event::basal(time(1, 3), 0.5, ONE_HOUR, DeliveryType::Scheduled),
            Event::bolus(time(1, 8), 4.0),
            Event::bolus(time(1, 12), 5.0),
            Event::bolus(time(1, 18), 6.0),
        ]
    }

    #[test]
    fn test_basal_bolus_single_day() {
        let mut engine = engine(insulin_day(), feb(1, 1));
        let ratio = engine.basal_bolus();

        assert!(approx(ratio.basal, 1.5, 1e-9));
        assert!(approx(ratio.bolus, 15.0, 1e-9));
        assert_eq!(ratio.total, 6);

        let total = engine.total_insulin();
        assert!(approx(total.total_insulin, 16.5, 1e-9));
    }

    #[test]
    fn test_glucose_variability() {
        let values = [50.0, 60.0, 100.0, 190.0, 260.0];
        let events = values
            .iter()
            .enumerate()
            .map(|(i, v)| Event::cbg(time(1, 2 * i as u32), *v))
            .collect();
        let mut engine = engine(events, feb(1, 1));

        let average = engine.average_glucose();
        assert_eq!(average.average_glucose, 132.0);
        assert_eq!(average.total, 5);

        let sd = engine.standard_deviation();
        assert!(!sd.insufficient_data);
        assert!(approx(sd.standard_deviation, 90.388, 1e-3));

        let cv = engine.coefficient_of_variation();
        assert!(approx(cv.coefficient_of_variation, 68.476, 1e-3));
    }

    #[test]
    fn test_basal_crossing_window_start() {
        let mut events = insulin_day();
        events.push(Event::basal(
            Utc.with_ymd_and_hms(2018, 1, 31, 23, 0, 0).unwrap(),
            1.0,
            2 * ONE_HOUR,
            DeliveryType::Scheduled,
        ));
        let mut engine = engine(events, feb(1, 1));

        // One hour at 1 U/hr is added to scenario A's 1.5 U
        let ratio = engine.basal_bolus();
        assert!(approx(ratio.basal, 2.5, 1e-9));
        assert_eq!(ratio.total, 7);

        let auto = engine.time_in_auto();
        assert_eq!(auto.manual, 4.0 * ONE_HOUR as f64);
    }

    #[test]
    fn test_basal_with_unbounded_duration() {
        let events = vec![Event::basal(
            Utc.with_ymd_and_hms(2018, 1, 31, 23, 0, 0).unwrap(),
            1.0,
            i64::MAX,
            DeliveryType::Automated,
        )];
        let mut engine = engine(events, feb(1, 1));

        // Clipped to the whole window
        let ratio = engine.basal_bolus();
        assert!(approx(ratio.basal, 24.0, 1e-9));
        assert_eq!(ratio.total, 1);

        let auto = engine.time_in_auto();
        assert_eq!(auto.automated, ONE_DAY as f64);
        assert_eq!(auto.manual, 0.0);
    }

    #[test]
    fn test_missing_fields_degrade() {
        let events: Vec<Event> = serde_json::from_str(
            r#"[
            {"type": "smbg", "normalTime": "2018-02-01T08:00:00Z", "value": 120},
            {"type": "smbg", "normalTime": "2018-02-01T12:00:00Z"},
            {"type": "basal", "normalTime": "2018-02-01T01:00:00Z", "rate": 1.0, "duration": 3600000}
        ]"#,
        )
        .unwrap();
        let mut engine = engine(events, feb(1, 1));

        let average = engine.average_glucose();
        assert_eq!(average.total, 2);
        assert!(average.average_glucose.is_nan());

        let auto = engine.time_in_auto();
        assert_eq!(auto.manual, ONE_HOUR as f64);
        assert_eq!(auto.automated, 0.0);
    }

    #[test]
    fn test_basal_starting_at_window_start_counts_fully() {
        let events = vec![Event::basal(time(1, 0), 2.0, 2 * ONE_HOUR, DeliveryType::Scheduled)];
        let mut engine = engine(events, feb(1, 1));
        assert!(approx(engine.basal_bolus().basal, 4.0, 1e-9));
    }

    #[test]
    fn test_basal_bolus_empty_sides_are_nan() {
        let mut engine = engine(vec![Event::bolus(time(1, 8), 3.0)], feb(1, 1));
        let ratio = engine.basal_bolus();
        assert!(ratio.basal.is_nan());
        assert_eq!(ratio.bolus, 3.0);

        let total = engine.total_insulin();
        assert_eq!(total.total_insulin, 3.0);
        assert_eq!(total.basal, 0.0);
    }

    #[test]
    fn test_gmi_requires_fourteen_days() {
        let mut engine = engine(cgm_days(13, 150.0), feb(1, 13));
        let gmi = engine.glucose_management_indicator();
        assert!(gmi.insufficient_data);
        assert!(gmi.glucose_management_indicator.is_nan());
    }

    #[test]
    fn test_gmi_requires_coverage() {
        // 9 of 14 days worn: 64% coverage
        let mut engine = engine(cgm_days(9, 150.0), feb(1, 14));
        assert!(engine.glucose_management_indicator().insufficient_data);
    }

    #[test]
    fn test_gmi_with_full_coverage() {
        let mut engine = engine(cgm_days(14, 150.0), feb(1, 14));
        let gmi = engine.glucose_management_indicator();

        assert!(!gmi.insufficient_data);
        assert!(approx(gmi.glucose_management_indicator, 3.31 + 0.02392 * 150.0, 1e-9));

        // Same data in mmol/L gives the same indicator
        let mmol: Vec<Event> = cgm_days(14, 150.0 / MGDL_PER_MMOLL);
        let options = EngineOptions::new(feb(1, 14)).glucose_units(GlucoseUnits::MmolL);
        let mut engine = StatsEngine::new(mmol, options).unwrap();
        let gmi_mmol = engine.glucose_management_indicator();
        assert!(approx(gmi_mmol.glucose_management_indicator, gmi.glucose_management_indicator, 1e-9));
    }

    #[test]
    fn test_gmi_requires_cbg_source() {
        let options = EngineOptions::new(feb(1, 14)).bg_source(BgSource::Smbg);
        let mut engine = StatsEngine::new(cgm_days(14, 150.0), options).unwrap();
        assert!(engine.glucose_management_indicator().insufficient_data);
    }

    #[test]
    fn test_time_in_range_single_day() {
        let events = vec![
            Event::cbg(time(1, 1), 50.0),
            Event::cbg(time(1, 2), 100.0),
            Event::cbg(time(1, 3), 120.0),
            Event::cbg(time(1, 4), 200.0).device("AbbottFreeStyleLibre_XYZ"),
        ];
        let mut engine = engine(events, feb(1, 1));
        let tir = engine.time_in_range().unwrap();

        assert_eq!(tir.very_low, (5 * ONE_MINUTE) as f64);
        assert_eq!(tir.target, (10 * ONE_MINUTE) as f64);
        assert_eq!(tir.high, (15 * ONE_MINUTE) as f64);
        assert_eq!(tir.total, (30 * ONE_MINUTE) as f64);
        assert!(!tir.insufficient_data);
    }

    #[test]
    fn test_time_in_range_multi_day_is_per_day() {
        let mut events = cgm_days(2, 100.0);
        events.extend((0..96).map(|i| {
            Event::cbg(time(2, 0) + Duration::minutes(15 * i), 300.0).device("AbbottFreeStyleLibre_X")
        }));
        let mut engine = engine(events, feb(1, 2));
        let tir = engine.time_in_range().unwrap();

        assert!(approx(tir.total, ONE_DAY as f64, 1e-3));
        let sum = tir.very_low + tir.low + tir.target + tir.high + tir.very_high;
        assert!(approx(sum, tir.total, 1e-3));
        // 2 days of target at 5 min, 1 day of very high at 15 min
        assert!(approx(tir.target, 2.0 / 3.0 * ONE_DAY as f64, 1e-3));
    }

    #[test]
    fn test_time_in_range_without_samples() {
        let mut engine = engine(Vec::new(), feb(1, 7));
        let tir = engine.time_in_range().unwrap();
        assert!(tir.insufficient_data);
        assert_eq!(tir.total, 0.0);
    }

    #[test]
    fn test_time_in_range_rejects_invalid_values() {
        let mut engine = engine(vec![Event::cbg(time(1, 1), -4.0)], feb(1, 1));
        assert!(matches!(engine.time_in_range(), Err(StatsError::InvalidArgument(_))));
    }

    #[test]
    fn test_readings_in_range() {
        let events = vec![
            Event::smbg(time(1, 7), 60.0),
            Event::smbg(time(1, 12), 110.0),
            Event::smbg(time(2, 7), 130.0),
            Event::smbg(time(2, 12), 400.0),
        ];
        let mut engine = engine(events, feb(1, 2));
        let readings = engine.readings_in_range().unwrap();

        assert_eq!(readings.counts.low, 1.0);
        assert_eq!(readings.counts.target, 2.0);
        assert_eq!(readings.counts.very_high, 1.0);
        assert_eq!(readings.counts.total, 4.0);

        let daily = readings.daily_average.unwrap();
        assert_eq!(daily.target, 1.0);
        assert_eq!(daily.total, 2.0);

        engine.set_window(feb(1, 1));
        assert!(engine.readings_in_range().unwrap().daily_average.is_none());
    }

    #[test]
    fn test_sensor_usage() {
        let mut engine = engine(cgm_days(7, 120.0), feb(1, 14));
        let usage = engine.sensor_usage();

        assert!(approx(usage.sensor_usage, 0.5, 1e-9));
        assert_eq!(usage.sampled_duration, 7 * ONE_DAY);
        assert_eq!(usage.total, 7 * 288);
    }

    #[test]
    fn test_time_in_auto() {
        let events = vec![
            Event::basal(time(1, 0), 1.0, 6 * ONE_HOUR, DeliveryType::Automated),
            Event::basal(time(1, 6), 1.0, 18 * ONE_HOUR, DeliveryType::Scheduled),
            Event::basal(time(2, 0), 1.0, 12 * ONE_HOUR, DeliveryType::Automated),
            Event::basal(time(2, 12), 1.0, 12 * ONE_HOUR, DeliveryType::Temp),
        ];

        let mut engine = engine(events, feb(1, 1));
        let day = engine.time_in_auto();
        assert_eq!(day.automated, (6 * ONE_HOUR) as f64);
        assert_eq!(day.manual, (18 * ONE_HOUR) as f64);
        assert!(!day.insufficient_data);

        engine.set_window(feb(1, 2));
        let two_days = engine.time_in_auto();
        assert!(approx(two_days.automated, (9 * ONE_HOUR) as f64, 1e-6));
        assert!(approx(two_days.manual, (15 * ONE_HOUR) as f64, 1e-6));
        assert_eq!(two_days.total, ONE_DAY as f64);

        engine.set_window(feb(10, 1));
        assert!(engine.time_in_auto().insufficient_data);
    }

    #[test]
    fn test_carbs() {
        let events = vec![
            Event::wizard(time(1, 8), 45.0),
            Event::food(time(1, 12), 30.0),
            Event::wizard(time(2, 8), 60.0),
            Event::food(time(2, 12), 25.0),
        ];
        let mut engine = engine(events, feb(1, 1));
        let day = engine.carbs();
        assert_eq!(day.carbs, 75.0);
        assert_eq!(day.total, 2);

        engine.set_window(feb(1, 2));
        let two_days = engine.carbs();
        assert_eq!(two_days.carbs, 80.0);
        assert_eq!(two_days.total, 4);
    }

    #[test]
    fn test_default_bg_source() {
        let mut engine = engine(
            vec![Event::smbg(time(1, 8), 100.0), Event::cbg(time(2, 8), 150.0)],
            feb(1, 1),
        );
        assert_eq!(engine.bg_source(), BgSource::Smbg);
        assert_eq!(engine.average_glucose().average_glucose, 100.0);

        // Window change invalidates the cached default
        engine.set_window(feb(1, 2));
        assert_eq!(engine.bg_source(), BgSource::Cbg);
        assert_eq!(engine.average_glucose().average_glucose, 150.0);

        let sources = engine.bg_sources();
        assert!(sources.cbg && sources.smbg);
        assert_eq!(sources.current, BgSource::Cbg);

        engine.remove_events(|e| e.kind() == EventKind::Cbg);
        assert_eq!(engine.bg_source(), BgSource::Smbg);

        engine.add_events(vec![Event::cbg(time(1, 9), 200.0)]);
        assert_eq!(engine.bg_source(), BgSource::Cbg);
    }

    #[test]
    fn test_pinned_bg_source_changes_sample_set() {
        let mut engine = engine(
            vec![
                Event::smbg(time(1, 8), 100.0),
                Event::cbg(time(1, 9), 150.0),
                Event::cbg(time(1, 10), 170.0),
            ],
            feb(1, 1),
        );
        assert_eq!(engine.average_glucose().average_glucose, 160.0);

        engine.set_bg_source(Some(BgSource::Smbg));
        let average = engine.average_glucose();
        assert_eq!(average.average_glucose, 100.0);
        assert_eq!(average.total, 1);

        engine.set_bg_source(None);
        assert_eq!(engine.average_glucose().total, 2);
    }

    #[test]
    fn test_active_days_scale_effective_days() {
        // Feb 4 2018 is a Sunday; weekends only over two weeks = 4 effective days
        let mut events = Vec::new();
        for d in 4..18 {
            events.push(Event::bolus(time(d, 12), 7.0));
        }
        let options = EngineOptions::new(feb(4, 14)).active_days(ActiveDays::from_indices([0, 6]).unwrap());
        let mut engine = StatsEngine::new(events, options).unwrap();

        let ratio = engine.basal_bolus();
        assert_eq!(ratio.total, 4);
        assert!(approx(ratio.bolus, 7.0, 1e-9));
    }

    #[test]
    fn test_latest_pump() {
        let upload = |d: u32, manufacturer: &str, model: &str| {
            Event::new(
                time(d, 0),
                EventData::Upload(DeviceUpload {
                    device_manufacturers: vec![manufacturer.to_string()],
                    device_model: Some(model.to_string()),
                    device_tags: vec![INSULIN_PUMP_TAG.to_string()],
                }),
            )
        };
        let cgm_upload = Event::new(
            time(5, 0),
            EventData::Upload(DeviceUpload {
                device_manufacturers: vec!["Dexcom".to_string()],
                device_model: None,
                device_tags: vec!["cgm".to_string()],
            }),
        );

        let engine = engine(
            vec![upload(1, "Insulet", "Eros"), upload(3, "Medtronic", "1780"), cgm_upload],
            feb(20, 1),
        );
        let pump = engine.latest_pump().unwrap();
        assert_eq!(pump.manufacturer.as_deref(), Some("medtronic"));
        assert_eq!(pump.device_model.as_deref(), Some("1780"));
        assert!(pump.automated_delivery);

        let none = StatsEngine::new(Vec::new(), EngineOptions::new(feb(1, 1))).unwrap();
        assert!(none.latest_pump().is_none());
    }

    #[test]
    fn test_construction_errors() {
        let result = StatsEngine::new(Vec::new(), EngineOptions::new(feb(1, 1)).timezone("Mars/Base"));
        assert!(matches!(result, Err(StatsError::UnknownTimezone(_))));

        let bounds = GlucoseBounds {
            target_lower_bound: 200.0,
            target_upper_bound: 100.0,
            ..GlucoseBounds::default()
        };
        let result = StatsEngine::new(Vec::new(), EngineOptions::new(feb(1, 1)).glucose_bounds(bounds));
        assert!(matches!(result, Err(StatsError::InvalidArgument(_))));

        let mut engine = engine(Vec::new(), feb(1, 1));
        assert!(engine.set_glucose_bounds(bounds, GlucoseUnits::MgDl).is_err());
        assert!(engine
            .set_glucose_bounds(GlucoseBounds::for_units(GlucoseUnits::MmolL), GlucoseUnits::MmolL)
            .is_ok());
        assert_eq!(engine.glucose_units(), GlucoseUnits::MmolL);
    }

    #[test]
    fn test_index_stats() {
        let mut events = insulin_day();
        events.push(Event::cbg(time(3, 6), 110.0));
        let engine = engine(events, feb(1, 1));

        let stats = engine.index_stats();
        assert_eq!(stats.total_events, 7);
        assert!(stats.events_by_kind.contains(&(EventKind::Basal, 3)));
        assert!(stats.events_by_kind.contains(&(EventKind::Cbg, 1)));
        // Thursday and Saturday
        assert_eq!(stats.weekdays_covered, 2);
        assert_eq!(
            stats.time_bounds,
            Some((time(1, 1).timestamp_millis(), time(3, 6).timestamp_millis()))
        );
    }

    #[test]
    fn test_stat_dispatch() {
        let mut engine = engine(insulin_day(), feb(1, 1));
        for kind in StatKind::all() {
            let record = engine.stat(*kind).unwrap();
            assert_eq!(record.kind(), *kind);
        }
    }

    proptest! {
        #[test]
        fn prop_time_in_range_partitions_total(
            values in prop::collection::vec(1.0f64..500.0, 0..200),
            days in 1i64..5,
        ) {
            let events: Vec<Event> = values
                .iter()
                .enumerate()
                .map(|(i, v)| Event::cbg(time(1, 0) + Duration::minutes(7 * i as i64), *v))
                .collect();
            let mut engine = engine(events, feb(1, days));
            let tir = engine.time_in_range().unwrap();

            let sum = tir.very_low + tir.low + tir.target + tir.high + tir.very_high;
            prop_assert!((sum - tir.total).abs() < 1e-3);
        }

        #[test]
        fn prop_stddev_needs_three_samples(values in prop::collection::vec(1.0f64..500.0, 0..8)) {
            let events: Vec<Event> = values
                .iter()
                .enumerate()
                .map(|(i, v)| Event::smbg(time(1, i as u32), *v))
                .collect();
            let mut engine = engine(events, feb(1, 1));

            let sd = engine.standard_deviation();
            let cv = engine.coefficient_of_variation();
            prop_assert_eq!(sd.insufficient_data, values.len() < STDDEV_MIN_SAMPLES);
            prop_assert_eq!(cv.insufficient_data, values.len() < STDDEV_MIN_SAMPLES);
            prop_assert_eq!(sd.standard_deviation.is_nan(), values.len() < STDDEV_MIN_SAMPLES);
        }

        #[test]
        fn prop_daily_bolus_is_raw_sum_over_days(
            doses in prop::collection::vec(0.1f64..20.0, 1..40),
            days in 2i64..8,
        ) {
            let span = days * ONE_DAY;
            let step = span / doses.len() as i64;
            let events: Vec<Event> = doses
                .iter()
                .enumerate()
                .map(|(i, u)| Event::bolus(time(1, 0) + Duration::milliseconds(step * i as i64), *u))
                .collect();
            let mut engine = engine(events, feb(1, days));

            let raw: f64 = doses.iter().sum();
            let ratio = engine.basal_bolus();
            prop_assert!((ratio.bolus - raw / days as f64).abs() < 1e-9);
        }

        #[test]
        fn prop_daily_basal_and_carbs_scale_by_active_days(
            rates in prop::collection::vec(0.1f64..3.0, 14),
            grams in prop::collection::vec(5.0f64..120.0, 14),
            weekdays in prop::collection::btree_set(0u8..7, 1..7),
        ) {
            // One 1h basal and one wizard entry at noon on each of 14 days
            let mut events = Vec::new();
            for d in 0..14 {
                let noon = time(1, 12) + Duration::days(d as i64);
                events.push(Event::basal(noon, rates[d], ONE_HOUR, DeliveryType::Scheduled));
                events.push(Event::wizard(noon, grams[d]));
            }
            let active = ActiveDays::from_indices(weekdays.iter().copied()).unwrap();
            let options = EngineOptions::new(feb(1, 14)).active_days(active);
            let mut engine = StatsEngine::new(events, options).unwrap();

            // 2018-02-01 is a Thursday
            let counted = |d: usize| weekdays.contains(&(((4 + d) % 7) as u8));
            let raw_basal: f64 = (0..14).filter(|d| counted(*d)).map(|d| rates[d]).sum();
            let raw_carbs: f64 = (0..14).filter(|d| counted(*d)).map(|d| grams[d]).sum();
            let effective_days = 14.0 * weekdays.len() as f64 / 7.0;

            let ratio = engine.basal_bolus();
            prop_assert!((ratio.basal - raw_basal / effective_days).abs() < 1e-9);
            prop_assert_eq!(ratio.total, weekdays.len());

            let carbs = engine.carbs();
            prop_assert!((carbs.carbs - raw_carbs / effective_days).abs() < 1e-9);
            prop_assert_eq!(carbs.total, weekdays.len());
        }
    }
}
