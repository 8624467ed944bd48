//! TCX export of a finished workout.
//!
//! One Biking activity with a single lap and one trackpoint per recorded
//! second. Distance is integrated from the speed history so the file is
//! internally consistent. Power goes into the ActivityExtension `TPX` block.

use crate::recording::types::{ExportError, WorkoutSummary};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

const NS_TCX: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const NS_TPX: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

const NOTES: &str = "Indoor ride recorded with SpinRide";

/// Thin wrapper that maps quick-xml failures into [`ExportError`].
struct TcxWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl TcxWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ExportError> {
        self.inner
            .write_event(event)
            .map_err(|e| ExportError::XmlError(e.to_string()))
    }

    fn open(&mut self, element: BytesStart<'_>) -> Result<(), ExportError> {
        self.event(Event::Start(element))
    }

    fn open_plain(&mut self, name: &str) -> Result<(), ExportError> {
        self.open(BytesStart::new(name))
    }

    fn close(&mut self, name: &str) -> Result<(), ExportError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// `<name>value</name>`
    fn leaf(&mut self, name: &str, value: &str) -> Result<(), ExportError> {
        self.open_plain(name)?;
        self.event(Event::Text(BytesText::new(value)))?;
        self.close(name)
    }

    /// `<name><Value>bpm</Value></name>`
    fn heart_rate(&mut self, name: &str, bpm: u16) -> Result<(), ExportError> {
        self.open_plain(name)?;
        self.leaf("Value", &bpm.to_string())?;
        self.close(name)
    }

    fn finish(self) -> Result<String, ExportError> {
        String::from_utf8(self.inner.into_inner().into_inner())
            .map_err(|e| ExportError::XmlError(e.to_string()))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Serialize a workout summary to a TCX document.
pub fn export_tcx(summary: &WorkoutSummary) -> Result<String, ExportError> {
    let history = &summary.history;
    if history.is_empty() {
        return Err(ExportError::NoData);
    }

    let start = timestamp(summary.started_at);
    let mut xml = TcxWriter::new();

    xml.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("TrainingCenterDatabase");
    root.push_attribute(("xmlns", NS_TCX));
    root.push_attribute(("xmlns:ns3", NS_TPX));
    root.push_attribute(("xmlns:xsi", NS_XSI));
    xml.open(root)?;
    xml.open_plain("Activities")?;

    let mut activity = BytesStart::new("Activity");
    activity.push_attribute(("Sport", "Biking"));
    xml.open(activity)?;
    xml.leaf("Id", &start)?;

    let mut lap = BytesStart::new("Lap");
    lap.push_attribute(("StartTime", start.as_str()));
    xml.open(lap)?;

    let total_meters: f64 = history.speed.iter().map(|kmh| kmh / 3.6).sum();
    xml.leaf("TotalTimeSeconds", &history.len().to_string())?;
    xml.leaf("DistanceMeters", &format!("{:.1}", total_meters))?;
    xml.leaf("MaximumSpeed", &format!("{:.2}", summary.top_speed_kmh / 3.6))?;
    xml.leaf("Calories", &(summary.estimated_kcal.round() as u32).to_string())?;
    if let Some(bpm) = summary.top_heart_rate_bpm.filter(|&bpm| bpm > 0) {
        xml.heart_rate("MaximumHeartRateBpm", bpm)?;
    }
    xml.leaf("Intensity", "Active")?;
    xml.leaf("TriggerMethod", "Manual")?;

    write_track(&mut xml, summary)?;

    xml.close("Lap")?;
    xml.leaf("Notes", NOTES)?;
    xml.close("Activity")?;
    xml.close("Activities")?;
    xml.close("TrainingCenterDatabase")?;

    xml.finish()
}

fn write_track(xml: &mut TcxWriter, summary: &WorkoutSummary) -> Result<(), ExportError> {
    let history = &summary.history;
    xml.open_plain("Track")?;

    // A series shorter than power reads as 0 / no reading
    let mut speed = history.speed.iter().copied();
    let mut cadence = history.cadence.iter().copied();
    let mut heart_rate = history.heart_rate.iter().copied();

    let mut meters = 0.0;
    for (i, &watts) in history.power.iter().enumerate() {
        meters += speed.next().unwrap_or(0.0) / 3.6;
        let at = summary.started_at + Duration::seconds(i as i64);

        xml.open_plain("Trackpoint")?;
        xml.leaf("Time", &timestamp(at))?;
        xml.leaf("DistanceMeters", &format!("{:.1}", meters))?;

        if let Some(bpm) = heart_rate.next().flatten().filter(|&bpm| bpm > 0) {
            xml.heart_rate("HeartRateBpm", bpm)?;
        }

        let rpm = cadence.next().unwrap_or(0.0) as u32;
        if rpm > 0 {
            xml.leaf("Cadence", &rpm.to_string())?;
        }

        xml.open_plain("Extensions")?;
        xml.open_plain("ns3:TPX")?;
        xml.leaf("ns3:Watts", &(watts as u32).to_string())?;
        xml.close("ns3:TPX")?;
        xml.close("Extensions")?;

        xml.close("Trackpoint")?;
    }

    xml.close("Track")
}

/// Export to TCX and write the document to `path`.
pub fn write_tcx(summary: &WorkoutSummary, path: &Path) -> Result<(), ExportError> {
    let content = export_tcx(summary)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!("Wrote TCX to {}", path.display());
    Ok(())
}

/// Default file name for an exported ride.
pub fn tcx_filename(summary: &WorkoutSummary) -> String {
    format!("spinride_{}.tcx", summary.started_at.format("%Y%m%d_%H%M%S"))
}
