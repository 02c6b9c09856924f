//! Data models shared by the publisher pipeline and the HTTP layer.

use std::collections::BTreeMap;

use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};

// ---

/// Summary used whenever a model response could not be turned into a diagnosis.
pub const PLACEHOLDER_SUMMARY: &str = "Error parsing AI response";

/// A single scalar reading: a measurement or a categorical status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Status(String),
}

impl Reading {
    // ---
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Number(n) => Some(*n),
            Reading::Status(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reading::Status(s) => Some(s),
            Reading::Number(_) => None,
        }
    }
}

/// Readings of one named instrument (`Compressor01` -> `dischargePressure` -> 342.1).
pub type Instrument = BTreeMap<String, Reading>;

/// An entry inside an equipment group: either an instrument with its own
/// readings or a group-level reading such as a shared supply temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Point {
    Instrument(Instrument),
    Reading(Reading),
}

/// Equipment group name -> instrument or reading name -> point.
pub type Equipment = BTreeMap<String, BTreeMap<String, Point>>;

/// One simulated reading of all monitored equipment at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    // ---
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
    #[serde(rename = "building")]
    pub site: String,
    pub equipment: Equipment,
}

impl Snapshot {
    /// Iterate over every instrument as `(group, instrument name, readings)`.
    pub fn instruments(&self) -> impl Iterator<Item = (&str, &str, &Instrument)> {
        // ---
        self.equipment.iter().flat_map(|(group, points)| {
            points.iter().filter_map(move |(name, point)| match point {
                Point::Instrument(readings) => Some((group.as_str(), name.as_str(), readings)),
                Point::Reading(_) => None,
            })
        })
    }

    /// Look up one instrument reading.
    #[cfg(test)]
    pub fn reading(&self, group: &str, instrument: &str, field: &str) -> Option<&Reading> {
        // ---
        match self.equipment.get(group)?.get(instrument)? {
            Point::Instrument(readings) => readings.get(field),
            Point::Reading(_) => None,
        }
    }
}

// ---

/// How urgently a recommendation should be acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Lenient mapping from free text; anything unrecognised is `Medium`.
    pub fn from_label(label: &str) -> Self {
        // ---
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "urgent" => Priority::High,
            "low" | "minor" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

/// One abnormal reading called out by a diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Abnormality {
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub issue: String,
    /// Observed value as reported; may be a number or text.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_range: Option<String>,
}

/// A suggested corrective action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    #[serde(default)]
    pub priority: Priority,
}

/// Structured narrative, abnormality and recommendation result for a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub abnormalities: Vec<Abnormality>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl Diagnosis {
    /// The error result: fixed summary, no findings.
    pub fn placeholder() -> Self {
        Self {
            summary: PLACEHOLDER_SUMMARY.to_string(),
            abnormalities: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.summary == PLACEHOLDER_SUMMARY
            && self.abnormalities.is_empty()
            && self.recommendations.is_empty()
    }
}

// ---

/// Persisted `status` field: a JSON-encoded diagnosis, or a bare message.
///
/// On disk this is always a string. Strings that decode as a diagnosis
/// object come back as `Status::Diagnosis`; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Diagnosis(Diagnosis),
    Message(String),
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // ---
        match self {
            Status::Diagnosis(diagnosis) => {
                let text = serde_json::to_string(diagnosis).map_err(ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            Status::Message(message) => serializer.serialize_str(message),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // ---
        let text = String::deserialize(deserializer)?;
        Ok(match serde_json::from_str::<Diagnosis>(&text) {
            Ok(diagnosis) => Status::Diagnosis(diagnosis),
            Err(_) => Status::Message(text),
        })
    }
}

/// One publisher cycle's outcome, as stored and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    // ---
    pub status: Status,
    pub timestamp: String,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
}

impl HistoryEntry {
    /// Entry for a cycle whose analysis completed.
    pub fn diagnosed(snapshot: Snapshot, diagnosis: Diagnosis) -> Self {
        // ---
        Self {
            status: Status::Diagnosis(diagnosis),
            timestamp: snapshot.timestamp.clone(),
            error: None,
            snapshot: Some(snapshot),
        }
    }

    /// Entry for a failed cycle: placeholder diagnosis plus the error text.
    pub fn failed(snapshot: Snapshot, error: impl Into<String>) -> Self {
        // ---
        Self {
            status: Status::Diagnosis(Diagnosis::placeholder()),
            timestamp: snapshot.timestamp.clone(),
            error: Some(error.into()),
            snapshot: Some(snapshot),
        }
    }

    #[cfg(test)]
    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match &self.status {
            Status::Diagnosis(diagnosis) => Some(diagnosis),
            Status::Message(_) => None,
        }
    }

    /// Site the entry was produced for, when the snapshot was kept.
    pub fn site(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.site.as_str())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn sample_snapshot() -> Snapshot {
        // ---
        serde_json::from_value(json!({
            "timestamp": "2025-03-26T18:45:00Z",
            "building": "Demo Tower",
            "equipment": {
                "ChillerSystem": {
                    "Compressor01": { "dischargePressure": 342.5, "status": "Running" },
                    "chilledWaterSupplyTemp": 44.1
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_snapshot_wire_shape() {
        // ---
        let snapshot = sample_snapshot();
        assert_eq!(snapshot.site, "Demo Tower");

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["building"], "Demo Tower");
        assert_eq!(
            value["equipment"]["ChillerSystem"]["Compressor01"]["status"],
            "Running"
        );
        assert_eq!(
            value["equipment"]["ChillerSystem"]["chilledWaterSupplyTemp"],
            44.1
        );
    }

    #[test]
    fn test_snapshot_instruments_skip_group_readings() {
        // ---
        let snapshot = sample_snapshot();
        let names: Vec<_> = snapshot.instruments().map(|(g, i, _)| (g, i)).collect();
        assert_eq!(names, vec![("ChillerSystem", "Compressor01")]);

        let pressure = snapshot
            .reading("ChillerSystem", "Compressor01", "dischargePressure")
            .and_then(Reading::as_f64);
        assert_eq!(pressure, Some(342.5));
        assert!(snapshot
            .reading("ChillerSystem", "chilledWaterSupplyTemp", "x")
            .is_none());
    }

    #[test]
    fn test_status_encodes_diagnosis_as_string() {
        // ---
        let entry = HistoryEntry::diagnosed(
            sample_snapshot(),
            Diagnosis {
                summary: "All good".to_string(),
                ..Diagnosis::default()
            },
        );
        let value = serde_json::to_value(&entry).unwrap();

        let status = value["status"].as_str().expect("status is a string");
        let decoded: Diagnosis = serde_json::from_str(status).unwrap();
        assert_eq!(decoded.summary, "All good");
        assert_eq!(value["timestamp"], "2025-03-26T18:45:00Z");
        assert!(value["error"].is_null());
    }

    #[test]
    fn test_status_plain_message_survives() {
        // ---
        let raw = r#"{"status": "Starting...", "timestamp": "2025-01-01T00:00:00Z", "error": null}"#;
        let entry: HistoryEntry = serde_json::from_str(raw).unwrap();

        assert_eq!(entry.status, Status::Message("Starting...".to_string()));
        assert!(entry.diagnosis().is_none());
        assert!(entry.snapshot.is_none());
        assert!(entry.site().is_none());
    }

    #[test]
    fn test_failed_entry_carries_placeholder() {
        // ---
        let entry = HistoryEntry::failed(sample_snapshot(), "connection refused");
        assert_eq!(entry.error.as_deref(), Some("connection refused"));
        assert!(entry.diagnosis().unwrap().is_placeholder());
        assert_eq!(entry.site(), Some("Demo Tower"));
    }

    #[test]
    fn test_priority_labels() {
        // ---
        assert_eq!(Priority::from_label("HIGH"), Priority::High);
        assert_eq!(Priority::from_label(" low "), Priority::Low);
        assert_eq!(Priority::from_label("whenever"), Priority::Medium);
    }
}
