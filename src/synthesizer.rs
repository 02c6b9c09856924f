//! Telemetry synthesizer for the demo building.
//!
//! Produces one [`Snapshot`] per call from a fixed equipment catalog. Healthy
//! ranges stay inside every diagnostic threshold; each snapshot then has
//! exactly one fault injected so downstream abnormality detection always has
//! something to find.

use std::collections::BTreeMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Point, Reading, Snapshot};

// ---

/// How a catalog field produces its value.
#[derive(Debug, Clone, Copy)]
enum Kind {
    /// Uniform draw from `healthy`, or from `fault` when this field is the injection target.
    Numeric {
        healthy: (f64, f64),
        fault: Option<(f64, f64)>,
    },
    Status(&'static str),
}

/// One reading in the catalog. `instrument` is `None` for group-level readings.
#[derive(Debug, Clone, Copy)]
struct Field {
    group: &'static str,
    instrument: Option<&'static str>,
    name: &'static str,
    kind: Kind,
}

const fn numeric(
    group: &'static str,
    instrument: Option<&'static str>,
    name: &'static str,
    healthy: (f64, f64),
    fault: Option<(f64, f64)>,
) -> Field {
    Field {
        group,
        instrument,
        name,
        kind: Kind::Numeric { healthy, fault },
    }
}

const fn status(
    group: &'static str,
    instrument: Option<&'static str>,
    name: &'static str,
    value: &'static str,
) -> Field {
    Field {
        group,
        instrument,
        name,
        kind: Kind::Status(value),
    }
}

const OVER_PRESSURE: Option<(f64, f64)> = Some((355.0, 380.0));
const HOT_IDLE_BOILER: Option<(f64, f64)> = Some((160.0, 175.0));
const COLD_SUPPLY_AIR: Option<(f64, f64)> = Some((50.0, 54.0));

#[rustfmt::skip]
const CATALOG: &[Field] = &[
    numeric("ChillerSystem", Some("Compressor01"), "dischargePressure", (300.0, 350.0), OVER_PRESSURE),
    status ("ChillerSystem", Some("Compressor01"), "status", "Running"),
    numeric("ChillerSystem", Some("Compressor02"), "dischargePressure", (300.0, 350.0), OVER_PRESSURE),
    status ("ChillerSystem", Some("Compressor02"), "status", "Running"),
    numeric("ChillerSystem", Some("Compressor03"), "dischargePressure", (300.0, 350.0), None),
    status ("ChillerSystem", Some("Compressor03"), "status", "Off"),
    numeric("ChillerSystem", None, "chilledWaterSupplyTemp", (42.0, 46.0), None),
    numeric("ChillerSystem", None, "coolingTowerFanSpeed", (50.0, 80.0), None),

    status ("BoilerSystem", Some("Boiler01"), "burnerStatus", "On"),
    numeric("BoilerSystem", Some("Boiler01"), "supplyTemp", (160.0, 180.0), None),
    status ("BoilerSystem", Some("Boiler02"), "burnerStatus", "Off"),
    numeric("BoilerSystem", Some("Boiler02"), "supplyTemp", (140.0, 150.0), HOT_IDLE_BOILER),
    numeric("BoilerSystem", None, "hotWaterSupplyTemp", (160.0, 175.0), None),
    status ("BoilerSystem", None, "pumpStatus", "On"),

    numeric("AirHandlers", Some("AHU01"), "supplyAirTemp", (56.0, 62.0), COLD_SUPPLY_AIR),
    numeric("AirHandlers", Some("AHU01"), "returnAirTemp", (68.0, 72.0), None),
    numeric("AirHandlers", Some("AHU01"), "fanSpeed", (1000.0, 1500.0), None),
    numeric("AirHandlers", Some("AHU02"), "supplyAirTemp", (56.0, 62.0), COLD_SUPPLY_AIR),
    numeric("AirHandlers", Some("AHU02"), "returnAirTemp", (68.0, 72.0), None),
    numeric("AirHandlers", Some("AHU02"), "fanSpeed", (1000.0, 1500.0), None),
    numeric("AirHandlers", Some("AHU03"), "supplyAirTemp", (56.0, 62.0), COLD_SUPPLY_AIR),
    numeric("AirHandlers", Some("AHU03"), "returnAirTemp", (68.0, 72.0), None),
    numeric("AirHandlers", Some("AHU03"), "fanSpeed", (1000.0, 1500.0), None),
];

/// Catalog indices of the fields that can carry the per-snapshot fault.
fn fault_targets() -> Vec<usize> {
    CATALOG
        .iter()
        .enumerate()
        .filter(|(_, f)| matches!(f.kind, Kind::Numeric { fault: Some(_), .. }))
        .map(|(idx, _)| idx)
        .collect()
}

// ---

/// Source of simulated equipment snapshots for one site.
pub struct TelemetrySynthesizer {
    site: String,
    rng: StdRng,
}

impl TelemetrySynthesizer {
    /// Synthesizer seeded from OS entropy.
    pub fn new(site: impl Into<String>) -> Self {
        Self::with_rng(site, StdRng::from_entropy())
    }

    /// Reproducible synthesizer for tests.
    #[cfg(test)]
    pub fn seeded(site: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(site, StdRng::seed_from_u64(seed))
    }

    fn with_rng(site: impl Into<String>, rng: StdRng) -> Self {
        Self {
            site: site.into(),
            rng,
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Produce one snapshot with exactly one injected fault.
    pub fn produce_snapshot(&mut self) -> Snapshot {
        // ---
        let targets = fault_targets();
        let target = targets[self.rng.gen_range(0..targets.len())];

        let mut equipment: BTreeMap<String, BTreeMap<String, Point>> = BTreeMap::new();
        for (idx, field) in CATALOG.iter().enumerate() {
            let reading = match field.kind {
                Kind::Status(value) => Reading::Status(value.to_string()),
                Kind::Numeric { healthy, fault } => {
                    let (lo, hi) = match fault {
                        Some(range) if idx == target => range,
                        _ => healthy,
                    };
                    Reading::Number(round1(self.rng.gen_range(lo..=hi)))
                }
            };

            let group = equipment.entry(field.group.to_string()).or_default();
            match field.instrument {
                Some(instrument) => {
                    let point = group
                        .entry(instrument.to_string())
                        .or_insert_with(|| Point::Instrument(BTreeMap::new()));
                    if let Point::Instrument(readings) = point {
                        readings.insert(field.name.to_string(), reading);
                    }
                }
                None => {
                    group.insert(field.name.to_string(), Point::Reading(reading));
                }
            }
        }

        let target = &CATALOG[target];
        tracing::debug!(
            site = %self.site,
            "Synthesized snapshot, fault in {}.{}.{}",
            target.group,
            target.instrument.unwrap_or_default(),
            target.name
        );

        Snapshot {
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            site: self.site.clone(),
            equipment,
        }
    }
}

/// Round to one decimal place, as the readings are displayed.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::ops::RangeInclusive;

    use crate::analyzer::rules;

    /// Full configured range of a numeric field (healthy and fault ranges combined).
    fn configured_range(
        group: &str,
        instrument: Option<&str>,
        name: &str,
    ) -> Option<RangeInclusive<f64>> {
        // ---
        CATALOG
            .iter()
            .find(|f| f.group == group && f.instrument == instrument && f.name == name)
            .and_then(|f| match f.kind {
                Kind::Numeric { healthy, fault } => {
                    let (lo, hi) = fault.map_or(healthy, |(flo, fhi)| {
                        (healthy.0.min(flo), healthy.1.max(fhi))
                    });
                    Some(lo..=hi)
                }
                Kind::Status(_) => None,
            })
    }

    /// `group.instrument` of every field that can carry the injected fault.
    fn fault_components() -> Vec<String> {
        fault_targets()
            .into_iter()
            .map(|idx| {
                let field = &CATALOG[idx];
                format!("{}.{}", field.group, field.instrument.unwrap_or_default())
            })
            .collect()
    }

    #[test]
    fn test_snapshot_shape_is_stable() {
        // ---
        let mut synth = TelemetrySynthesizer::seeded("Demo Tower", 7);
        let snapshot = synth.produce_snapshot();

        assert_eq!(snapshot.site, "Demo Tower");
        assert_eq!(
            snapshot.equipment.keys().collect::<Vec<_>>(),
            vec!["AirHandlers", "BoilerSystem", "ChillerSystem"]
        );
        assert_eq!(snapshot.instruments().count(), 8);
        assert!(snapshot
            .reading("ChillerSystem", "Compressor03", "status")
            .and_then(Reading::as_str)
            .is_some_and(|s| s == "Off"));
        assert!(chrono::DateTime::parse_from_rfc3339(&snapshot.timestamp).is_ok());
    }

    #[test]
    fn test_readings_within_configured_ranges() {
        // ---
        let mut synth = TelemetrySynthesizer::seeded("Demo Tower", 42);
        for _ in 0..200 {
            let snapshot = synth.produce_snapshot();
            for (group, points) in &snapshot.equipment {
                for (name, point) in points {
                    let checks: Vec<(Option<&str>, &str, &Reading)> = match point {
                        Point::Instrument(readings) => readings
                            .iter()
                            .map(|(field, r)| (Some(name.as_str()), field.as_str(), r))
                            .collect(),
                        Point::Reading(r) => vec![(None, name.as_str(), r)],
                    };
                    for (instrument, field, reading) in checks {
                        let Some(value) = reading.as_f64() else {
                            continue;
                        };
                        let range = configured_range(group, instrument, field)
                            .expect("every numeric reading is in the catalog");
                        assert!(
                            range.contains(&value),
                            "{group}/{instrument:?}/{field} = {value} outside {range:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_snapshot_breaches_a_threshold() {
        // ---
        let candidates = fault_components();
        let mut seen = std::collections::BTreeSet::new();

        let mut synth = TelemetrySynthesizer::seeded("Demo Tower", 1234);
        for _ in 0..200 {
            let snapshot = synth.produce_snapshot();
            let (abnormalities, _) = rules::derive(&snapshot);

            assert_eq!(abnormalities.len(), 1, "exactly one fault per snapshot");
            let component = &abnormalities[0].component;
            assert!(candidates.contains(component), "{component}");
            seen.insert(component.clone());
        }
        // Uniform choice over six targets reaches all of them in 200 draws.
        assert_eq!(seen.len(), candidates.len());
    }

    #[test]
    fn test_seeded_values_repeat() {
        // ---
        let mut a = TelemetrySynthesizer::seeded("Demo Tower", 9);
        let mut b = TelemetrySynthesizer::seeded("Demo Tower", 9);
        for _ in 0..3 {
            assert_eq!(a.produce_snapshot().equipment, b.produce_snapshot().equipment);
        }
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(342.449), 342.4);
        assert_eq!(round1(54.96), 55.0);
    }
}
