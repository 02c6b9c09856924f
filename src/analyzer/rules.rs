//! Threshold rules used when a model response carries no findings.
//!
//! The walk is schema-free: every instrument in every group is checked
//! against every rule, so new groups or instruments are covered as long as
//! they use the same reading names.

use crate::models::{Abnormality, Instrument, Priority, Recommendation, Snapshot};

// ---

pub const DISCHARGE_PRESSURE_MAX: f64 = 350.0;
pub const IDLE_SUPPLY_TEMP_MAX: f64 = 150.0;
pub const SUPPLY_AIR_TEMP_MIN: f64 = 55.0;

/// A breach found by a rule: issue text plus the observed reading.
struct Finding {
    issue: &'static str,
    observed: f64,
}

struct ThresholdRule {
    /// Equipment family whose catalog action answers this rule.
    family: &'static str,
    normal_range: &'static str,
    check: fn(&Instrument) -> Option<Finding>,
}

const RULES: &[ThresholdRule] = &[
    ThresholdRule {
        family: "ChillerSystem",
        normal_range: "300-350 psi",
        check: over_pressure,
    },
    ThresholdRule {
        family: "BoilerSystem",
        normal_range: "<= 150 °F while burner is off",
        check: hot_idle_burner,
    },
    ThresholdRule {
        family: "AirHandlers",
        normal_range: "55-62 °F",
        check: cold_supply_air,
    },
];

const ACTIONS: &[(&str, &str, Priority)] = &[
    (
        "ChillerSystem",
        "Inspect condenser coils, condenser water flow and refrigerant charge on the affected compressor",
        Priority::High,
    ),
    (
        "BoilerSystem",
        "Verify burner ignition and check the idle boiler's isolation valve and supply temperature sensor",
        Priority::Medium,
    ),
    (
        "AirHandlers",
        "Check the cooling valve position and supply-air setpoint on the affected air handler",
        Priority::Medium,
    ),
];

fn number(readings: &Instrument, field: &str) -> Option<f64> {
    readings.get(field).and_then(|r| r.as_f64())
}

fn over_pressure(readings: &Instrument) -> Option<Finding> {
    // ---
    let observed = number(readings, "dischargePressure")?;
    (observed > DISCHARGE_PRESSURE_MAX).then_some(Finding {
        issue: "Compressor discharge pressure above 350 psi",
        observed,
    })
}

fn hot_idle_burner(readings: &Instrument) -> Option<Finding> {
    // ---
    let burner = readings.get("burnerStatus").and_then(|r| r.as_str())?;
    let observed = number(readings, "supplyTemp")?;
    (burner.eq_ignore_ascii_case("off") && observed > IDLE_SUPPLY_TEMP_MAX).then_some(Finding {
        issue: "Burner is off but boiler supply temperature is high",
        observed,
    })
}

fn cold_supply_air(readings: &Instrument) -> Option<Finding> {
    // ---
    let observed = number(readings, "supplyAirTemp")?;
    (observed < SUPPLY_AIR_TEMP_MIN).then_some(Finding {
        issue: "Supply air temperature below 55 °F",
        observed,
    })
}

fn action_for(family: &str) -> Option<Recommendation> {
    ACTIONS
        .iter()
        .find(|(name, _, _)| *name == family)
        .map(|(_, action, priority)| Recommendation {
            action: action.to_string(),
            priority: *priority,
        })
}

/// Derive abnormalities and matching recommendations from raw readings.
///
/// Recommendations are listed once per triggering equipment family, in the
/// order the families were first hit. A snapshot with no breaches yields two
/// empty lists.
pub fn derive(snapshot: &Snapshot) -> (Vec<Abnormality>, Vec<Recommendation>) {
    // ---
    let mut abnormalities = Vec::new();
    let mut families: Vec<&'static str> = Vec::new();

    for (group, instrument, readings) in snapshot.instruments() {
        for rule in RULES {
            let Some(finding) = (rule.check)(readings) else {
                continue;
            };
            abnormalities.push(Abnormality {
                component: format!("{group}.{instrument}"),
                issue: finding.issue.to_string(),
                value: serde_json::Value::from(finding.observed),
                normal_range: Some(rule.normal_range.to_string()),
            });
            if !families.contains(&rule.family) {
                families.push(rule.family);
            }
        }
    }

    let recommendations = families.into_iter().filter_map(action_for).collect();
    (abnormalities, recommendations)
}
