//! Selection Module
//! What the user picked: the index hospital or system, the comparator group
//! and an optional similarity window.

use crate::data::{Metric, PreparedTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The subject of analysis: one hospital or one health system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Provider id of a single hospital.
    Hospital(String),
    /// IDN name of a health system.
    System(String),
}

impl Selection {
    /// Parse a "{provider_id} - {hospital_name}" list label, or a bare provider id.
    pub fn from_hospital_label(label: &str) -> Self {
        let provider_id = label.split(" - ").next().unwrap_or(label);
        Selection::Hospital(provider_id.trim().to_string())
    }

    pub fn is_hospital(&self) -> bool {
        matches!(self, Selection::Hospital(_))
    }
}

/// The benchmark group the index is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorSpec {
    #[default]
    AllHospitals,
    SameIdn,
    SameState,
}

impl ComparatorSpec {
    /// Comparator choices offered for a selection. Same-state is hospital-only.
    pub fn available_for(selection: &Selection) -> Vec<ComparatorSpec> {
        match selection {
            Selection::Hospital(_) => vec![
                ComparatorSpec::AllHospitals,
                ComparatorSpec::SameIdn,
                ComparatorSpec::SameState,
            ],
            Selection::System(_) => vec![ComparatorSpec::AllHospitals, ComparatorSpec::SameIdn],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComparatorSpec::AllHospitals => "All Hospitals",
            ComparatorSpec::SameIdn => "Same IDN",
            ComparatorSpec::SameState => "Same State",
        }
    }
}

impl fmt::Display for ComparatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComparatorSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match key.as_str() {
            "all" | "all-hospitals" => Ok(ComparatorSpec::AllHospitals),
            "same-idn" | "idn" => Ok(ComparatorSpec::SameIdn),
            "same-state" | "state" => Ok(ComparatorSpec::SameState),
            _ => Err(format!(
                "unknown comparator '{}' (expected all, same-idn or same-state)",
                s
            )),
        }
    }
}

/// Narrows a comparator group to hospitals of similar size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityFilter {
    BedCount { tolerance_pct: f64 },
    ProcedureVolume { tolerance_pct: f64 },
}

impl SimilarityFilter {
    /// Field compared by this filter.
    pub fn metric(self) -> Metric {
        match self {
            SimilarityFilter::BedCount { .. } => Metric::StaffedBeds,
            SimilarityFilter::ProcedureVolume { .. } => Metric::MedicareTotalClaims,
        }
    }

    /// Tolerance in percent. Negative or non-finite tolerances clamp to 0.
    pub fn tolerance_pct(self) -> f64 {
        let pct = match self {
            SimilarityFilter::BedCount { tolerance_pct }
            | SimilarityFilter::ProcedureVolume { tolerance_pct } => tolerance_pct,
        };
        if pct.is_finite() {
            pct.max(0.0)
        } else {
            0.0
        }
    }
}

/// Sorted "{provider_id} - {hospital_name}" labels for hospitals with a name.
pub fn hospital_options(table: &PreparedTable) -> Vec<String> {
    let mut options: Vec<String> = table
        .records()
        .iter()
        .filter_map(|r| r.display_name())
        .collect();
    options.sort();
    options
}

/// Sorted distinct IDNs.
pub fn idn_options(table: &PreparedTable) -> Vec<String> {
    table
        .records()
        .iter()
        .map(|r| r.idn.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
