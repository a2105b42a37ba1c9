//! Profile Module
//! Index profile and dataset overview summaries.

use crate::data::{HospitalRecord, Metric, PreparedTable, RowSet};
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::HashSet;

/// Who the index is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexProfile {
    Hospital {
        record: HospitalRecord,
    },
    System {
        idn: String,
        hospital_count: usize,
        /// Mean of each outcome metric over the system's hospitals.
        averages: Vec<(Metric, Option<f64>)>,
    },
}

impl IndexProfile {
    /// `None` for an empty index.
    pub fn from_index(index: &RowSet<'_>) -> Option<Self> {
        let first = index.first()?;
        if index.len() == 1 {
            return Some(IndexProfile::Hospital {
                record: first.clone(),
            });
        }

        let averages = Metric::OUTCOMES
            .iter()
            .map(|&metric| {
                let values = index.values(metric);
                let mean = if values.is_empty() {
                    None
                } else {
                    Some(values.iter().mean())
                };
                (metric, mean)
            })
            .collect();

        Some(IndexProfile::System {
            idn: first.idn.clone(),
            hospital_count: index.len(),
            averages,
        })
    }
}

/// Dataset-level counts shown before anything is selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub total_hospitals: usize,
    pub total_idns: usize,
    /// `None` when no hospital has a resolvable state.
    pub states_covered: Option<usize>,
    /// `None` when the table carries no discharge counts.
    pub total_discharges: Option<f64>,
}

impl DatasetOverview {
    pub fn from_table(table: &PreparedTable) -> Self {
        let records = table.records();
        let idns: HashSet<&str> = records.iter().map(|r| r.idn.as_str()).collect();
        let states: HashSet<&str> = records.iter().filter_map(|r| r.state_token()).collect();
        let discharges: Vec<f64> = records
            .iter()
            .filter_map(|r| r.number_of_discharges)
            .collect();

        Self {
            total_hospitals: records.len(),
            total_idns: idns.len(),
            states_covered: (!states.is_empty()).then_some(states.len()),
            total_discharges: (!discharges.is_empty()).then(|| discharges.iter().sum()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{CohortEngine, Selection};
    use crate::config::ColumnNames;
    use crate::data::DataProcessor;
    use approx::assert_abs_diff_eq;

    fn table() -> PreparedTable {
        let raw = polars::df!(
            "Provider" => ["1", "2", "3"],
            "Hospital" => ["A", "B", "C"],
            "IDN" => [Some("SysX"), Some("SysX"), None],
            "City" => ["Akron", "Dayton", "Erie"],
            "State" => ["OH", "OH", "PA"],
            "Number of Discharges" => [Some(120.0), None, Some(80.0)],
            "Readmission Rate" => [0.10, 0.20, 0.15],
            "ALOS" => [5.0, 8.0, 6.0],
            "CMI" => [1.0, 2.0, 1.5]
        )
        .unwrap();
        DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap()
    }

    #[test]
    fn overview_counts() {
        let overview = DatasetOverview::from_table(&table());
        assert_eq!(overview.total_hospitals, 3);
        assert_eq!(overview.total_idns, 2);
        assert_eq!(overview.states_covered, Some(2));
        assert_eq!(overview.total_discharges, Some(200.0));
    }

    #[test]
    fn overview_counts_state_only_locations() {
        let raw = polars::df!(
            "Provider" => ["1", "2", "3"],
            "Hospital" => ["A", "B", "C"],
            "IDN" => ["SysX", "SysX", "SysY"],
            "City/State" => ["NY", "Albany, NY", "NJ"],
            "Readmission Rate" => [0.10, 0.20, 0.15],
            "ALOS" => [5.0, 8.0, 6.0],
            "CMI" => [1.0, 2.0, 1.5]
        )
        .unwrap();
        let table = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap();

        let overview = DatasetOverview::from_table(&table);
        assert_eq!(overview.states_covered, Some(2));
    }

    #[test]
    fn system_profile_averages() {
        let table = table();
        let index = CohortEngine::resolve_index(&table, &Selection::System("SysX".into()));

        match IndexProfile::from_index(&index).unwrap() {
            IndexProfile::System {
                idn,
                hospital_count,
                averages,
            } => {
                assert_eq!(idn, "SysX");
                assert_eq!(hospital_count, 2);
                let (metric, alos) = averages[1];
                assert_eq!(metric, Metric::Alos);
                assert_abs_diff_eq!(alos.unwrap(), 6.5, epsilon = 1e-12);
            }
            other => panic!("Expected system profile, got {:?}", other),
        }
    }

    #[test]
    fn empty_index_has_no_profile() {
        let table = table();
        let index = CohortEngine::resolve_index(&table, &Selection::Hospital("404".into()));
        assert!(IndexProfile::from_index(&index).is_none());
    }
}
