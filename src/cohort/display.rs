//! Display Table Module
//! Picks the comparator rows shown in the hospital data table.

use crate::cohort::engine::CohortEngine;
use crate::data::{Metric, RowSet};
use serde::{Deserialize, Serialize};

/// Options of the hospital data table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Show every comparator row instead of the index plus the extremes.
    pub show_all: bool,
    /// Number of extreme rows shown when `show_all` is off, split between both ends.
    pub extremes: usize,
    pub min_beds: Option<f64>,
    pub max_beds: Option<f64>,
    /// Metric ranking the extremes.
    pub sort_metric: Metric,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_all: false,
            extremes: 20,
            min_beds: None,
            max_beds: None,
            sort_metric: Metric::ReadmissionRate,
        }
    }
}

impl CohortEngine {
    /// Rows for the data table.
    ///
    /// Without `show_all` this is the index plus the lowest and highest
    /// comparator rows by `sort_metric`. Bed bounds apply last and exclude
    /// rows without a bed count.
    pub fn display_rows<'a>(
        index: &RowSet<'a>,
        comparator: &RowSet<'a>,
        options: &DisplayOptions,
    ) -> RowSet<'a> {
        let rows = if options.show_all || index.is_empty() {
            comparator.clone()
        } else {
            let metric = options.sort_metric;
            let mut ranked: Vec<(usize, f64)> = comparator
                .positions()
                .iter()
                .zip(comparator.records())
                .filter_map(|(&pos, r)| r.value(metric).map(|v| (pos, v)))
                .collect();
            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

            let n = options.extremes.min(comparator.len()) / 2;
            let top = ranked.iter().take(n);
            let bottom = ranked.iter().skip(ranked.len().saturating_sub(n));
            let positions: Vec<usize> = top.chain(bottom).map(|&(pos, _)| pos).collect();

            index.union(&RowSet::from_positions(comparator.table(), positions))
        };

        if options.min_beds.is_none() && options.max_beds.is_none() {
            return rows;
        }
        let min = options.min_beds.unwrap_or(f64::NEG_INFINITY);
        let max = options.max_beds.unwrap_or(f64::INFINITY);
        rows.filter(|r| r.staffed_beds.is_some_and(|b| b >= min && b <= max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{ComparatorSpec, CohortRequest, Selection};
    use crate::config::ColumnNames;
    use crate::data::{DataProcessor, PreparedTable};

    fn table(n: usize) -> PreparedTable {
        let ids: Vec<String> = (0..n).map(|i| format!("{:03}", i)).collect();
        let names: Vec<String> = (0..n).map(|i| format!("Hospital {}", i)).collect();
        let idn: Vec<&str> = vec!["SysX"; n];
        let beds: Vec<f64> = (0..n).map(|i| 100.0 + 10.0 * i as f64).collect();
        let rate: Vec<Option<f64>> = (0..n)
            .map(|i| if i == 3 { None } else { Some(0.01 * i as f64) })
            .collect();
        let alos: Vec<f64> = vec![5.0; n];
        let cmi: Vec<f64> = vec![1.0; n];

        let raw = polars::df!(
            "Provider" => ids,
            "Hospital" => names,
            "IDN" => idn,
            "Number of Staffed Beds" => beds,
            "Readmission Rate" => rate,
            "ALOS" => alos,
            "CMI" => cmi
        )
        .unwrap();
        DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap()
    }

    #[test]
    fn index_plus_extremes_by_default() {
        let table = table(30);
        let request = CohortRequest::new(Selection::Hospital("015".into()), ComparatorSpec::AllHospitals);
        let cohort = CohortEngine::build(&table, &request);

        let options = DisplayOptions {
            extremes: 4,
            ..DisplayOptions::default()
        };
        let rows = CohortEngine::display_rows(&cohort.index, &cohort.comparator, &options);
        // lowest two rates (000, 001), highest two (028, 029); 003 has no rate
        assert_eq!(rows.provider_ids(), ["000", "001", "015", "028", "029"]);
    }

    #[test]
    fn show_all_keeps_comparator() {
        let table = table(30);
        let request = CohortRequest::new(Selection::Hospital("015".into()), ComparatorSpec::AllHospitals);
        let cohort = CohortEngine::build(&table, &request);

        let options = DisplayOptions {
            show_all: true,
            ..DisplayOptions::default()
        };
        let rows = CohortEngine::display_rows(&cohort.index, &cohort.comparator, &options);
        assert_eq!(rows.len(), 30);
    }

    #[test]
    fn bed_bounds_apply_last() {
        let table = table(10);
        let request = CohortRequest::new(Selection::Hospital("005".into()), ComparatorSpec::AllHospitals);
        let cohort = CohortEngine::build(&table, &request);

        let options = DisplayOptions {
            show_all: true,
            min_beds: Some(120.0),
            max_beds: Some(150.0),
            ..DisplayOptions::default()
        };
        let rows = CohortEngine::display_rows(&cohort.index, &cohort.comparator, &options);
        assert_eq!(rows.provider_ids(), ["002", "003", "004", "005"]);
    }
}
