//! Cohort Engine Module
//! Resolves the index row-set, the comparator row-set and the similarity window.
//!
//! Every operation is a pure function of the prepared table and the request.
//! An empty index is not a fault: comparators fall back to the whole table.

use crate::cohort::selection::{ComparatorSpec, Selection, SimilarityFilter};
use crate::data::{HospitalRecord, PreparedTable, RowSet};
use log::debug;
use serde::{Deserialize, Serialize};

/// One user interaction: what is selected and what to compare against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRequest {
    pub selection: Selection,
    #[serde(default)]
    pub comparator: ComparatorSpec,
    #[serde(default)]
    pub similarity: Option<SimilarityFilter>,
}

impl CohortRequest {
    pub fn new(selection: Selection, comparator: ComparatorSpec) -> Self {
        Self {
            selection,
            comparator,
            similarity: None,
        }
    }

    pub fn with_similarity(mut self, filter: SimilarityFilter) -> Self {
        self.similarity = Some(filter);
        self
    }
}

/// Index and comparator row-sets of one request.
#[derive(Debug, Clone)]
pub struct Cohort<'a> {
    pub index: RowSet<'a>,
    pub comparator: RowSet<'a>,
}

/// Builds cohorts over a prepared table.
pub struct CohortEngine;

impl CohortEngine {
    /// Resolve the index, the comparator and the optional similarity window.
    pub fn build<'a>(table: &'a PreparedTable, request: &CohortRequest) -> Cohort<'a> {
        let index = Self::resolve_index(table, &request.selection);
        let mut comparator =
            Self::resolve_comparator(table, &index, request.comparator, &request.selection);
        if let Some(filter) = request.similarity {
            comparator = Self::apply_similarity(&comparator, &index, filter);
        }

        debug!(
            "Cohort {:?} vs {}: {} index rows, {} comparator rows",
            request.selection,
            request.comparator,
            index.len(),
            comparator.len()
        );
        Cohort { index, comparator }
    }

    /// Rows matching the selection. No match yields an empty set.
    pub fn resolve_index<'a>(table: &'a PreparedTable, selection: &Selection) -> RowSet<'a> {
        match selection {
            Selection::Hospital(provider_id) => match table.position_of(provider_id.trim()) {
                Some(pos) => RowSet::from_positions(table, vec![pos]),
                None => RowSet::empty(table),
            },
            Selection::System(idn) => table.select(|r| r.idn == *idn),
        }
    }

    /// The benchmark group for a resolved index.
    pub fn resolve_comparator<'a>(
        table: &'a PreparedTable,
        index: &RowSet<'a>,
        spec: ComparatorSpec,
        selection: &Selection,
    ) -> RowSet<'a> {
        let Some(first) = index.first() else {
            return table.all_rows();
        };

        match (spec, selection) {
            (ComparatorSpec::AllHospitals, _) => table.all_rows(),
            (ComparatorSpec::SameIdn, Selection::Hospital(_)) => {
                let idn = first.idn.as_str();
                table.select(|r| r.idn == idn)
            }
            (ComparatorSpec::SameIdn, Selection::System(idn)) => table.select(|r| r.idn == *idn),
            (ComparatorSpec::SameState, Selection::Hospital(_)) => match first.state_token() {
                Some(state) => table.select(|r| in_state(r, state)),
                None => table.all_rows(),
            },
            (ComparatorSpec::SameState, Selection::System(_)) => table.all_rows(),
        }
    }

    /// Keep comparator rows within the tolerance window around the index
    /// reference value, then add the index rows back.
    pub fn apply_similarity<'a>(
        comparator: &RowSet<'a>,
        index: &RowSet<'a>,
        filter: SimilarityFilter,
    ) -> RowSet<'a> {
        let metric = filter.metric();
        let reference = if index.len() == 1 {
            index.first().and_then(|r| r.value(metric))
        } else {
            let values = index.values(metric);
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let Some(reference) = reference else {
            debug!("No {} reference for similarity window, keeping comparator", metric);
            return comparator.clone();
        };

        // Bounds stay in percent units so whole-number edges compare exactly.
        let pct = filter.tolerance_pct();
        let (a, b) = (reference * (100.0 - pct), reference * (100.0 + pct));
        let (low, high) = (a.min(b), a.max(b));

        comparator
            .filter(|r| {
                r.value(metric).is_some_and(|v| {
                    let scaled = v * 100.0;
                    scaled >= low && scaled <= high
                })
            })
            .union(index)
    }
}

/// Loose state match: the location contains the state token. Rows without a
/// location fall back to an exact match on their dedicated state.
fn in_state(record: &HospitalRecord, state: &str) -> bool {
    match record.location.as_deref() {
        Some(location) => location.contains(state),
        None => record.state.as_deref() == Some(state),
    }
}
