//! Prepared Table Module
//! The immutable hospital table and the row-set views taken over it.

use crate::config::ColumnNames;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

/// IDN assigned to hospitals that do not belong to a health system.
pub const INDEPENDENT_IDN: &str = "Independent";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to export rows: {0}")]
    Polars(#[from] PolarsError),
}

/// Numeric fields of a hospital row that can be summarized or charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ReadmissionRate,
    Alos,
    Cmi,
    NormalizedReadmissionRate,
    NormalizedAlos,
    StaffedBeds,
    MedicareTotalClaims,
    NumberOfDischarges,
}

impl Metric {
    /// Outcome metrics shown in summaries, in display order.
    pub const OUTCOMES: [Metric; 5] = [
        Metric::ReadmissionRate,
        Metric::Alos,
        Metric::Cmi,
        Metric::NormalizedReadmissionRate,
        Metric::NormalizedAlos,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::ReadmissionRate => "Readmission Rate",
            Metric::Alos => "ALOS",
            Metric::Cmi => "CMI",
            Metric::NormalizedReadmissionRate => "Normalized Readmission Rate",
            Metric::NormalizedAlos => "Normalized ALOS",
            Metric::StaffedBeds => "Staffed Beds",
            Metric::MedicareTotalClaims => "Medicare Total Claims",
            Metric::NumberOfDischarges => "Number of Discharges",
        }
    }

    /// Rates are fractions and render as percentages.
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            Metric::ReadmissionRate | Metric::NormalizedReadmissionRate
        )
    }

    /// Render a value of this metric for display.
    pub fn format_value(self, value: f64) -> String {
        match self {
            m if m.is_rate() => format!("{:.1}%", value * 100.0),
            Metric::StaffedBeds | Metric::MedicareTotalClaims | Metric::NumberOfDischarges => {
                format!("{:.0}", value)
            }
            _ => format!("{:.2}", value),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Accepts labels ("Normalized ALOS") and identifiers ("normalized-alos", "normalized_alos").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match key.as_str() {
            "readmission_rate" | "readmission" => Ok(Metric::ReadmissionRate),
            "alos" => Ok(Metric::Alos),
            "cmi" => Ok(Metric::Cmi),
            "normalized_readmission_rate" | "normalized_readmission" => {
                Ok(Metric::NormalizedReadmissionRate)
            }
            "normalized_alos" => Ok(Metric::NormalizedAlos),
            "staffed_beds" | "beds" | "number_of_staffed_beds" => Ok(Metric::StaffedBeds),
            "medicare_total_claims" | "claims" | "volume" => Ok(Metric::MedicareTotalClaims),
            "number_of_discharges" | "discharges" => Ok(Metric::NumberOfDischarges),
            _ => Err(format!("unknown metric '{}'", s)),
        }
    }
}

/// Divide an outcome by case mix. Missing operands or a zero CMI give a missing result.
pub fn normalize_by_cmi(value: Option<f64>, cmi: Option<f64>) -> Option<f64> {
    match (value, cmi) {
        (Some(v), Some(c)) if c != 0.0 => Some(v / c),
        _ => None,
    }
}

/// One hospital row of the prepared table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalRecord {
    pub provider_id: String,
    pub hospital_name: Option<String>,
    pub idn: String,
    pub location: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub staffed_beds: Option<f64>,
    pub medicare_total_claims: Option<f64>,
    pub number_of_discharges: Option<f64>,
    pub readmission_rate: Option<f64>,
    pub alos: Option<f64>,
    pub cmi: Option<f64>,
    pub normalized_alos: Option<f64>,
    pub normalized_readmission_rate: Option<f64>,
}

impl HospitalRecord {
    /// Recompute the CMI-normalized fields from their operands.
    pub fn renormalize(&mut self) {
        self.normalized_alos = normalize_by_cmi(self.alos, self.cmi);
        self.normalized_readmission_rate = normalize_by_cmi(self.readmission_rate, self.cmi);
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ReadmissionRate => self.readmission_rate,
            Metric::Alos => self.alos,
            Metric::Cmi => self.cmi,
            Metric::NormalizedReadmissionRate => self.normalized_readmission_rate,
            Metric::NormalizedAlos => self.normalized_alos,
            Metric::StaffedBeds => self.staffed_beds,
            Metric::MedicareTotalClaims => self.medicare_total_claims,
            Metric::NumberOfDischarges => self.number_of_discharges,
        }
    }

    /// State of this hospital: the part of the combined location after the
    /// last ", " (the whole location when it has no separator), else the
    /// dedicated field.
    pub fn state_token(&self) -> Option<&str> {
        let from_location = self
            .location
            .as_deref()
            .map(|loc| loc.rsplit_once(", ").map_or(loc, |(_, state)| state).trim())
            .filter(|s| !s.is_empty());
        from_location.or_else(|| self.state.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    }

    /// "{provider_id} - {hospital_name}" label used by selection lists.
    pub fn display_name(&self) -> Option<String> {
        self.hospital_name
            .as_ref()
            .map(|name| format!("{} - {}", self.provider_id, name))
    }
}

/// The prepared hospital table. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    frame: DataFrame,
    records: Vec<HospitalRecord>,
    columns: ColumnNames,
    by_provider: HashMap<String, usize>,
}

impl PreparedTable {
    /// `frame` and `records` must describe the same rows in the same order.
    pub(crate) fn new(frame: DataFrame, records: Vec<HospitalRecord>, columns: ColumnNames) -> Self {
        let by_provider = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.provider_id.clone(), i))
            .collect();
        Self {
            frame,
            records,
            columns,
            by_provider,
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn records(&self) -> &[HospitalRecord] {
        &self.records
    }

    pub fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, provider_id: &str) -> Option<&HospitalRecord> {
        self.by_provider
            .get(provider_id)
            .map(|&pos| &self.records[pos])
    }

    pub(crate) fn position_of(&self, provider_id: &str) -> Option<usize> {
        self.by_provider.get(provider_id).copied()
    }

    /// Every row of the table.
    pub fn all_rows(&self) -> RowSet<'_> {
        RowSet {
            table: self,
            rows: (0..self.records.len()).collect(),
        }
    }

    /// Rows whose record satisfies `predicate`.
    pub fn select<F>(&self, predicate: F) -> RowSet<'_>
    where
        F: Fn(&HospitalRecord) -> bool,
    {
        let rows = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| predicate(r))
            .map(|(i, _)| i)
            .collect();
        RowSet { table: self, rows }
    }

    /// Write the whole prepared table as comma-separated text.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut df = self.frame.clone();
        CsvWriter::new(writer).include_header(true).finish(&mut df)?;
        Ok(())
    }
}

/// A set of rows of one [`PreparedTable`], held as ascending row positions.
#[derive(Debug, Clone)]
pub struct RowSet<'a> {
    table: &'a PreparedTable,
    rows: Vec<usize>,
}

impl<'a> RowSet<'a> {
    pub fn empty(table: &'a PreparedTable) -> Self {
        Self {
            table,
            rows: Vec::new(),
        }
    }

    pub(crate) fn from_positions(table: &'a PreparedTable, mut rows: Vec<usize>) -> Self {
        rows.sort_unstable();
        rows.dedup();
        Self { table, rows }
    }

    pub fn table(&self) -> &'a PreparedTable {
        self.table
    }

    pub fn positions(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &'a HospitalRecord> + '_ {
        let table = self.table;
        self.rows.iter().map(move |&i| &table.records[i])
    }

    pub fn first(&self) -> Option<&'a HospitalRecord> {
        self.rows.first().map(|&i| &self.table.records[i])
    }

    pub fn provider_ids(&self) -> Vec<&'a str> {
        self.records().map(|r| r.provider_id.as_str()).collect()
    }

    pub fn contains_provider(&self, provider_id: &str) -> bool {
        self.records().any(|r| r.provider_id == provider_id)
    }

    /// Non-missing values of `metric`, in row order.
    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.records().filter_map(|r| r.value(metric)).collect()
    }

    /// Rows of this set whose record satisfies `predicate`.
    pub fn filter<F>(&self, predicate: F) -> RowSet<'a>
    where
        F: Fn(&HospitalRecord) -> bool,
    {
        let table = self.table;
        let rows = self
            .rows
            .iter()
            .copied()
            .filter(|&i| predicate(&table.records[i]))
            .collect();
        RowSet { table, rows }
    }

    /// Rows of either set, de-duplicated by provider id.
    pub fn union(&self, other: &RowSet<'a>) -> RowSet<'a> {
        let mut seen: HashSet<&str> = self.provider_ids().into_iter().collect();
        let mut rows = self.rows.clone();
        for &pos in &other.rows {
            if seen.insert(self.table.records[pos].provider_id.as_str()) {
                rows.push(pos);
            }
        }
        RowSet::from_positions(self.table, rows)
    }

    /// Materialize the selected rows with every prepared column.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let positions: Vec<IdxSize> = self.rows.iter().map(|&i| i as IdxSize).collect();
        let idx = IdxCa::from_vec("row".into(), positions);
        self.table.frame.take(&idx)
    }

    /// Write the selected rows as comma-separated text with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer).include_header(true).finish(&mut df)?;
        Ok(())
    }
}
