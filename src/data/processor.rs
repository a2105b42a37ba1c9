//! Data Processor Module
//! Turns a raw hospital table into the immutable prepared table.

use crate::config::ColumnNames;
use crate::data::table::{normalize_by_cmi, HospitalRecord, PreparedTable, INDEPENDENT_IDN};
use log::{info, warn};
use polars::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    SchemaError { missing: Vec<String> },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Handles dataset preparation: type coercion, cleanup and derived metrics.
pub struct DataProcessor;

impl DataProcessor {
    /// Prepare a raw table for the cohort engine.
    ///
    /// Steps, in order:
    /// 1. numeric columns (CMI first) are coerced; unparseable cells become missing
    /// 2. columns that are entirely missing are dropped
    /// 3. missing IDNs become "Independent"
    /// 4. a combined location is synthesized from city and state when absent
    /// 5. CMI-normalized ALOS and readmission rate are derived
    ///
    /// Rows without a provider id and repeated provider ids are then removed.
    pub fn prepare(raw: &DataFrame, columns: &ColumnNames) -> Result<PreparedTable, PrepareError> {
        let missing: Vec<String> = columns
            .required()
            .iter()
            .filter(|name| raw.column(name).is_err())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PrepareError::SchemaError { missing });
        }

        let mut df = raw.clone();

        for name in columns.numeric() {
            if let Ok(column) = df.column(name) {
                let coerced = Column::new(name.into(), Self::numeric_values(column)?);
                df.with_column(coerced)?;
            }
        }
        for name in columns.textual() {
            if let Ok(column) = df.column(name) {
                let normalized = Column::new(name.into(), Self::text_values(column)?);
                df.with_column(normalized)?;
            }
        }

        df = Self::drop_empty_columns(df)?;
        Self::fill_idn(&mut df, columns)?;
        Self::synthesize_location(&mut df, columns)?;
        Self::derive_normalized(&mut df, columns)?;
        let df = Self::enforce_unique_providers(df, columns)?;

        let records = Self::extract_records(&df, columns)?;
        info!(
            "Prepared {} hospitals with {} columns",
            records.len(),
            df.width()
        );
        Ok(PreparedTable::new(df, records, columns.clone()))
    }

    /// Parse a column as numbers. Text that is not a finite number becomes missing.
    pub fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>, PolarsError> {
        let series = column.as_materialized_series();
        let values: Vec<Option<f64>> = match series.dtype() {
            DataType::String => series
                .str()?
                .into_iter()
                .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
                .map(|v| v.filter(|x| x.is_finite()))
                .collect(),
            _ => {
                let as_f64 = series.cast(&DataType::Float64)?;
                as_f64
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect()
            }
        };
        Ok(values)
    }

    /// Read a column as trimmed text. Integral floats lose their fractional part
    /// so numeric provider ids read back as "10001", not "10001.0".
    pub fn text_values(column: &Column) -> Result<Vec<Option<String>>, PolarsError> {
        let series = column.as_materialized_series();
        let values: Vec<Option<String>> = match series.dtype() {
            DataType::String => series
                .str()?
                .into_iter()
                .map(|v| v.map(|s| s.trim().to_string()))
                .collect(),
            DataType::Float32 | DataType::Float64 => {
                let as_f64 = series.cast(&DataType::Float64)?;
                as_f64
                    .f64()?
                    .into_iter()
                    .map(|v| {
                        v.filter(|x| !x.is_nan()).map(|x| {
                            if x.fract() == 0.0 && x.abs() < 1e15 {
                                format!("{}", x as i64)
                            } else {
                                x.to_string()
                            }
                        })
                    })
                    .collect()
            }
            _ => {
                let as_text = series.cast(&DataType::String)?;
                as_text
                    .str()?
                    .into_iter()
                    .map(|v| v.map(|s| s.trim().to_string()))
                    .collect()
            }
        };
        Ok(values)
    }

    /// Drop every column with no present value. An empty table keeps its header.
    fn drop_empty_columns(df: DataFrame) -> Result<DataFrame, PolarsError> {
        if df.height() == 0 {
            return Ok(df);
        }
        let empty: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| col.null_count() == df.height())
            .map(|col| col.name().to_string())
            .collect();

        let mut df = df;
        for name in &empty {
            df = df.drop(name)?;
        }
        if !empty.is_empty() {
            info!("Dropped empty columns: {}", empty.join(", "));
        }
        Ok(df)
    }

    fn fill_idn(df: &mut DataFrame, columns: &ColumnNames) -> Result<(), PolarsError> {
        let filled: Vec<String> = match df.column(&columns.idn) {
            Ok(column) => Self::text_values(column)?
                .into_iter()
                .map(|v| {
                    v.filter(|s| !s.is_empty())
                        .unwrap_or_else(|| INDEPENDENT_IDN.to_string())
                })
                .collect(),
            Err(_) => vec![INDEPENDENT_IDN.to_string(); df.height()],
        };
        df.with_column(Column::new(columns.idn.as_str().into(), filled))?;
        Ok(())
    }

    fn synthesize_location(df: &mut DataFrame, columns: &ColumnNames) -> Result<(), PolarsError> {
        if df.column(&columns.location).is_ok() {
            return Ok(());
        }
        let (Ok(city), Ok(state)) = (df.column(&columns.city), df.column(&columns.state)) else {
            return Ok(());
        };

        let cities = Self::text_values(city)?;
        let states = Self::text_values(state)?;
        let combined: Vec<String> = cities
            .into_iter()
            .zip(states)
            .map(|(city, state)| join_location(city.as_deref(), state.as_deref()))
            .collect();

        df.with_column(Column::new(columns.location.as_str().into(), combined))?;
        Ok(())
    }

    fn derive_normalized(df: &mut DataFrame, columns: &ColumnNames) -> Result<(), PolarsError> {
        let height = df.height();
        let cmi = Self::optional_numeric(df, &columns.cmi, height)?;
        let alos = Self::optional_numeric(df, &columns.alos, height)?;
        let readmission = Self::optional_numeric(df, &columns.readmission_rate, height)?;

        let normalized_alos: Vec<Option<f64>> = alos
            .iter()
            .zip(&cmi)
            .map(|(&v, &c)| normalize_by_cmi(v, c))
            .collect();
        let normalized_readmission: Vec<Option<f64>> = readmission
            .iter()
            .zip(&cmi)
            .map(|(&v, &c)| normalize_by_cmi(v, c))
            .collect();

        df.with_column(Column::new(
            columns.normalized_alos.as_str().into(),
            normalized_alos,
        ))?;
        df.with_column(Column::new(
            columns.normalized_readmission_rate.as_str().into(),
            normalized_readmission,
        ))?;
        Ok(())
    }

    fn enforce_unique_providers(
        df: DataFrame,
        columns: &ColumnNames,
    ) -> Result<DataFrame, PolarsError> {
        let ids = Self::optional_text(&df, &columns.provider_id, df.height())?;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut missing = 0usize;
        let mut duplicates = 0usize;

        let keep: Vec<bool> = ids
            .iter()
            .map(|id| match id.as_deref().filter(|s| !s.is_empty()) {
                None => {
                    missing += 1;
                    false
                }
                Some(id) if !seen.insert(id) => {
                    duplicates += 1;
                    false
                }
                Some(_) => true,
            })
            .collect();

        if missing == 0 && duplicates == 0 {
            return Ok(df);
        }
        if missing > 0 {
            warn!("Dropped {} rows without a provider id", missing);
        }
        if duplicates > 0 {
            warn!("Dropped {} rows repeating an earlier provider id", duplicates);
        }
        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        df.filter(&mask)
    }

    fn extract_records(
        df: &DataFrame,
        columns: &ColumnNames,
    ) -> Result<Vec<HospitalRecord>, PolarsError> {
        let height = df.height();
        let provider_ids = Self::optional_text(df, &columns.provider_id, height)?;
        let names = Self::optional_text(df, &columns.hospital_name, height)?;
        let idns = Self::optional_text(df, &columns.idn, height)?;
        let locations = Self::optional_text(df, &columns.location, height)?;
        let cities = Self::optional_text(df, &columns.city, height)?;
        let states = Self::optional_text(df, &columns.state, height)?;
        let beds = Self::optional_numeric(df, &columns.staffed_beds, height)?;
        let claims = Self::optional_numeric(df, &columns.medicare_total_claims, height)?;
        let discharges = Self::optional_numeric(df, &columns.number_of_discharges, height)?;
        let readmission = Self::optional_numeric(df, &columns.readmission_rate, height)?;
        let alos = Self::optional_numeric(df, &columns.alos, height)?;
        let cmi = Self::optional_numeric(df, &columns.cmi, height)?;

        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        let records = (0..height)
            .map(|i| {
                let location = non_empty(&locations[i]);
                let (derived_city, derived_state) = match location.as_deref() {
                    Some(loc) => split_location(loc),
                    None => (None, None),
                };
                let mut record = HospitalRecord {
                    provider_id: provider_ids[i].clone().unwrap_or_default(),
                    hospital_name: non_empty(&names[i]),
                    idn: idns[i]
                        .clone()
                        .unwrap_or_else(|| INDEPENDENT_IDN.to_string()),
                    location,
                    city: non_empty(&cities[i]).or(derived_city),
                    state: non_empty(&states[i]).or(derived_state),
                    staffed_beds: beds[i],
                    medicare_total_claims: claims[i],
                    number_of_discharges: discharges[i],
                    readmission_rate: readmission[i],
                    alos: alos[i],
                    cmi: cmi[i],
                    normalized_alos: None,
                    normalized_readmission_rate: None,
                };
                record.renormalize();
                record
            })
            .collect();
        Ok(records)
    }

    fn optional_text(
        df: &DataFrame,
        name: &str,
        height: usize,
    ) -> Result<Vec<Option<String>>, PolarsError> {
        match df.column(name) {
            Ok(column) => Self::text_values(column),
            Err(_) => Ok(vec![None; height]),
        }
    }

    fn optional_numeric(
        df: &DataFrame,
        name: &str,
        height: usize,
    ) -> Result<Vec<Option<f64>>, PolarsError> {
        match df.column(name) {
            Ok(column) => Self::numeric_values(column),
            Err(_) => Ok(vec![None; height]),
        }
    }
}

/// "{city}, {state}", or whichever part is present, or "" when both are missing.
fn join_location(city: Option<&str>, state: Option<&str>) -> String {
    let city = city.filter(|s| !s.is_empty());
    let state = state.filter(|s| !s.is_empty());
    match (city, state) {
        (Some(c), Some(s)) => format!("{}, {}", c, s),
        (Some(part), None) | (None, Some(part)) => part.to_string(),
        (None, None) => String::new(),
    }
}

/// Split "City, ST" at the last ", "; a location without the separator is
/// taken as the state.
fn split_location(location: &str) -> (Option<String>, Option<String>) {
    match location.rsplit_once(", ") {
        Some((city, state)) => (
            Some(city.trim().to_string()).filter(|s| !s.is_empty()),
            Some(state.trim().to_string()).filter(|s| !s.is_empty()),
        ),
        None => (None, Some(location.trim().to_string()).filter(|s| !s.is_empty())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn raw_table() -> DataFrame {
        polars::df!(
            "Provider" => ["001", "002", "003", "004"],
            "Hospital" => [Some("Alpha"), Some("Beta"), Some("Gamma"), None],
            "IDN" => [Some("SysX"), Some("SysX"), None, None],
            "City" => [Some("Boston"), Some("Worcester"), None, Some("Nashua")],
            "State" => [Some("MA"), Some("MA"), None, Some("NH")],
            "Readmission Rate" => ["0.10", "0.20", "0.15", ""],
            "ALOS" => ["5.0", "8.0", "6.0", "7"],
            "CMI" => ["1.0", "2.0", "n/a", "0"],
            "Notes" => [None::<&str>, None, None, None]
        )
        .unwrap()
    }

    #[test]
    fn missing_required_columns_are_named() {
        let raw = polars::df!(
            "Provider" => ["001"],
            "Hospital" => ["Alpha"]
        )
        .unwrap();

        let err = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap_err();
        match &err {
            PrepareError::SchemaError { missing } => {
                assert_eq!(missing, &["IDN", "Readmission Rate", "ALOS", "CMI"]);
            }
            other => panic!("Expected SchemaError, got {:?}", other),
        }
        assert!(err.to_string().contains("Readmission Rate"));
    }

    #[test]
    fn prepares_types_and_derived_columns() {
        let table = DataProcessor::prepare(&raw_table(), &ColumnNames::default()).unwrap();
        let records = table.records();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].cmi, Some(1.0));
        assert_eq!(records[2].cmi, None);
        assert_eq!(records[3].readmission_rate, None);

        assert_abs_diff_eq!(records[0].normalized_alos.unwrap(), 5.0);
        assert_abs_diff_eq!(records[1].normalized_alos.unwrap(), 4.0);
        assert_abs_diff_eq!(records[1].normalized_readmission_rate.unwrap(), 0.1);
        assert_eq!(records[2].normalized_alos, None);
        // zero CMI
        assert_eq!(records[3].normalized_alos, None);
    }

    #[test]
    fn drops_empty_columns_and_fills_idn() {
        let table = DataProcessor::prepare(&raw_table(), &ColumnNames::default()).unwrap();

        assert!(table.frame().column("Notes").is_err());
        assert_eq!(table.records()[2].idn, INDEPENDENT_IDN);
        assert_eq!(table.records()[0].idn, "SysX");
    }

    #[test]
    fn synthesizes_location_without_nan_text() {
        let table = DataProcessor::prepare(&raw_table(), &ColumnNames::default()).unwrap();

        let locations = DataProcessor::text_values(table.frame().column("City/State").unwrap())
            .unwrap();
        assert_eq!(locations[0].as_deref(), Some("Boston, MA"));
        assert_eq!(locations[2].as_deref(), Some(""));
        assert_eq!(table.records()[2].location, None);
        assert_eq!(table.records()[3].location.as_deref(), Some("Nashua, NH"));
    }

    #[test]
    fn derives_city_and_state_from_combined_location() {
        let raw = polars::df!(
            "Provider" => ["010"],
            "Hospital" => ["Delta"],
            "IDN" => ["SysY"],
            "City/State" => ["Winston-Salem, NC"],
            "Readmission Rate" => [0.12],
            "ALOS" => [4.2],
            "CMI" => [1.4]
        )
        .unwrap();

        let table = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap();
        let record = &table.records()[0];
        assert_eq!(record.city.as_deref(), Some("Winston-Salem"));
        assert_eq!(record.state.as_deref(), Some("NC"));
        assert_abs_diff_eq!(record.normalized_alos.unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn location_without_separator_is_a_state() {
        let raw = polars::df!(
            "Provider" => ["011", "012"],
            "Hospital" => ["Epsilon", "Zeta"],
            "IDN" => ["SysY", "SysY"],
            "City/State" => [" NY ", "Albany, NY"],
            "Readmission Rate" => [0.12, 0.14],
            "ALOS" => [4.2, 4.8],
            "CMI" => [1.4, 1.2]
        )
        .unwrap();

        let table = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap();
        let record = table.get("011").unwrap();
        assert_eq!(record.city, None);
        assert_eq!(record.state.as_deref(), Some("NY"));
        assert_eq!(record.state_token(), Some("NY"));
    }

    #[test]
    fn provider_ids_become_unique_text() {
        let raw = polars::df!(
            "Provider" => [Some(10001.0), Some(10002.0), Some(10001.0), None],
            "Hospital" => ["A", "B", "A again", "Nobody"],
            "IDN" => ["S", "S", "S", "S"],
            "Readmission Rate" => [0.1, 0.2, 0.3, 0.4],
            "ALOS" => [5.0, 5.0, 5.0, 5.0],
            "CMI" => [1.0, 1.0, 1.0, 1.0]
        )
        .unwrap();

        let table = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap();
        let ids: Vec<&str> = table
            .records()
            .iter()
            .map(|r| r.provider_id.as_str())
            .collect();
        assert_eq!(ids, ["10001", "10002"]);
        assert_eq!(table.frame().height(), 2);
        assert_eq!(table.get("10001").unwrap().hospital_name.as_deref(), Some("A"));
    }

    #[test]
    fn empty_idn_column_is_recreated() {
        let raw = polars::df!(
            "Provider" => ["1", "2"],
            "Hospital" => ["A", "B"],
            "IDN" => [None::<&str>, None],
            "Readmission Rate" => [0.1, 0.2],
            "ALOS" => [5.0, 6.0],
            "CMI" => [1.0, 1.2]
        )
        .unwrap();

        let table = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap();
        assert!(table.frame().column("IDN").is_ok());
        assert!(table.records().iter().all(|r| r.idn == INDEPENDENT_IDN));
    }

    #[test]
    fn join_location_handles_partial_parts() {
        assert_eq!(join_location(Some("Akron"), Some("OH")), "Akron, OH");
        assert_eq!(join_location(Some("Akron"), None), "Akron");
        assert_eq!(join_location(None, Some("OH")), "OH");
        assert_eq!(join_location(None, None), "");
    }
}
