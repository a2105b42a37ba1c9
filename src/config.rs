//! Analyzer Configuration Module
//! Column mapping and presentation defaults, loadable from a JSON file.

use crate::cohort::DisplayOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Header names of the hospital table.
///
/// Defaults match the DRG 329-334 readmission workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub provider_id: String,
    pub hospital_name: String,
    pub idn: String,
    pub location: String,
    pub city: String,
    pub state: String,
    pub staffed_beds: String,
    pub medicare_total_claims: String,
    pub number_of_discharges: String,
    pub readmission_rate: String,
    pub alos: String,
    pub cmi: String,
    pub normalized_alos: String,
    pub normalized_readmission_rate: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            provider_id: "Provider".to_string(),
            hospital_name: "Hospital".to_string(),
            idn: "IDN".to_string(),
            location: "City/State".to_string(),
            city: "City".to_string(),
            state: "State".to_string(),
            staffed_beds: "Number of Staffed Beds".to_string(),
            medicare_total_claims: "Medicare Total Claims".to_string(),
            number_of_discharges: "Number of Discharges".to_string(),
            readmission_rate: "Readmission Rate".to_string(),
            alos: "ALOS".to_string(),
            cmi: "CMI".to_string(),
            normalized_alos: "Normalized ALOS".to_string(),
            normalized_readmission_rate: "Normalized Readmission Rate".to_string(),
        }
    }
}

impl ColumnNames {
    /// Columns that must be present in the raw table.
    pub fn required(&self) -> [&str; 6] {
        [
            self.provider_id.as_str(),
            self.hospital_name.as_str(),
            self.idn.as_str(),
            self.readmission_rate.as_str(),
            self.alos.as_str(),
            self.cmi.as_str(),
        ]
    }

    /// Columns coerced to numbers during preparation.
    pub fn numeric(&self) -> [&str; 6] {
        [
            self.cmi.as_str(),
            self.readmission_rate.as_str(),
            self.alos.as_str(),
            self.staffed_beds.as_str(),
            self.medicare_total_claims.as_str(),
            self.number_of_discharges.as_str(),
        ]
    }

    /// Columns normalized to trimmed text during preparation.
    pub fn textual(&self) -> [&str; 6] {
        [
            self.provider_id.as_str(),
            self.hospital_name.as_str(),
            self.idn.as_str(),
            self.location.as_str(),
            self.city.as_str(),
            self.state.as_str(),
        ]
    }
}

/// Top-level settings shared by every front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub columns: ColumnNames,
    pub display: DisplayOptions,
    pub histogram_bins: usize,
    /// Default similarity window, in percent.
    pub similarity_tolerance_pct: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            display: DisplayOptions::default(),
            histogram_bins: 30,
            similarity_tolerance_pct: 5.0,
        }
    }
}

impl AnalyzerConfig {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
