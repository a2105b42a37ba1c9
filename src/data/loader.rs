//! CSV Data Loader Module
//! Handles hospital table ingestion using Polars.

use crate::config::AnalyzerConfig;
use crate::data::processor::{DataProcessor, PrepareError};
use crate::data::table::PreparedTable;
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to prepare hospital table: {0}")]
    PrepareError(#[from] PrepareError),
    #[error("No data loaded")]
    NoData,
}

/// Reads hospital tables from delimited text.
pub struct DataLoader {
    df: Option<DataFrame>,
    file_path: Option<PathBuf>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            df: None,
            file_path: None,
        }
    }

    /// Load a CSV file with every column read as text.
    ///
    /// Provider ids keep their leading zeros; typing happens in preparation.
    pub fn load_csv(&mut self, file_path: impl AsRef<Path>) -> Result<&DataFrame, LoaderError> {
        let file_path = file_path.as_ref();
        self.file_path = Some(file_path.to_path_buf());

        let df = LazyCsvReader::new(file_path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;

        info!(
            "Loaded {} rows, {} columns from {}",
            df.height(),
            df.width(),
            file_path.display()
        );
        self.df = Some(df);
        self.df.as_ref().ok_or(LoaderError::NoData)
    }

    /// Get list of column names from loaded DataFrame.
    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .as_ref()
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get the number of rows in the DataFrame.
    pub fn get_row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }

    /// Get a reference to the loaded DataFrame.
    pub fn get_dataframe(&self) -> Option<&DataFrame> {
        self.df.as_ref()
    }

    /// Get file path.
    pub fn get_file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    /// Prepare the loaded frame into a shareable table.
    pub fn prepare(&self, config: &AnalyzerConfig) -> Result<Arc<PreparedTable>, LoaderError> {
        let df = self.df.as_ref().ok_or(LoaderError::NoData)?;
        let table = DataProcessor::prepare(df, &config.columns)?;
        if let Some(path) = self.get_file_path() {
            info!("Prepared {} hospitals from {}", table.len(), path.display());
        }
        Ok(Arc::new(table))
    }
}

/// Load and prepare a hospital table in one call.
pub fn load_prepared(
    path: impl AsRef<Path>,
    config: &AnalyzerConfig,
) -> Result<Arc<PreparedTable>, LoaderError> {
    let mut loader = DataLoader::new();
    loader.load_csv(path)?;
    loader.prepare(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    fn create_test_csv(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn reads_every_column_as_text() {
        let file = create_test_csv(
            "Provider,Hospital,IDN,Readmission Rate,ALOS,CMI\n\
             001,Alpha,SysX,0.10,5.0,1.0\n\
             002,Beta,,0.20,8.0,2.0\n",
        )
        .unwrap();

        let mut loader = DataLoader::new();
        let df = loader.load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("Provider").unwrap().dtype(), &DataType::String);
        assert_eq!(loader.get_row_count(), 2);
        assert_eq!(loader.get_columns()[0], "Provider");
        assert_eq!(loader.get_file_path().map(PathBuf::as_path), Some(file.path()));
    }

    #[test]
    fn load_prepared_keeps_leading_zeros() {
        let file = create_test_csv(
            "Provider,Hospital,IDN,Readmission Rate,ALOS,CMI\n\
             001,Alpha,SysX,0.10,5.0,1.0\n\
             002,Beta,,0.20,8.0,oops\n",
        )
        .unwrap();

        let table = load_prepared(file.path(), &AnalyzerConfig::default()).unwrap();
        assert!(table.get("001").is_some());
        assert_eq!(table.get("002").unwrap().idn, "Independent");
        assert_eq!(table.get("002").unwrap().cmi, None);
    }

    #[test]
    fn prepare_without_data_fails() {
        let loader = DataLoader::new();
        assert!(matches!(
            loader.prepare(&AnalyzerConfig::default()),
            Err(LoaderError::NoData)
        ));
    }

    #[test]
    fn schema_error_surfaces_through_loader() {
        let file = create_test_csv("Provider,Hospital\n001,Alpha\n").unwrap();

        let err = load_prepared(file.path(), &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::PrepareError(PrepareError::SchemaError { .. })
        ));
        assert!(err.to_string().contains("CMI"));
    }
}
