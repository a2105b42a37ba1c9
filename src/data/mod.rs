//! Data module - table ingestion, preparation and row-set views

mod loader;
mod processor;
mod table;

pub use loader::{load_prepared, DataLoader, LoaderError};
pub use processor::{DataProcessor, PrepareError};
pub use table::{
    normalize_by_cmi, ExportError, HospitalRecord, Metric, PreparedTable, RowSet, INDEPENDENT_IDN,
};
