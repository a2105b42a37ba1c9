//! Hospital Outcomes - cohort comparison engine for DRG 329-334 readmission data
//!
//! A prepared hospital table is built once per load ([`data::DataProcessor::prepare`])
//! and then queried per interaction: resolve the index hospital or IDN, build the
//! comparator group, narrow it by size similarity, and summarize both groups.
//!
//! The prepared table is immutable and can be shared across callers behind an
//! `Arc`; every engine operation returns fresh row-sets over it.

pub mod charts;
pub mod cohort;
pub mod config;
pub mod data;
pub mod report;
pub mod stats;

pub use cohort::{
    Cohort, CohortEngine, CohortRequest, ComparatorSpec, DisplayOptions, Selection,
    SimilarityFilter,
};
pub use config::{AnalyzerConfig, ColumnNames};
pub use data::{
    load_prepared, DataLoader, DataProcessor, HospitalRecord, Metric, PrepareError,
    PreparedTable, RowSet,
};
pub use report::CohortReport;
pub use stats::{MetricSummary, StatsCalculator};
