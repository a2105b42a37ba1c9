//! Statistics module - descriptive summaries and percentile ranks

mod calculator;
mod profile;

pub use calculator::{IndexComparison, IndexValueKind, MetricSummary, StatsCalculator};
pub use profile::{DatasetOverview, IndexProfile};
