//! Report Module
//! Assembles the per-request view consumed by front-ends and renders it as text.

use crate::charts::{BoxSummary, ChartSeries, Histogram, Quadrant, QuadrantProjection};
use crate::cohort::{Cohort, CohortEngine, CohortRequest, ComparatorSpec};
use crate::config::AnalyzerConfig;
use crate::data::{Metric, PreparedTable};
use crate::stats::{DatasetOverview, IndexComparison, IndexProfile, MetricSummary, StatsCalculator};
use serde::Serialize;
use std::fmt;

/// Everything a front-end shows for one request.
#[derive(Debug, Clone, Serialize)]
pub struct CohortReport {
    pub comparator_spec: ComparatorSpec,
    pub index: Option<IndexProfile>,
    pub comparator_count: usize,
    pub summaries: Vec<(Metric, Option<MetricSummary>)>,
    pub metric: Metric,
    pub comparison: Option<IndexComparison>,
    pub histogram: Option<Histogram>,
    pub comparator_box: Option<BoxSummary>,
    pub quadrants: QuadrantProjection,
}

impl CohortReport {
    /// Build the report for `request`, focusing the charts on `metric`.
    pub fn build(
        table: &PreparedTable,
        request: &CohortRequest,
        metric: Metric,
        config: &AnalyzerConfig,
    ) -> Self {
        let cohort = CohortEngine::build(table, request);
        Self::from_cohort(&cohort, request.comparator, metric, config)
    }

    pub fn from_cohort(
        cohort: &Cohort<'_>,
        comparator_spec: ComparatorSpec,
        metric: Metric,
        config: &AnalyzerConfig,
    ) -> Self {
        let Cohort { index, comparator } = cohort;
        Self {
            comparator_spec,
            index: IndexProfile::from_index(index),
            comparator_count: comparator.len(),
            summaries: StatsCalculator::describe_outcomes(comparator),
            metric,
            comparison: StatsCalculator::compare(index, comparator, metric),
            histogram: ChartSeries::histogram(comparator, metric, config.histogram_bins),
            comparator_box: ChartSeries::box_summary(comparator, metric),
            quadrants: ChartSeries::project_quadrants(comparator).with_highlight(index),
        }
    }
}

fn optional(metric: Metric, value: Option<f64>) -> String {
    value
        .map(|v| metric.format_value(v))
        .unwrap_or_else(|| "N/A".to_string())
}

impl fmt::Display for CohortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        writeln!(f, "INDEX HOSPITAL/IDN")?;
        writeln!(f, "{}", rule)?;
        match &self.index {
            None => writeln!(f, "No hospital or IDN matches the selection")?,
            Some(IndexProfile::Hospital { record }) => {
                writeln!(
                    f,
                    "Hospital: {}",
                    record.hospital_name.as_deref().unwrap_or("N/A")
                )?;
                writeln!(f, "Provider ID: {}", record.provider_id)?;
                writeln!(f, "IDN: {}", record.idn)?;
                writeln!(f, "Location: {}", record.location.as_deref().unwrap_or("N/A"))?;
                writeln!(
                    f,
                    "Staffed Beds: {}",
                    optional(Metric::StaffedBeds, record.staffed_beds)
                )?;
                for metric in Metric::OUTCOMES {
                    writeln!(f, "{}: {}", metric, optional(metric, record.value(metric)))?;
                }
            }
            Some(IndexProfile::System {
                idn,
                hospital_count,
                averages,
            }) => {
                writeln!(f, "IDN: {}", idn)?;
                writeln!(f, "Number of Hospitals: {}", hospital_count)?;
                for (metric, mean) in averages {
                    writeln!(f, "Avg {}: {}", metric, optional(*metric, *mean))?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "COMPARATOR GROUP ({})", self.comparator_spec)?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Number of Hospitals: {}", self.comparator_count)?;
        for (metric, summary) in &self.summaries {
            let Some(s) = summary else {
                continue;
            };
            writeln!(f, "{} distribution:", metric)?;
            writeln!(f, "  Mean: {}", metric.format_value(s.mean))?;
            writeln!(f, "  Median: {}", metric.format_value(s.median))?;
            writeln!(
                f,
                "  25th-75th Percentile: {} - {}",
                metric.format_value(s.p25),
                metric.format_value(s.p75)
            )?;
            writeln!(
                f,
                "  Min/Max: {} / {}",
                metric.format_value(s.min),
                metric.format_value(s.max)
            )?;
        }

        writeln!(f)?;
        match &self.comparison {
            Some(c) => writeln!(
                f,
                "{} {}: {} ({:.1}th percentile of {} comparator values)",
                c.kind.label(),
                c.metric,
                c.metric.format_value(c.index_value),
                c.percentile_rank * 100.0,
                c.comparator.count
            )?,
            None => writeln!(f, "No {} data available for the comparison", self.metric)?,
        }
        if let Some(b) = &self.comparator_box {
            writeln!(
                f,
                "Whiskers: {} - {} ({} outliers)",
                self.metric.format_value(b.whisker_low),
                self.metric.format_value(b.whisker_high),
                b.outliers.len()
            )?;
        }

        if let (Some(mx), Some(my)) = (self.quadrants.mean_x, self.quadrants.mean_y) {
            writeln!(
                f,
                "Quadrants around normalized ALOS {:.2} / normalized readmission {:.1}%:",
                mx,
                my * 100.0
            )?;
            for (quadrant, label) in [
                (Quadrant::LowAlosLowReadmission, "low ALOS, low readmission"),
                (Quadrant::LowAlosHighReadmission, "low ALOS, high readmission"),
                (Quadrant::HighAlosLowReadmission, "high ALOS, low readmission"),
                (Quadrant::HighAlosHighReadmission, "high ALOS, high readmission"),
            ] {
                writeln!(f, "  {}: {}", label, self.quadrants.counts(quadrant))?;
            }
            for point in self.quadrants.points.iter().filter(|p| p.is_index) {
                writeln!(f, "  index {} is {:?}", point.provider_id, point.quadrant)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for DatasetOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DATASET OVERVIEW")?;
        writeln!(f, "Total Hospitals: {}", self.total_hospitals)?;
        writeln!(f, "Total IDNs: {}", self.total_idns)?;
        match self.states_covered {
            Some(n) => writeln!(f, "States Covered: {}", n)?,
            None => writeln!(f, "States Covered: N/A")?,
        }
        if let Some(total) = self.total_discharges {
            writeln!(f, "Total Discharges: {:.0}", total)?;
        }
        Ok(())
    }
}
