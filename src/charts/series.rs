//! Chart Series Module
//! Chart-ready data for the distribution, comparison and quadrant views.
//! Rendering belongs to the front-end; these are plain values.

use crate::data::{Metric, RowSet};
use crate::stats::StatsCalculator;
use serde::Serialize;
use std::collections::HashSet;

/// One bar of a histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Distribution of one metric with mean and median markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub metric: Metric,
    pub bins: Vec<HistogramBin>,
    pub mean: f64,
    pub median: f64,
}

/// Box-plot geometry for the comparison chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

/// Position of a hospital relative to the means of the displayed points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    LowAlosLowReadmission,
    LowAlosHighReadmission,
    HighAlosLowReadmission,
    HighAlosHighReadmission,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantPoint {
    pub provider_id: String,
    pub hospital_name: Option<String>,
    /// Normalized ALOS.
    pub x: f64,
    /// Normalized readmission rate.
    pub y: f64,
    pub quadrant: Quadrant,
    pub is_index: bool,
}

/// Normalized ALOS against normalized readmission rate.
///
/// The quadrant lines are the means of the points shown, so membership is
/// relative to the current cohort only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuadrantProjection {
    pub points: Vec<QuadrantPoint>,
    pub mean_x: Option<f64>,
    pub mean_y: Option<f64>,
}

impl QuadrantProjection {
    /// Mark the points belonging to `index`.
    pub fn with_highlight(mut self, index: &RowSet<'_>) -> Self {
        let ids: HashSet<&str> = index.provider_ids().into_iter().collect();
        for point in &mut self.points {
            point.is_index = ids.contains(point.provider_id.as_str());
        }
        self
    }

    /// Number of points in each quadrant.
    pub fn counts(&self, quadrant: Quadrant) -> usize {
        self.points.iter().filter(|p| p.quadrant == quadrant).count()
    }
}

/// Builds chart series from row-sets.
pub struct ChartSeries;

impl ChartSeries {
    /// Equal-width histogram of `metric`. `None` when no row has a value.
    pub fn histogram(rows: &RowSet<'_>, metric: Metric, bin_count: usize) -> Option<Histogram> {
        let values = rows.values(metric);
        let summary = StatsCalculator::describe_values(&values)?;
        let bin_count = bin_count.max(1);

        let (mut low, mut high) = (summary.min, summary.max);
        if low == high {
            low -= 0.5;
            high += 0.5;
        }
        let width = (high - low) / bin_count as f64;

        let mut counts = vec![0usize; bin_count];
        for v in &values {
            let slot = (((v - low) / width).floor() as usize).min(bin_count - 1);
            counts[slot] += 1;
        }

        let bins = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: low + width * i as f64,
                upper: if i + 1 == bin_count {
                    high
                } else {
                    low + width * (i + 1) as f64
                },
                count,
            })
            .collect();

        Some(Histogram {
            metric,
            bins,
            mean: summary.mean,
            median: summary.median,
        })
    }

    /// Quartiles with 1.5 IQR whiskers. `None` when no row has a value.
    pub fn box_summary(rows: &RowSet<'_>, metric: Metric) -> Option<BoxSummary> {
        let mut sorted = rows.values(metric);
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = StatsCalculator::percentile(&sorted, 25.0);
        let median = StatsCalculator::percentile(&sorted, 50.0);
        let q3 = StatsCalculator::percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let (fence_low, fence_high) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let whisker_low = sorted
            .iter()
            .copied()
            .find(|&v| v >= fence_low)
            .unwrap_or(q1);
        let whisker_high = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= fence_high)
            .unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|&v| v < fence_low || v > fence_high)
            .collect();

        Some(BoxSummary {
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
        })
    }

    /// Project rows onto (normalized ALOS, normalized readmission rate),
    /// dropping rows missing either coordinate.
    pub fn project_quadrants(rows: &RowSet<'_>) -> QuadrantProjection {
        let coords: Vec<(&str, Option<&String>, f64, f64)> = rows
            .records()
            .filter_map(|r| {
                let x = r.normalized_alos?;
                let y = r.normalized_readmission_rate?;
                Some((r.provider_id.as_str(), r.hospital_name.as_ref(), x, y))
            })
            .collect();

        if coords.is_empty() {
            return QuadrantProjection {
                points: Vec::new(),
                mean_x: None,
                mean_y: None,
            };
        }

        let n = coords.len() as f64;
        let mean_x = coords.iter().map(|c| c.2).sum::<f64>() / n;
        let mean_y = coords.iter().map(|c| c.3).sum::<f64>() / n;

        let points = coords
            .into_iter()
            .map(|(provider_id, hospital_name, x, y)| QuadrantPoint {
                provider_id: provider_id.to_string(),
                hospital_name: hospital_name.cloned(),
                x,
                y,
                quadrant: match (x <= mean_x, y <= mean_y) {
                    (true, true) => Quadrant::LowAlosLowReadmission,
                    (true, false) => Quadrant::LowAlosHighReadmission,
                    (false, true) => Quadrant::HighAlosLowReadmission,
                    (false, false) => Quadrant::HighAlosHighReadmission,
                },
                is_index: false,
            })
            .collect();

        QuadrantProjection {
            points,
            mean_x: Some(mean_x),
            mean_y: Some(mean_y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{CohortEngine, Selection};
    use crate::config::ColumnNames;
    use crate::data::{DataProcessor, PreparedTable};
    use approx::assert_abs_diff_eq;

    fn table() -> PreparedTable {
        let raw = polars::df!(
            "Provider" => ["1", "2", "3", "4", "5"],
            "Hospital" => ["A", "B", "C", "D", "E"],
            "IDN" => ["SysX", "SysX", "SysY", "SysY", "SysY"],
            "Readmission Rate" => [Some(0.10), Some(0.30), Some(0.20), Some(0.40), None],
            "ALOS" => [4.0, 8.0, 6.0, 10.0, 5.0],
            "CMI" => [1.0, 1.0, 1.0, 1.0, 1.0]
        )
        .unwrap();
        DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap()
    }

    #[test]
    fn histogram_bins_cover_range() {
        let table = table();
        let h = ChartSeries::histogram(&table.all_rows(), Metric::Alos, 3).unwrap();

        assert_eq!(h.bins.len(), 3);
        assert_eq!(h.bins[0].lower, 4.0);
        assert_eq!(h.bins[2].upper, 10.0);
        // 4, 5 | 6 | 8, 10 with edges 4, 6, 8, 10
        let counts: Vec<usize> = h.bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, [2, 1, 2]);
        assert_eq!(counts.iter().sum::<usize>(), 5);
        assert_abs_diff_eq!(h.median, 6.0);
    }

    #[test]
    fn histogram_of_constant_values() {
        let table = table();
        let h = ChartSeries::histogram(&table.all_rows(), Metric::Cmi, 4).unwrap();
        assert_eq!(h.bins[0].lower, 0.5);
        assert_eq!(h.bins[3].upper, 1.5);
        assert_eq!(h.bins.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn box_summary_flags_outliers() {
        let raw = polars::df!(
            "Provider" => ["1", "2", "3", "4", "5", "6"],
            "Hospital" => ["A", "B", "C", "D", "E", "F"],
            "IDN" => ["S", "S", "S", "S", "S", "S"],
            "Readmission Rate" => [0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
            "ALOS" => [5.0, 5.0, 6.0, 6.0, 7.0, 30.0],
            "CMI" => [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        )
        .unwrap();
        let table = DataProcessor::prepare(&raw, &ColumnNames::default()).unwrap();

        let b = ChartSeries::box_summary(&table.all_rows(), Metric::Alos).unwrap();
        assert_eq!(b.outliers, [30.0]);
        assert_eq!(b.whisker_high, 7.0);
        assert_eq!(b.whisker_low, 5.0);
    }

    #[test]
    fn quadrants_follow_displayed_points() {
        let table = table();
        let all = ChartSeries::project_quadrants(&table.all_rows());
        // row 5 has no readmission rate
        assert_eq!(all.points.len(), 4);
        assert_abs_diff_eq!(all.mean_x.unwrap(), 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(all.mean_y.unwrap(), 0.25, epsilon = 1e-12);

        let sys_x = CohortEngine::resolve_index(&table, &Selection::System("SysX".into()));
        let subset = ChartSeries::project_quadrants(&sys_x);
        assert_abs_diff_eq!(subset.mean_x.unwrap(), 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(subset.mean_y.unwrap(), 0.2, epsilon = 1e-12);
        assert_eq!(subset.counts(Quadrant::LowAlosLowReadmission), 1);
        assert_eq!(subset.counts(Quadrant::HighAlosHighReadmission), 1);
    }

    #[test]
    fn highlight_marks_index_points() {
        let table = table();
        let index = CohortEngine::resolve_index(&table, &Selection::Hospital("2".into()));
        let projection = ChartSeries::project_quadrants(&table.all_rows()).with_highlight(&index);

        let marked: Vec<&str> = projection
            .points
            .iter()
            .filter(|p| p.is_index)
            .map(|p| p.provider_id.as_str())
            .collect();
        assert_eq!(marked, ["2"]);
    }

    #[test]
    fn empty_rows_project_nothing() {
        let table = table();
        let index = CohortEngine::resolve_index(&table, &Selection::Hospital("none".into()));
        let projection = ChartSeries::project_quadrants(&index);
        assert!(projection.points.is_empty());
        assert_eq!(projection.mean_x, None);
    }
}
