//! Statistics Calculator Module
//! Descriptive statistics and percentile ranks over row-sets.

use crate::data::{Metric, RowSet};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Descriptive statistics of one metric over the non-missing values of a row-set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// How the index value of a comparison was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexValueKind {
    /// The single selected hospital's value.
    Hospital,
    /// Mean over the selected system's hospitals.
    SystemAverage,
}

impl IndexValueKind {
    pub fn label(self) -> &'static str {
        match self {
            IndexValueKind::Hospital => "Selected Hospital",
            IndexValueKind::SystemAverage => "Selected IDN (Average)",
        }
    }
}

/// The index placed within the comparator distribution of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexComparison {
    pub metric: Metric,
    pub kind: IndexValueKind,
    pub index_value: f64,
    /// Fraction of comparator values strictly below the index value.
    pub percentile_rank: f64,
    pub comparator: MetricSummary,
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Summarize `metric` over `rows`. `None` when no row has a value.
    pub fn describe(rows: &RowSet<'_>, metric: Metric) -> Option<MetricSummary> {
        Self::describe_values(&rows.values(metric))
    }

    /// Summarize a sample. `None` when it is empty.
    pub fn describe_values(values: &[f64]) -> Option<MetricSummary> {
        let n = values.len();
        if n == 0 {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mean = values.iter().mean();
        let std_dev = if n > 1 { values.iter().std_dev() } else { 0.0 };

        Some(MetricSummary {
            count: n,
            mean,
            median: Self::percentile(&sorted, 50.0),
            p25: Self::percentile(&sorted, 25.0),
            p75: Self::percentile(&sorted, 75.0),
            min: sorted[0],
            max: sorted[n - 1],
            std_dev,
        })
    }

    /// Summaries of every outcome metric, in display order.
    pub fn describe_outcomes(rows: &RowSet<'_>) -> Vec<(Metric, Option<MetricSummary>)> {
        Metric::OUTCOMES
            .iter()
            .map(|&metric| (metric, Self::describe(rows, metric)))
            .collect()
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Fraction of `distribution` strictly less than `value`. Ties do not count.
    pub fn percentile_rank(distribution: &[f64], value: f64) -> Option<f64> {
        if distribution.is_empty() {
            return None;
        }
        let below = distribution.iter().filter(|&&d| d < value).count();
        Some(below as f64 / distribution.len() as f64)
    }

    /// Value representing the index: the hospital's own value, or the system mean.
    pub fn index_value(index: &RowSet<'_>, metric: Metric) -> Option<(IndexValueKind, f64)> {
        match index.len() {
            0 => None,
            1 => index
                .first()
                .and_then(|r| r.value(metric))
                .map(|v| (IndexValueKind::Hospital, v)),
            _ => {
                let values = index.values(metric);
                if values.is_empty() {
                    None
                } else {
                    Some((IndexValueKind::SystemAverage, values.iter().mean()))
                }
            }
        }
    }

    /// Place the index within the comparator distribution of `metric`.
    pub fn compare(
        index: &RowSet<'_>,
        comparator: &RowSet<'_>,
        metric: Metric,
    ) -> Option<IndexComparison> {
        let (kind, index_value) = Self::index_value(index, metric)?;
        let distribution = comparator.values(metric);
        let summary = Self::describe_values(&distribution)?;
        let percentile_rank = Self::percentile_rank(&distribution, index_value)?;

        Some(IndexComparison {
            metric,
            kind,
            index_value,
            percentile_rank,
            comparator: summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn describe_matches_linear_quantiles() {
        let s = StatsCalculator::describe_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_abs_diff_eq!(s.mean, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.median, 2.5);
        assert_abs_diff_eq!(s.p25, 1.75);
        assert_abs_diff_eq!(s.p75, 3.25);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert_abs_diff_eq!(s.std_dev, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn empty_sample_has_no_summary() {
        assert!(StatsCalculator::describe_values(&[]).is_none());
    }

    #[test]
    fn single_value_summary() {
        let s = StatsCalculator::describe_values(&[7.5]).unwrap();
        assert_eq!(s.median, 7.5);
        assert_eq!(s.p25, 7.5);
        assert_eq!(s.std_dev, 0.0);
    }

    #[test]
    fn percentile_rank_ignores_ties() {
        let d = [1.0, 2.0, 2.0, 3.0];
        assert_eq!(StatsCalculator::percentile_rank(&d, 2.0), Some(0.25));
        assert_eq!(StatsCalculator::percentile_rank(&d, 0.5), Some(0.0));
        assert_eq!(StatsCalculator::percentile_rank(&d, 10.0), Some(1.0));
        assert_eq!(StatsCalculator::percentile_rank(&[], 1.0), None);
    }
}
