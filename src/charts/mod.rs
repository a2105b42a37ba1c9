//! Charts module - chart-ready series

mod series;

pub use series::{
    BoxSummary, ChartSeries, Histogram, HistogramBin, Quadrant, QuadrantPoint, QuadrantProjection,
};
