//! Cohort module - index and comparator selection

mod display;
mod engine;
mod selection;

pub use display::DisplayOptions;
pub use engine::{Cohort, CohortEngine, CohortRequest};
pub use selection::{hospital_options, idn_options, ComparatorSpec, Selection, SimilarityFilter};
