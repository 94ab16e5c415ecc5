//! Survey data models and their conversion into risk assessments

pub mod assessment;
pub mod pie;
pub mod record;
pub mod study;

pub use assessment::{sort_results_by_as_of, AssessmentResult};
pub use pie::{Pie, Slice};
pub use record::{normalize_study_id, ConversionError, Record};
pub use study::{Study, StudyError, StudyMap};
