//! Assessment results produced from complete survey records

use chrono::{DateTime, Local};

use super::pie::Pie;

/// A date-stamped severity score and the pie it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentResult {
    /// Risk factor date at local midnight
    pub as_of: DateTime<Local>,
    /// Highest slice value in the pie (1-4)
    pub score: i32,
    pub pie: Pie,
}

/// Sort results ascending by `as_of`, keeping input order for equal dates
pub fn sort_results_by_as_of(results: &mut [AssessmentResult]) {
    results.sort_by_key(|r| r.as_of);
}
