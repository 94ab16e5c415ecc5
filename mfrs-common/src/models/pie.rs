//! Risk pie model
//!
//! A pie is the scored breakdown backing one risk assessment: four fixed
//! categories, each weighted equally and scored from 1 to 4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time;

pub const CLINICAL_RISK: &str = "Clinical Risk";
pub const FUNCTIONAL_RISK: &str = "Functional and Environmental Risk";
pub const PSYCHOSOCIAL_RISK: &str = "Psychosocial and Mental Health Risk";
pub const UTILIZATION_RISK: &str = "Utilization Risk";

/// Slice names in the order they appear in every pie
pub const SLICE_NAMES: [&str; 4] = [
    CLINICAL_RISK,
    FUNCTIONAL_RISK,
    PSYCHOSOCIAL_RISK,
    UTILIZATION_RISK,
];

/// Weight of every slice (four slices sum to 100)
pub const SLICE_WEIGHT: i32 = 25;

/// Highest score a slice can carry
pub const SLICE_MAX_VALUE: i32 = 4;

/// One scored category of a pie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slice {
    pub name: String,
    pub weight: i32,
    pub value: i32,
    pub max_value: i32,
}

impl Slice {
    /// Create a slice with the standard weight and maximum value
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            weight: SLICE_WEIGHT,
            value,
            max_value: SLICE_MAX_VALUE,
        }
    }
}

/// Scored risk breakdown for one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pie {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    /// Absolute URL of the patient resource on the FHIR server
    pub patient: String,
    pub slices: Vec<Slice>,
}

impl Pie {
    /// Create a pie with a fresh identifier and creation timestamp
    pub fn new(patient: impl Into<String>, slices: Vec<Slice>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created: time::now(),
            patient: patient.into(),
            slices,
        }
    }

    /// Parse a pie ID as it appears in a pie URL
    pub fn parse_id(id: &str) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(id)
    }

    /// Highest slice value, taking the first maximal slice in category order
    pub fn max_slice_value(&self) -> Option<i32> {
        self.slices.iter().fold(None, |max, slice| match max {
            Some(current) if current >= slice.value => Some(current),
            _ => Some(slice.value),
        })
    }
}
