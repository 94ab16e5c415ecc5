//! REDCap survey records
//!
//! One record is one risk-factor survey for one study participant at one
//! point in time. Records arrive as flat JSON objects from the REDCap
//! export API.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::assessment::AssessmentResult;
use super::pie::{
    Pie, Slice, CLINICAL_RISK, FUNCTIONAL_RISK, PSYCHOSOCIAL_RISK, UTILIZATION_RISK,
};
use crate::time;

/// Errors converting a record into a pie or assessment result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Cannot create a pie with incomplete risk factors")]
    IncompleteRecord,

    #[error("Invalid {field}: {value}")]
    InvalidScore { field: String, value: String },

    #[error("Invalid risk factor date: {value}")]
    DateParse { value: String },
}

/// Key fields of a REDCap record in the risk stratification project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Normalized study ID (REDCap may send a string or a number)
    #[serde(rename = "study_id", default, deserialize_with = "deserialize_study_id")]
    pub study_id: String,

    #[serde(rename = "redcap_event_name", default, deserialize_with = "null_as_empty")]
    pub event_name: String,

    #[serde(rename = "rf_date", default, deserialize_with = "null_as_empty")]
    pub risk_factor_date: String,

    #[serde(rename = "rf_cmc_risk_cat", default, deserialize_with = "null_as_empty")]
    pub clinical_risk: String,

    #[serde(rename = "rf_func_risk_cat", default, deserialize_with = "null_as_empty")]
    pub functional_risk: String,

    #[serde(rename = "rf_sb_risk_cat", default, deserialize_with = "null_as_empty")]
    pub psychosocial_risk: String,

    #[serde(rename = "rf_util_risk_cat", default, deserialize_with = "null_as_empty")]
    pub utilization_risk: String,

    /// Collected for completeness checks only; never becomes a slice
    #[serde(rename = "rf_risk_predicted", default, deserialize_with = "null_as_empty")]
    pub perceived_risk: String,
}

/// Render a study ID of any JSON type to its canonical string form
///
/// Integral numbers render without a fractional part, so `1` and `1.0`
/// both become `"1"`. Null renders as the empty string.
pub fn normalize_study_id(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{:.0}", f),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        other => other.to_string(),
    }
}

fn deserialize_study_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_study_id(&value))
}

/// REDCap sends `null` for some unanswered fields; treat it like a blank
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Record {
    /// Parsed risk factor date at local midnight
    pub fn risk_factor_date_time(&self) -> Result<DateTime<Local>, ConversionError> {
        time::parse_local_date(&self.risk_factor_date).ok_or_else(|| ConversionError::DateParse {
            value: self.risk_factor_date.clone(),
        })
    }

    /// True when the date and all five risk scores are filled in
    pub fn is_complete(&self) -> bool {
        !self.risk_factor_date.is_empty()
            && !self.clinical_risk.is_empty()
            && !self.functional_risk.is_empty()
            && !self.psychosocial_risk.is_empty()
            && !self.utilization_risk.is_empty()
            && !self.perceived_risk.is_empty()
    }

    /// Convert the record to a risk pie for the given patient URL
    ///
    /// Fails if the record is incomplete or any of the four category scores
    /// is not an integer.
    pub fn to_pie(&self, patient_url: &str) -> Result<Pie, ConversionError> {
        if !self.is_complete() {
            return Err(ConversionError::IncompleteRecord);
        }

        let slices = vec![
            parse_slice(CLINICAL_RISK, &self.clinical_risk)?,
            parse_slice(FUNCTIONAL_RISK, &self.functional_risk)?,
            parse_slice(PSYCHOSOCIAL_RISK, &self.psychosocial_risk)?,
            parse_slice(UTILIZATION_RISK, &self.utilization_risk)?,
        ];

        Ok(Pie::new(patient_url, slices))
    }

    /// Convert the record to an assessment result for the given patient URL
    ///
    /// The score is the highest slice value in the pie.
    pub fn to_assessment_result(
        &self,
        patient_url: &str,
    ) -> Result<AssessmentResult, ConversionError> {
        let pie = self.to_pie(patient_url)?;
        let as_of = self.risk_factor_date_time()?;
        let score = pie
            .max_slice_value()
            .ok_or(ConversionError::IncompleteRecord)?;

        Ok(AssessmentResult { as_of, score, pie })
    }
}

fn parse_slice(name: &str, raw: &str) -> Result<Slice, ConversionError> {
    raw.parse::<i32>()
        .map(|value| Slice::new(name, value))
        .map_err(|_| ConversionError::InvalidScore {
            field: name.to_string(),
            value: raw.to_string(),
        })
}
