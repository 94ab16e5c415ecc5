//! Studies: all survey records for one participant
//!
//! A [`StudyMap`] buckets one full REDCap export by study ID. Studies are
//! rebuilt from the export on every refresh and are never persisted.

use std::collections::hash_map::{self, HashMap};

use thiserror::Error;
use tracing::debug;

use super::assessment::{sort_results_by_as_of, AssessmentResult};
use super::record::Record;

/// Errors grouping records into studies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudyError {
    #[error("Record with study ID {record_id} cannot be added to study with ID {study_id}")]
    StudyMismatch { record_id: String, study_id: String },
}

/// A single study (participant) and the records making up the study
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Study {
    /// Normalized study ID; empty until the first record is added
    pub id: String,
    pub records: Vec<Record>,
}

impl Study {
    /// Create an empty study with no ID
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a study whose ID is taken from its first record
    pub fn from_record(record: Record) -> Self {
        Self {
            id: record.study_id.clone(),
            records: vec![record],
        }
    }

    /// Append a record, adopting its study ID if the study has none yet
    ///
    /// Fails without modifying the study if the IDs differ.
    pub fn add_record(&mut self, record: Record) -> Result<(), StudyError> {
        if self.id.is_empty() {
            self.id = record.study_id.clone();
        } else if self.id != record.study_id {
            return Err(StudyError::StudyMismatch {
                record_id: record.study_id,
                study_id: self.id.clone(),
            });
        }

        self.records.push(record);
        Ok(())
    }

    /// Convert the complete records to assessment results sorted by `as_of`
    ///
    /// Incomplete or malformed records are skipped; partial surveys are
    /// expected, so the result may be shorter than the record list.
    pub fn to_assessment_results(&self, patient_url: &str) -> Vec<AssessmentResult> {
        let mut results: Vec<AssessmentResult> = self
            .records
            .iter()
            .filter_map(|record| match record.to_assessment_result(patient_url) {
                Ok(result) => Some(result),
                Err(e) => {
                    debug!(
                        study_id = %self.id,
                        event = %record.event_name,
                        reason = %e,
                        "Skipping record"
                    );
                    None
                }
            })
            .collect();

        sort_results_by_as_of(&mut results);
        results
    }
}

/// Studies indexed by normalized study ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyMap {
    studies: HashMap<String, Study>,
}

impl StudyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to its study, creating the study if needed
    pub fn add_record(&mut self, record: Record) -> Result<(), StudyError> {
        self.studies
            .entry(record.study_id.clone())
            .or_default()
            .add_record(record)
    }

    /// Add records in order, stopping at the first failure
    ///
    /// Studies changed by earlier records keep those changes.
    pub fn add_records<I>(&mut self, records: I) -> Result<(), StudyError>
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.add_record(record)?;
        }
        Ok(())
    }

    /// Build a map from a full record set
    pub fn from_records<I>(records: I) -> Result<Self, StudyError>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut map = Self::new();
        map.add_records(records)?;
        Ok(map)
    }

    pub fn get(&self, study_id: &str) -> Option<&Study> {
        self.studies.get(study_id)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, study_id: &str) -> Option<&mut Study> {
        self.studies.get_mut(study_id)
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }

    /// Iterate over the studies in unspecified order
    pub fn studies(&self) -> hash_map::Values<'_, String, Study> {
        self.studies.values()
    }
}

impl IntoIterator for StudyMap {
    type Item = Study;
    type IntoIter = hash_map::IntoValues<String, Study>;

    fn into_iter(self) -> Self::IntoIter {
        self.studies.into_values()
    }
}
