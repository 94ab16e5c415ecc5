//! # Multi-Factor Risk Service Common Library
//!
//! Shared code for the risk service crates including:
//! - Survey record and study models
//! - Conversion of survey records into risk pies and assessment results
//! - Configuration loading
//! - Time helpers

pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{
    AssessmentResult, ConversionError, Pie, Record, Slice, Study, StudyError, StudyMap,
};
