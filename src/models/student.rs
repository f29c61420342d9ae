//! Student and assignment models.

use serde::{Deserialize, Serialize};

use super::Id;
use crate::errors::AppError;

/// A student taking part in selection periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Id,
    pub email: String,
    pub display_name: String,
}

/// Fields for registering a student.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFields {
    pub email: String,
    pub display_name: String,
}

impl StudentFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if super::normalize_email(&self.email).is_none() {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        if self.display_name.trim().is_empty() {
            return Err(AppError::Validation("Display name is required".to_string()));
        }
        Ok(())
    }
}

/// Result of the matching step for one student in one period. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub period_id: Id,
    pub student_id: Id,
    pub topic_id: Id,
    /// 1-based rank the student gave the topic.
    pub preference_rank: u32,
    pub is_matched: bool,
}
