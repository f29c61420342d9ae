//! Survey question model.

use serde::{Deserialize, Serialize};

use super::Id;
use crate::errors::AppError;

/// Answer shape of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuestionKind {
    Boolean,
    Scale { min: i32, max: i32 },
}

impl QuestionKind {
    pub fn label(&self) -> String {
        match self {
            QuestionKind::Boolean => "Yes/No".to_string(),
            QuestionKind::Scale { min, max } => format!("Scale {}-{}", min, max),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            QuestionKind::Boolean => Ok(()),
            QuestionKind::Scale { min, max } if min < max => Ok(()),
            QuestionKind::Scale { .. } => Err(AppError::Validation(
                "Scale minimum must be below its maximum".to_string(),
            )),
        }
    }
}

/// A single survey item, optionally tagged with a category name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Id,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub updated_at: String,
}

/// Fields for creating a question.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFields {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub category: Option<String>,
}

impl QuestionFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.text.trim().is_empty() {
            return Err(AppError::Validation("Question text is required".to_string()));
        }
        self.kind.validate()
    }
}

/// Partial update of a question.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub kind: Option<QuestionKind>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub category: Option<Option<String>>,
}

impl QuestionPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.text, Some(text) if text.trim().is_empty()) {
            return Err(AppError::Validation("Question text is required".to_string()));
        }
        match &self.kind {
            Some(kind) => kind.validate(),
            None => Ok(()),
        }
    }
}
