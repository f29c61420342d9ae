//! Topic model.

use serde::{Deserialize, Serialize};

use super::Id;
use crate::errors::AppError;

/// A selectable item students rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: Id,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub updated_at: String,
}

/// Fields for creating a topic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicFields {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TopicFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        Ok(())
    }
}

/// Partial update of a topic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl TopicPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        Ok(())
    }
}

/// Normalise an allow-list entry. Returns `None` for something that is not
/// an address.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') {
        return None;
    }
    Some(email)
}
