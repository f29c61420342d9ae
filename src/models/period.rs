//! Selection period model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;
use crate::errors::AppError;

/// Lifecycle state of a period. At most one period is `Open` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Open,
    Inactive,
    Closed,
    Assigned,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Open => "open",
            PeriodKind::Inactive => "inactive",
            PeriodKind::Closed => "closed",
            PeriodKind::Assigned => "assigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(PeriodKind::Open),
            "inactive" => Some(PeriodKind::Inactive),
            "closed" => Some(PeriodKind::Closed),
            "assigned" => Some(PeriodKind::Assigned),
            _ => None,
        }
    }

    /// Whether the "set active" action is permitted.
    pub fn can_set_active(&self) -> bool {
        match self {
            PeriodKind::Open => false,
            PeriodKind::Inactive | PeriodKind::Closed | PeriodKind::Assigned => true,
        }
    }
}

/// A time-boxed window in which students choose topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: Id,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub open_date: DateTime<Utc>,
    pub close_date: DateTime<Utc>,
    pub kind: PeriodKind,
    pub updated_at: String,
}

/// Fields for creating a period. New periods start `Inactive`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodFields {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub open_date: DateTime<Utc>,
    pub close_date: DateTime<Utc>,
}

impl PeriodFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        validate_window(self.open_date, self.close_date)
    }
}

/// Partial update of a period.
///
/// `kind` may move a period between `inactive`, `closed` and `assigned`;
/// opening goes through the dedicated activation call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub open_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub close_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kind: Option<PeriodKind>,
}

impl PeriodPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if self.kind == Some(PeriodKind::Open) {
            return Err(AppError::Validation(
                "Periods are opened through activation".to_string(),
            ));
        }
        if let (Some(open), Some(close)) = (self.open_date, self.close_date) {
            validate_window(open, close)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_window(open: DateTime<Utc>, close: DateTime<Utc>) -> Result<(), AppError> {
    if open >= close {
        return Err(AppError::Validation(
            "Open date must be before close date".to_string(),
        ));
    }
    Ok(())
}
