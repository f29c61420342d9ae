//! Constraint category model.

use serde::{Deserialize, Serialize};

use super::Id;
use crate::errors::AppError;

/// Rule a category imposes on the topics it constrains.
///
/// The parameters are consumed by the external matching step; this crate
/// only validates and displays them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "criterionType", rename_all = "camelCase")]
pub enum Criterion {
    /// At least `min_ratio` of a topic's students must satisfy the category.
    #[serde(rename_all = "camelCase")]
    Prerequisite { min_ratio: f64 },
    /// Prefer as few matching students per topic as possible.
    Minimize,
    /// Prefer as many matching students per topic as possible.
    Maximize,
    /// Keep matching students together, within the given bounds.
    #[serde(rename_all = "camelCase")]
    Pull { min_students: u32, max_students: u32 },
}

impl Criterion {
    pub fn type_name(&self) -> &'static str {
        match self {
            Criterion::Prerequisite { .. } => "prerequisite",
            Criterion::Minimize => "minimize",
            Criterion::Maximize => "maximize",
            Criterion::Pull { .. } => "pull",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Prerequisite { .. } => "Prerequisite",
            Criterion::Minimize => "Minimize",
            Criterion::Maximize => "Maximize",
            Criterion::Pull { .. } => "Pull together",
        }
    }

    /// Short human readable summary of the parameters.
    pub fn summary(&self) -> String {
        match self {
            Criterion::Prerequisite { min_ratio } => {
                format!("at least {:.0}% of students", min_ratio * 100.0)
            }
            Criterion::Minimize | Criterion::Maximize => String::new(),
            Criterion::Pull {
                min_students,
                max_students,
            } => format!("{} to {} students", min_students, max_students),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            Criterion::Prerequisite { min_ratio } if !(0.0..=1.0).contains(min_ratio) => Err(
                AppError::Validation("Minimum ratio must be between 0 and 1".to_string()),
            ),
            Criterion::Pull {
                min_students,
                max_students,
            } if min_students > max_students => Err(AppError::Validation(
                "Minimum students must not exceed maximum students".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// A named rule used to tag questions and constrain topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub criterion: Criterion,
    pub updated_at: String,
}

/// Fields for creating a category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub criterion: Criterion,
}

impl CategoryFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Category name is required".to_string()));
        }
        self.criterion.validate()
    }
}

/// Partial update of a category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub criterion: Option<Criterion>,
}

impl CategoryPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::Validation("Category name is required".to_string()));
        }
        match &self.criterion {
            Some(criterion) => criterion.validate(),
            None => Ok(()),
        }
    }
}
