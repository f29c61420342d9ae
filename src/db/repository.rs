//! Database repository for CRUD and link operations.
//!
//! Every successful write bumps the revision in `meta` and broadcasts it, so
//! open snapshot streams re-query.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tokio::sync::watch;

use crate::errors::AppError;
use crate::models::{
    validate_window, Assignment, Category, CategoryFields, CategoryPatch, Id, Period,
    PeriodFields, PeriodKind, PeriodPatch, Question, QuestionFields, QuestionPatch, Student,
    StudentFields, Topic, TopicFields, TopicPatch,
};
use crate::store::{EntityKind, LinkSet};

/// Revision metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

/// Table and column names of a link set.
fn link_table(set: LinkSet) -> (&'static str, &'static str, &'static str) {
    match set {
        LinkSet::PeriodQuestions => ("period_questions", "period_id", "question_id"),
        LinkSet::TopicConstraints => ("topic_constraints", "topic_id", "category_id"),
        LinkSet::TopicAllowList => ("topic_allow_list", "topic_id", "email"),
    }
}

fn entity_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Period => "periods",
        EntityKind::Topic => "topics",
        EntityKind::Question => "questions",
        EntityKind::Category => "categories",
        EntityKind::Student => "students",
    }
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    revisions: Arc<watch::Sender<i64>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            pool,
            revisions: Arc::new(revisions),
        }
    }

    /// Receiver that changes after every committed write.
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.revisions.subscribe()
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID, broadcast it and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        let revision = self.get_revision_id().await?;
        self.publish(revision);
        Ok(revision)
    }

    fn publish(&self, revision: i64) {
        tracing::debug!(revision, "store revision changed");
        self.revisions.send_replace(revision);
    }

    // ==================== PERIOD OPERATIONS ====================

    pub async fn list_periods(&self) -> Result<Vec<Period>, AppError> {
        let rows = sqlx::query(
            "SELECT id, title, description, open_date, close_date, kind, updated_at FROM periods ORDER BY open_date DESC, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(period_from_row).collect()
    }

    pub async fn get_period(&self, id: &str) -> Result<Option<Period>, AppError> {
        let row = sqlx::query(
            "SELECT id, title, description, open_date, close_date, kind, updated_at FROM periods WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(period_from_row).transpose()
    }

    /// Create a period. New periods start inactive.
    pub async fn create_period(&self, fields: &PeriodFields) -> Result<Period, AppError> {
        fields.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO periods (id, title, description, open_date, close_date, kind, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(fields.title.trim())
        .bind(&fields.description)
        .bind(fields.open_date.to_rfc3339())
        .bind(fields.close_date.to_rfc3339())
        .bind(PeriodKind::Inactive.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Period {
            id,
            title: fields.title.trim().to_string(),
            description: fields.description.clone(),
            open_date: fields.open_date,
            close_date: fields.close_date,
            kind: PeriodKind::Inactive,
            updated_at: now,
        })
    }

    pub async fn update_period(&self, id: &str, patch: &PeriodPatch) -> Result<Period, AppError> {
        patch.validate()?;
        let existing = self
            .get_period(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Period {} not found", id)))?;

        let open_date = patch.open_date.unwrap_or(existing.open_date);
        let close_date = patch.close_date.unwrap_or(existing.close_date);
        validate_window(open_date, close_date)?;
        let title = patch
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.title)
            .to_string();
        let description = patch.description.clone().unwrap_or(existing.description);
        let kind = patch.kind.unwrap_or(existing.kind);
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE periods SET title = ?, description = ?, open_date = ?, close_date = ?, kind = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&description)
        .bind(open_date.to_rfc3339())
        .bind(close_date.to_rfc3339())
        .bind(kind.as_str())
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Period {
            id: id.to_string(),
            title,
            description,
            open_date,
            close_date,
            kind,
            updated_at: now,
        })
    }

    /// Make `id` the only open period. The previously open period becomes
    /// inactive.
    pub async fn set_active_period(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM periods WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Period {} not found", id)));
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE periods SET kind = 'inactive', updated_at = ? WHERE kind = 'open' AND id != ?")
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE periods SET kind = 'open', updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let revision = self.get_revision_id().await?;
        self.publish(revision);
        tracing::info!(period = id, "period activated");
        Ok(())
    }

    // ==================== TOPIC OPERATIONS ====================

    pub async fn list_topics(&self) -> Result<Vec<Topic>, AppError> {
        let rows = sqlx::query(
            "SELECT id, title, description, is_active, updated_at FROM topics ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(topic_from_row).collect())
    }

    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        let row = sqlx::query(
            "SELECT id, title, description, is_active, updated_at FROM topics WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(topic_from_row))
    }

    pub async fn create_topic(&self, fields: &TopicFields) -> Result<Topic, AppError> {
        fields.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO topics (id, title, description, is_active, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(fields.title.trim())
        .bind(&fields.description)
        .bind(fields.is_active as i32)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Topic {
            id,
            title: fields.title.trim().to_string(),
            description: fields.description.clone(),
            is_active: fields.is_active,
            updated_at: now,
        })
    }

    pub async fn update_topic(&self, id: &str, patch: &TopicPatch) -> Result<Topic, AppError> {
        patch.validate()?;
        let existing = self
            .get_topic(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", id)))?;

        let title = patch
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.title)
            .to_string();
        let description = patch.description.clone().unwrap_or(existing.description);
        let is_active = patch.is_active.unwrap_or(existing.is_active);
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE topics SET title = ?, description = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&description)
        .bind(is_active as i32)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Topic {
            id: id.to_string(),
            title,
            description,
            is_active,
            updated_at: now,
        })
    }

    // ==================== QUESTION OPERATIONS ====================

    pub async fn list_questions(&self) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query(
            "SELECT id, text, kind, category, updated_at FROM questions ORDER BY text",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(question_from_row).collect()
    }

    pub async fn get_question(&self, id: &str) -> Result<Option<Question>, AppError> {
        let row = sqlx::query("SELECT id, text, kind, category, updated_at FROM questions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(question_from_row).transpose()
    }

    pub async fn create_question(&self, fields: &QuestionFields) -> Result<Question, AppError> {
        fields.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let kind_json = serde_json::to_string(&fields.kind)?;

        sqlx::query(
            "INSERT INTO questions (id, text, kind, category, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(fields.text.trim())
        .bind(&kind_json)
        .bind(&fields.category)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Question {
            id,
            text: fields.text.trim().to_string(),
            kind: fields.kind,
            category: fields.category.clone(),
            updated_at: now,
        })
    }

    pub async fn update_question(
        &self,
        id: &str,
        patch: &QuestionPatch,
    ) -> Result<Question, AppError> {
        patch.validate()?;
        let existing = self
            .get_question(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;

        let text = patch
            .text
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.text)
            .to_string();
        let kind = patch.kind.unwrap_or(existing.kind);
        let category = patch.category.clone().unwrap_or(existing.category);
        let now = Utc::now().to_rfc3339();

        sqlx::query("UPDATE questions SET text = ?, kind = ?, category = ?, updated_at = ? WHERE id = ?")
            .bind(&text)
            .bind(serde_json::to_string(&kind)?)
            .bind(&category)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Question {
            id: id.to_string(),
            text,
            kind,
            category,
            updated_at: now,
        })
    }

    // ==================== CATEGORY OPERATIONS ====================

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, criterion, updated_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(category_from_row).collect()
    }

    pub async fn get_category(&self, id: &str) -> Result<Option<Category>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, description, criterion, updated_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    pub async fn create_category(&self, fields: &CategoryFields) -> Result<Category, AppError> {
        fields.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO categories (id, name, description, criterion, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(fields.name.trim())
        .bind(&fields.description)
        .bind(serde_json::to_string(&fields.criterion)?)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Category {
            id,
            name: fields.name.trim().to_string(),
            description: fields.description.clone(),
            criterion: fields.criterion,
            updated_at: now,
        })
    }

    pub async fn update_category(
        &self,
        id: &str,
        patch: &CategoryPatch,
    ) -> Result<Category, AppError> {
        patch.validate()?;
        let existing = self
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

        let name = patch
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.name)
            .to_string();
        let description = patch.description.clone().unwrap_or(existing.description);
        let criterion = patch.criterion.unwrap_or(existing.criterion);
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE categories SET name = ?, description = ?, criterion = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&description)
        .bind(serde_json::to_string(&criterion)?)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(Category {
            id: id.to_string(),
            name,
            description,
            criterion,
            updated_at: now,
        })
    }

    // ==================== STUDENT OPERATIONS ====================

    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        let rows = sqlx::query("SELECT id, email, display_name FROM students ORDER BY display_name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(student_from_row).collect())
    }

    pub async fn create_student(&self, fields: &StudentFields) -> Result<Student, AppError> {
        fields.validate()?;
        let id = uuid::Uuid::new_v4().to_string();
        let email = fields.email.trim().to_lowercase();

        sqlx::query("INSERT INTO students (id, email, display_name) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&email)
            .bind(fields.display_name.trim())
            .execute(&self.pool)
            .await?;

        self.increment_revision().await?;

        Ok(Student {
            id,
            email,
            display_name: fields.display_name.trim().to_string(),
        })
    }

    // ==================== SHARED OPERATIONS ====================

    /// Delete an entity. Fails with a referential-constraint error while
    /// links or assignments still point at it.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), AppError> {
        let query = format!("DELETE FROM {} WHERE id = ?", entity_table(kind));
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", kind.label(), id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    // ==================== LINK OPERATIONS ====================

    /// Child ids linked to `parent`, in insertion-independent order.
    pub async fn list_links(&self, set: LinkSet, parent: &str) -> Result<Vec<Id>, AppError> {
        let (table, parent_col, child_col) = link_table(set);
        let query = format!(
            "SELECT {child} AS child FROM {table} WHERE {parent} = ? ORDER BY {child}",
            child = child_col,
            table = table,
            parent = parent_col,
        );
        let rows = sqlx::query(&query).bind(parent).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(|row| row.get("child")).collect())
    }

    /// Link `child` to `parent`. Linking twice is a no-op.
    pub async fn link(&self, set: LinkSet, parent: &str, child: &str) -> Result<(), AppError> {
        let (table, parent_col, child_col) = link_table(set);
        let query = format!(
            "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
            table, parent_col, child_col
        );
        let result = sqlx::query(&query)
            .bind(parent)
            .bind(child)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.increment_revision().await?;
        }
        Ok(())
    }

    /// Unlink `child` from `parent`. Unlinking an absent child is a no-op.
    pub async fn unlink(&self, set: LinkSet, parent: &str, child: &str) -> Result<(), AppError> {
        let (table, parent_col, child_col) = link_table(set);
        let query = format!(
            "DELETE FROM {} WHERE {} = ? AND {} = ?",
            table, parent_col, child_col
        );
        let result = sqlx::query(&query)
            .bind(parent)
            .bind(child)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.increment_revision().await?;
        }
        Ok(())
    }

    // ==================== ASSIGNMENT OPERATIONS ====================

    pub async fn list_assignments(&self, period_id: &str) -> Result<Vec<Assignment>, AppError> {
        let rows = sqlx::query(
            "SELECT period_id, student_id, topic_id, preference_rank, is_matched FROM assignments WHERE period_id = ? ORDER BY student_id",
        )
        .bind(period_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(assignment_from_row).collect())
    }

    /// Record matching results for a period, replacing earlier ones for the
    /// same students. The matching step itself lives outside this crate.
    pub async fn save_assignments(&self, assignments: &[Assignment]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for assignment in assignments {
            sqlx::query(
                "INSERT OR REPLACE INTO assignments (period_id, student_id, topic_id, preference_rank, is_matched) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&assignment.period_id)
            .bind(&assignment.student_id)
            .bind(&assignment.topic_id)
            .bind(assignment.preference_rank as i64)
            .bind(assignment.is_matched as i32)
            .execute(&mut *tx)
            .await?;
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let revision = self.get_revision_id().await?;
        self.publish(revision);
        Ok(())
    }
}

// Helper functions for row conversion

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid timestamp {}: {}", raw, e)))
}

fn period_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Period, AppError> {
    let kind: String = row.get("kind");
    let open_date: String = row.get("open_date");
    let close_date: String = row.get("close_date");
    Ok(Period {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        open_date: parse_timestamp(&open_date)?,
        close_date: parse_timestamp(&close_date)?,
        kind: PeriodKind::parse(&kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown period kind: {}", kind)))?,
        updated_at: row.get("updated_at"),
    })
}

fn topic_from_row(row: &sqlx::sqlite::SqliteRow) -> Topic {
    let is_active: i32 = row.get("is_active");
    Topic {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        is_active: is_active != 0,
        updated_at: row.get("updated_at"),
    }
}

fn question_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, AppError> {
    let kind: String = row.get("kind");
    Ok(Question {
        id: row.get("id"),
        text: row.get("text"),
        kind: serde_json::from_str(&kind)?,
        category: row.get("category"),
        updated_at: row.get("updated_at"),
    })
}

fn category_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Category, AppError> {
    let criterion: String = row.get("criterion");
    Ok(Category {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        criterion: serde_json::from_str(&criterion)?,
        updated_at: row.get("updated_at"),
    })
}

fn student_from_row(row: &sqlx::sqlite::SqliteRow) -> Student {
    Student {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
    }
}

fn assignment_from_row(row: &sqlx::sqlite::SqliteRow) -> Assignment {
    let rank: i64 = row.get("preference_rank");
    let is_matched: i32 = row.get("is_matched");
    Assignment {
        period_id: row.get("period_id"),
        student_id: row.get("student_id"),
        topic_id: row.get("topic_id"),
        preference_rank: rank.max(0) as u32,
        is_matched: is_matched != 0,
    }
}
