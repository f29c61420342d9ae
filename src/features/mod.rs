//! Feature view-models.
//!
//! Each view-model combines shared adapters, its dialogs and the store's
//! mutations into row projections plus action methods. Actions are async and
//! must run on the thread that owns the reactive graph.

pub mod categories;
pub mod periods;
pub mod questions;
pub mod students;
pub mod topics;

pub use categories::{CategoriesViewModel, CategoryRow};
pub use periods::{PeriodForm, PeriodRow, PeriodsViewModel};
pub use questions::{QuestionRow, QuestionsViewModel};
pub use students::{StudentRow, StudentSummary, StudentsViewModel};
pub use topics::{TopicForm, TopicRow, TopicsViewModel};

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::adapter::{Adapter, AdapterRegistry, QueryState};
use crate::config::ViewSettings;
use crate::dialog::Dialog;
use crate::errors::{AppError, ErrorCode};
use crate::models::Id;
use crate::reactive::{untrack, Cell, Effect};
use crate::store::{EntityFields, EntityKind, EntityPatch, LinkSet, Query, Store};
use crate::sync::{DiffSynchronizer, FailurePolicy, SyncError};

/// What a view-model needs from the root.
#[derive(Clone)]
pub struct FeatureContext {
    pub registry: Rc<AdapterRegistry>,
    pub settings: ViewSettings,
}

impl FeatureContext {
    pub fn store(&self) -> Rc<dyn Store> {
        Rc::clone(self.registry.store())
    }

    pub fn synchronizer(&self) -> DiffSynchronizer {
        DiffSynchronizer::new(self.settings.sync_policy)
    }

    pub fn format_date(&self, date: &DateTime<Utc>) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.settings.date_format)).is_err() {
            out = date.to_rfc3339();
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    Loading,
    Loaded,
    /// The source failed; rows are empty rather than stale.
    Unavailable(String),
}

/// A displayed collection and whether it can be trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet<R> {
    pub rows: Vec<R>,
    pub status: RowStatus,
}

impl<R> RowSet<R> {
    pub fn loading() -> Self {
        Self {
            rows: Vec::new(),
            status: RowStatus::Loading,
        }
    }

    pub fn loaded(rows: Vec<R>) -> Self {
        Self {
            rows,
            status: RowStatus::Loaded,
        }
    }

    pub fn unavailable(err: &AppError) -> Self {
        Self {
            rows: Vec::new(),
            status: RowStatus::Unavailable(err.message().to_string()),
        }
    }

    /// Project a source state, building rows only from a ready value.
    pub fn project<T>(state: &QueryState<T>, build: impl FnOnce(&T) -> Vec<R>) -> Self {
        match state {
            QueryState::Pending => Self::loading(),
            QueryState::Ready(value) => Self::loaded(build(value)),
            QueryState::Failed(err) => Self::unavailable(err),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == RowStatus::Loaded
    }
}

/// A selectable option in a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionItem {
    pub id: Id,
    pub label: String,
}

/// Step of an action that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStage {
    Validation,
    Create,
    Update,
    Delete,
    Activate,
    Linking,
}

/// A failed view-model action. The dialog that started it stays open.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionError {
    pub stage: ActionStage,
    pub error: AppError,
    /// Present for [`ActionStage::Linking`].
    pub sync: Option<SyncError>,
}

impl ActionError {
    pub fn new(stage: ActionStage, error: AppError) -> Self {
        Self {
            stage,
            error,
            sync: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ActionStage::Validation, AppError::Validation(message.into()))
    }

    fn linking(sync: SyncError) -> Self {
        Self {
            stage: ActionStage::Linking,
            error: sync.first.clone(),
            sync: Some(sync),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code()
    }

    /// Short text for the dialog.
    pub fn user_message(&self) -> String {
        if self.stage == ActionStage::Linking {
            return "Saved, but some links could not be updated. Retry linking.".to_string();
        }
        match self.code() {
            ErrorCode::ReferentialConstraintViolation => {
                "It is still in use by other records and cannot be deleted.".to_string()
            }
            ErrorCode::Validation => self.error.message().to_string(),
            ErrorCode::NotFound => "The record no longer exists.".to_string(),
            _ => match self.stage {
                ActionStage::Validation | ActionStage::Linking => self.error.message().to_string(),
                ActionStage::Create => "Could not create the record.".to_string(),
                ActionStage::Update => "Could not save the changes.".to_string(),
                ActionStage::Delete => "Could not delete the record.".to_string(),
                ActionStage::Activate => "Could not activate the period.".to_string(),
            },
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for ActionError {}

/// Desired state of one link set of a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDiff {
    pub set: LinkSet,
    pub current: BTreeSet<Id>,
    pub desired: BTreeSet<Id>,
}

impl LinkDiff {
    pub fn new(
        set: LinkSet,
        current: impl IntoIterator<Item = Id>,
        desired: impl IntoIterator<Item = Id>,
    ) -> Self {
        Self {
            set,
            current: current.into_iter().collect(),
            desired: desired.into_iter().collect(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.desired
    }
}

/// Links left to apply after the parent was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLinks {
    pub parent: Id,
    pub diffs: Vec<LinkDiff>,
}

/// Ids linked to the edit dialog's target in one link set.
///
/// The adapter is re-targeted whenever the dialog target changes and is
/// skipped while there is none.
pub(crate) struct LinkedChildren {
    set: LinkSet,
    adapter: Cell<Adapter<Vec<Id>>>,
    _follow: Effect,
}

impl LinkedChildren {
    pub(crate) fn new<E: Clone + PartialEq + 'static>(
        ctx: &FeatureContext,
        dialog: &Dialog<E>,
        set: LinkSet,
        parent: fn(&E) -> Id,
    ) -> Self {
        let adapter = Cell::new(Adapter::skipped());
        let follow = {
            let dialog = dialog.clone();
            let registry = Rc::clone(&ctx.registry);
            let adapter = adapter.clone();
            Effect::new(move || {
                let query = dialog.target().map(|target| Query::Links {
                    set,
                    parent: parent(&target),
                });
                adapter.set(untrack(|| registry.adapter(query)));
            })
        };
        Self {
            set,
            adapter,
            _follow: follow,
        }
    }

    pub(crate) fn get(&self) -> QueryState<Vec<Id>> {
        self.adapter.get().get()
    }

    /// The loaded ids, or a validation error while they are not available.
    pub(crate) fn loaded(&self) -> Result<Vec<Id>, ActionError> {
        match self.adapter.get_untracked().get_untracked() {
            QueryState::Ready(ids) => Ok(ids),
            QueryState::Pending => Err(ActionError::invalid(format!(
                "Linked {} have not loaded yet",
                self.set.children()
            ))),
            QueryState::Failed(err) => Err(ActionError::new(ActionStage::Validation, err)),
        }
    }
}

/// Dialogs and mutation flow shared by every feature.
pub(crate) struct EntityActions<E> {
    kind: EntityKind,
    store: Rc<dyn Store>,
    sync: DiffSynchronizer,
    pub(crate) edit: Dialog<E>,
    pub(crate) delete: Dialog<E>,
    pending: Cell<Option<PendingLinks>>,
}

impl<E: Clone + PartialEq + 'static> EntityActions<E> {
    pub(crate) fn new(ctx: &FeatureContext, kind: EntityKind) -> Self {
        Self {
            kind,
            store: ctx.store(),
            sync: ctx.synchronizer(),
            edit: Dialog::new("edit"),
            delete: Dialog::new("delete"),
            pending: Cell::new(None),
        }
    }

    pub(crate) fn store(&self) -> &Rc<dyn Store> {
        &self.store
    }

    pub(crate) fn open_create(&self) {
        self.pending.set(None);
        self.edit.open();
    }

    pub(crate) fn open_edit(&self, entity: E) {
        self.pending.set(None);
        self.edit.open_with(entity);
    }

    pub(crate) fn close_edit(&self) {
        self.pending.set(None);
        self.edit.close();
    }

    pub(crate) fn pending_links(&self) -> Option<PendingLinks> {
        self.pending.get()
    }

    /// Create the parent, then link its children.
    pub(crate) async fn create(
        &self,
        fields: EntityFields,
        links: Vec<(LinkSet, BTreeSet<Id>)>,
    ) -> Result<Id, ActionError> {
        fields
            .validate()
            .map_err(|err| ActionError::new(ActionStage::Validation, err))?;
        let ticket = self.edit.ticket();

        let id = self.store.create(fields).await.map_err(|err| {
            warn!(kind = self.kind.label(), error = %err, "create failed");
            ActionError::new(ActionStage::Create, err)
        })?;
        info!(kind = self.kind.label(), %id, "created");

        let diffs = links
            .into_iter()
            .map(|(set, desired)| LinkDiff {
                set,
                current: BTreeSet::new(),
                desired,
            })
            .collect();
        self.link(&id, diffs).await?;
        self.edit.close_if_current(ticket);
        Ok(id)
    }

    /// Update the parent, then bring its link sets to the desired state.
    pub(crate) async fn update(
        &self,
        id: Id,
        patch: EntityPatch,
        diffs: Vec<LinkDiff>,
    ) -> Result<(), ActionError> {
        patch
            .validate()
            .map_err(|err| ActionError::new(ActionStage::Validation, err))?;
        let ticket = self.edit.ticket();

        self.store.update(id.clone(), patch).await.map_err(|err| {
            warn!(kind = self.kind.label(), %id, error = %err, "update failed");
            ActionError::new(ActionStage::Update, err)
        })?;
        info!(kind = self.kind.label(), %id, "updated");

        self.link(&id, diffs).await?;
        self.edit.close_if_current(ticket);
        Ok(())
    }

    pub(crate) async fn remove(&self, id: Id) -> Result<(), ActionError> {
        let ticket = self.delete.ticket();
        self.store
            .delete(self.kind, id.clone())
            .await
            .map_err(|err| {
                warn!(kind = self.kind.label(), %id, error = %err, "delete failed");
                ActionError::new(ActionStage::Delete, err)
            })?;
        info!(kind = self.kind.label(), %id, "deleted");
        self.delete.close_if_current(ticket);
        Ok(())
    }

    /// Re-run the links left over by a failed create or edit.
    pub(crate) async fn retry_linking(&self) -> Result<(), ActionError> {
        let Some(pending) = self.pending.get_untracked() else {
            return Err(ActionError::invalid("There are no links to retry"));
        };
        let ticket = self.edit.ticket();
        self.link(&pending.parent, pending.diffs).await?;
        self.edit.close_if_current(ticket);
        Ok(())
    }

    /// Apply `diffs` in order. On failure the unapplied remainder is kept as
    /// [`PendingLinks`].
    async fn link(&self, parent: &Id, diffs: Vec<LinkDiff>) -> Result<(), ActionError> {
        let ticket = self.edit.ticket();
        let mut remaining = Vec::new();
        let mut first_error: Option<SyncError> = None;

        for diff in diffs {
            if first_error.is_some() && self.sync.policy() == FailurePolicy::FailFast {
                remaining.push(diff);
                continue;
            }
            let set = diff.set;
            let store = &self.store;
            let result = self
                .sync
                .sync(
                    &diff.current,
                    &diff.desired,
                    |child| store.link(set, parent.clone(), child),
                    |child| store.unlink(set, parent.clone(), child),
                )
                .await;
            if let Err(err) = result {
                warn!(kind = self.kind.label(), %parent, %set, error = %err, "linking incomplete");
                remaining.push(LinkDiff {
                    set,
                    current: err.report().apply_to(&diff.current),
                    desired: diff.desired,
                });
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            None => {
                if self.edit.ticket() == ticket {
                    self.pending.set(None);
                }
                Ok(())
            }
            Some(err) => {
                if self.edit.ticket() == ticket {
                    self.pending.set(Some(PendingLinks {
                        parent: parent.clone(),
                        diffs: remaining,
                    }));
                }
                Err(ActionError::linking(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referential_message_is_structured() {
        let err = ActionError::new(
            ActionStage::Delete,
            AppError::ReferentialConstraint("topic_constraints".into()),
        );
        assert_eq!(err.code(), ErrorCode::ReferentialConstraintViolation);
        assert!(err.user_message().contains("still in use"));

        let err = ActionError::new(ActionStage::Delete, AppError::Database("disk".into()));
        assert_eq!(err.user_message(), "Could not delete the record.");
    }

    #[test]
    fn test_row_set_projection() {
        let rows = RowSet::project(&QueryState::Ready(vec![1, 2]), |v| v.clone());
        assert!(rows.is_loaded());
        assert_eq!(rows.rows, vec![1, 2]);

        let failed = QueryState::<Vec<i32>>::Failed(AppError::Database("x".into()));
        let rows: RowSet<i32> = RowSet::project(&failed, |v| v.clone());
        assert_eq!(rows.status, RowStatus::Unavailable("x".into()));
        assert!(rows.rows.is_empty());

        let rows: RowSet<i32> = RowSet::project(&QueryState::<Vec<i32>>::Pending, |v| v.clone());
        assert_eq!(rows.status, RowStatus::Loading);
    }

    #[test]
    fn test_date_format_falls_back_on_bad_pattern() {
        let store: Rc<dyn Store> = Rc::new(crate::tests::fake_store::FakeStore::new());
        let mut ctx = FeatureContext {
            registry: Rc::new(AdapterRegistry::new(store)),
            settings: ViewSettings::default(),
        };
        let date = "2026-03-01T09:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(ctx.format_date(&date), "01.03.2026 09:30");

        ctx.settings.date_format = "%Q".to_string();
        assert_eq!(ctx.format_date(&date), date.to_rfc3339());
    }
}
