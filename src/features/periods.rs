//! Selection periods: table rows, the create/edit dialog with its question
//! link set, activation and deletion.

use tracing::{info, warn};

use super::{
    ActionError, ActionStage, EntityActions, FeatureContext, LinkDiff, LinkedChildren, OptionItem,
    PendingLinks, RowSet,
};
use crate::adapter::{Adapter, QueryState};
use crate::dialog::DialogState;
use crate::models::{Id, Period, PeriodFields, PeriodKind, PeriodPatch, Question};
use crate::reactive::Derived;
use crate::store::{EntityFields, EntityKind, EntityPatch, LinkSet};

/// Label and CSS class shown for a period kind.
pub fn status_badge(kind: PeriodKind) -> (&'static str, &'static str) {
    match kind {
        PeriodKind::Open => ("Open", "status-open"),
        PeriodKind::Inactive => ("Inactive", "status-inactive"),
        PeriodKind::Closed => ("Closed", "status-closed"),
        PeriodKind::Assigned => ("Assigned", "status-assigned"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRow {
    pub id: Id,
    pub title: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub open_date: String,
    pub close_date: String,
    pub can_set_active: bool,
    pub is_current: bool,
}

impl PeriodRow {
    fn build(ctx: &FeatureContext, period: &Period, current: Option<&str>) -> Self {
        let (status_label, status_class) = status_badge(period.kind);
        Self {
            id: period.id.clone(),
            title: period.title.clone(),
            status_label,
            status_class,
            open_date: ctx.format_date(&period.open_date),
            close_date: ctx.format_date(&period.close_date),
            can_set_active: period.kind.can_set_active(),
            is_current: current == Some(period.id.as_str()),
        }
    }
}

/// Values submitted by the period dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodForm {
    pub fields: PeriodFields,
    pub question_ids: Vec<Id>,
}

fn period_id(period: &Period) -> Id {
    period.id.clone()
}

pub struct PeriodsViewModel {
    periods: Adapter<Vec<Period>>,
    current: Derived<Option<Period>>,
    rows: Derived<RowSet<PeriodRow>>,
    question_options: Derived<RowSet<OptionItem>>,
    linked_questions: LinkedChildren,
    actions: EntityActions<Period>,
}

impl PeriodsViewModel {
    pub fn new(
        ctx: &FeatureContext,
        periods: Adapter<Vec<Period>>,
        questions: Adapter<Vec<Question>>,
        current: Derived<Option<Period>>,
    ) -> Self {
        let rows = {
            let (ctx, periods, current) = (ctx.clone(), periods.clone(), current.clone());
            Derived::new(move || {
                let current_id = current.get().map(|period| period.id);
                periods.with(|state| {
                    RowSet::project(state, |items| {
                        items
                            .iter()
                            .map(|period| PeriodRow::build(&ctx, period, current_id.as_deref()))
                            .collect()
                    })
                })
            })
        };

        let question_options = Derived::new(move || {
            questions.with(|state| {
                RowSet::project(state, |items| {
                    items
                        .iter()
                        .map(|question| OptionItem {
                            id: question.id.clone(),
                            label: question.text.clone(),
                        })
                        .collect()
                })
            })
        });

        let actions = EntityActions::new(ctx, EntityKind::Period);
        let linked_questions =
            LinkedChildren::new(ctx, &actions.edit, LinkSet::PeriodQuestions, period_id);

        Self {
            periods,
            current,
            rows,
            question_options,
            linked_questions,
            actions,
        }
    }

    pub fn rows(&self) -> &Derived<RowSet<PeriodRow>> {
        &self.rows
    }

    pub fn question_options(&self) -> &Derived<RowSet<OptionItem>> {
        &self.question_options
    }

    pub fn current_period(&self) -> Option<Period> {
        self.current.get()
    }

    /// Questions linked to the period being edited; `Pending` in create mode.
    pub fn linked_question_ids(&self) -> QueryState<Vec<Id>> {
        self.linked_questions.get()
    }

    pub fn edit_dialog(&self) -> DialogState<Period> {
        self.actions.edit.state()
    }

    pub fn delete_dialog(&self) -> DialogState<Period> {
        self.actions.delete.state()
    }

    pub fn pending_links(&self) -> Option<PendingLinks> {
        self.actions.pending_links()
    }

    pub fn open_create(&self) {
        self.actions.open_create();
    }

    pub fn open_edit(&self, period: Period) {
        self.actions.open_edit(period);
    }

    pub fn close_edit(&self) {
        self.actions.close_edit();
    }

    pub fn confirm_delete(&self, period: Period) {
        self.actions.delete.open_with(period);
    }

    pub fn close_delete(&self) {
        self.actions.delete.close();
    }

    pub async fn on_create_submit(&self, form: PeriodForm) -> Result<Id, ActionError> {
        self.actions
            .create(
                EntityFields::Period(form.fields),
                vec![(LinkSet::PeriodQuestions, form.question_ids.into_iter().collect())],
            )
            .await
    }

    pub async fn on_edit_submit(&self, form: PeriodForm) -> Result<(), ActionError> {
        let Some(target) = self.actions.edit.target_untracked() else {
            return Err(ActionError::invalid("No period is being edited"));
        };
        let existing = self.linked_questions.loaded()?;
        form.fields
            .validate()
            .map_err(|err| ActionError::new(ActionStage::Validation, err))?;

        let patch = PeriodPatch {
            title: Some(form.fields.title),
            description: Some(form.fields.description),
            open_date: Some(form.fields.open_date),
            close_date: Some(form.fields.close_date),
            kind: None,
        };
        let diff = LinkDiff::new(LinkSet::PeriodQuestions, existing, form.question_ids);
        self.actions
            .update(target.id, EntityPatch::Period(patch), vec![diff])
            .await
    }

    pub async fn on_delete(&self, id: Id) -> Result<(), ActionError> {
        self.actions.remove(id).await
    }

    /// Make `id` the single open period. Dialogs are left alone.
    pub async fn on_set_active(&self, id: Id) -> Result<(), ActionError> {
        let kind = self.periods.get_untracked().as_ready().and_then(|items| {
            items
                .iter()
                .find(|period| period.id == id)
                .map(|period| period.kind)
        });
        if matches!(kind, Some(kind) if !kind.can_set_active()) {
            return Err(ActionError::invalid("This period is already open"));
        }

        self.actions
            .store()
            .set_active_period(id.clone())
            .await
            .map_err(|err| {
                warn!(%id, error = %err, "activation failed");
                ActionError::new(ActionStage::Activate, err)
            })?;
        info!(%id, "period activated");
        Ok(())
    }

    pub async fn retry_linking(&self) -> Result<(), ActionError> {
        self.actions.retry_linking().await
    }
}
