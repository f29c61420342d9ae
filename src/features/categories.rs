//! Constraint categories.

use std::collections::HashMap;

use super::{ActionError, EntityActions, FeatureContext, RowSet};
use crate::adapter::Adapter;
use crate::dialog::DialogState;
use crate::models::{Category, CategoryFields, CategoryPatch, Id, Question};
use crate::reactive::Derived;
use crate::store::{EntityFields, EntityKind, EntityPatch};

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub id: Id,
    pub name: String,
    pub criterion_label: &'static str,
    pub summary: String,
    /// Questions tagged with this category; `None` while questions load.
    pub question_count: Option<usize>,
}

pub struct CategoriesViewModel {
    rows: Derived<RowSet<CategoryRow>>,
    actions: EntityActions<Category>,
}

impl CategoriesViewModel {
    pub fn new(
        ctx: &FeatureContext,
        categories: Adapter<Vec<Category>>,
        questions: Adapter<Vec<Question>>,
    ) -> Self {
        let rows = Derived::new(move || {
            let counts: Option<HashMap<String, usize>> = questions.with(|state| {
                state.as_ready().map(|items| {
                    let mut counts = HashMap::new();
                    for name in items.iter().filter_map(|q| q.category.as_ref()) {
                        *counts.entry(name.clone()).or_insert(0) += 1;
                    }
                    counts
                })
            });
            categories.with(|state| {
                RowSet::project(state, |items| {
                    items
                        .iter()
                        .map(|category| CategoryRow {
                            id: category.id.clone(),
                            name: category.name.clone(),
                            criterion_label: category.criterion.label(),
                            summary: category.criterion.summary(),
                            question_count: counts
                                .as_ref()
                                .map(|counts| counts.get(&category.name).copied().unwrap_or(0)),
                        })
                        .collect()
                })
            })
        });

        Self {
            rows,
            actions: EntityActions::new(ctx, EntityKind::Category),
        }
    }

    pub fn rows(&self) -> &Derived<RowSet<CategoryRow>> {
        &self.rows
    }

    pub fn edit_dialog(&self) -> DialogState<Category> {
        self.actions.edit.state()
    }

    pub fn delete_dialog(&self) -> DialogState<Category> {
        self.actions.delete.state()
    }

    pub fn open_create(&self) {
        self.actions.open_create();
    }

    pub fn open_edit(&self, category: Category) {
        self.actions.open_edit(category);
    }

    pub fn close_edit(&self) {
        self.actions.close_edit();
    }

    pub fn confirm_delete(&self, category: Category) {
        self.actions.delete.open_with(category);
    }

    pub fn close_delete(&self) {
        self.actions.delete.close();
    }

    pub async fn on_create_submit(&self, fields: CategoryFields) -> Result<Id, ActionError> {
        self.actions
            .create(EntityFields::Category(fields), Vec::new())
            .await
    }

    pub async fn on_edit_submit(&self, fields: CategoryFields) -> Result<(), ActionError> {
        let Some(target) = self.actions.edit.target_untracked() else {
            return Err(ActionError::invalid("No category is being edited"));
        };
        let patch = CategoryPatch {
            name: Some(fields.name),
            description: Some(fields.description),
            criterion: Some(fields.criterion),
        };
        self.actions
            .update(target.id, EntityPatch::Category(patch), Vec::new())
            .await
    }

    /// Fails with a referential-constraint error while a topic still uses
    /// the category.
    pub async fn on_delete(&self, id: Id) -> Result<(), ActionError> {
        self.actions.remove(id).await
    }
}
