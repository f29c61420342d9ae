//! Survey questions.

use super::{ActionError, EntityActions, FeatureContext, OptionItem, RowSet};
use crate::adapter::Adapter;
use crate::dialog::DialogState;
use crate::models::{Category, Id, Question, QuestionFields, QuestionPatch};
use crate::reactive::Derived;
use crate::store::{EntityFields, EntityKind, EntityPatch};

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRow {
    pub id: Id,
    pub text: String,
    pub kind_label: String,
    pub category: Option<String>,
}

impl QuestionRow {
    fn build(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            kind_label: question.kind.label(),
            category: question.category.clone(),
        }
    }
}

pub struct QuestionsViewModel {
    rows: Derived<RowSet<QuestionRow>>,
    category_options: Derived<RowSet<OptionItem>>,
    actions: EntityActions<Question>,
}

impl QuestionsViewModel {
    pub fn new(
        ctx: &FeatureContext,
        questions: Adapter<Vec<Question>>,
        categories: Adapter<Vec<Category>>,
    ) -> Self {
        let rows = Derived::new(move || {
            questions.with(|state| {
                RowSet::project(state, |items| items.iter().map(QuestionRow::build).collect())
            })
        });
        // Questions are tagged by category name, so the name doubles as id.
        let category_options = Derived::new(move || {
            categories.with(|state| {
                RowSet::project(state, |items| {
                    items
                        .iter()
                        .map(|category| OptionItem {
                            id: category.name.clone(),
                            label: category.name.clone(),
                        })
                        .collect()
                })
            })
        });

        Self {
            rows,
            category_options,
            actions: EntityActions::new(ctx, EntityKind::Question),
        }
    }

    pub fn rows(&self) -> &Derived<RowSet<QuestionRow>> {
        &self.rows
    }

    pub fn category_options(&self) -> &Derived<RowSet<OptionItem>> {
        &self.category_options
    }

    pub fn edit_dialog(&self) -> DialogState<Question> {
        self.actions.edit.state()
    }

    pub fn delete_dialog(&self) -> DialogState<Question> {
        self.actions.delete.state()
    }

    pub fn open_create(&self) {
        self.actions.open_create();
    }

    pub fn open_edit(&self, question: Question) {
        self.actions.open_edit(question);
    }

    pub fn close_edit(&self) {
        self.actions.close_edit();
    }

    pub fn confirm_delete(&self, question: Question) {
        self.actions.delete.open_with(question);
    }

    pub fn close_delete(&self) {
        self.actions.delete.close();
    }

    pub async fn on_create_submit(&self, fields: QuestionFields) -> Result<Id, ActionError> {
        self.actions
            .create(EntityFields::Question(fields), Vec::new())
            .await
    }

    pub async fn on_edit_submit(&self, fields: QuestionFields) -> Result<(), ActionError> {
        let Some(target) = self.actions.edit.target_untracked() else {
            return Err(ActionError::invalid("No question is being edited"));
        };
        let patch = QuestionPatch {
            text: Some(fields.text),
            kind: Some(fields.kind),
            category: Some(fields.category),
        };
        self.actions
            .update(target.id, EntityPatch::Question(patch), Vec::new())
            .await
    }

    pub async fn on_delete(&self, id: Id) -> Result<(), ActionError> {
        self.actions.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionKind;

    #[test]
    fn test_row_shows_kind_label() {
        let question = Question {
            id: "q1".into(),
            text: "Do you enjoy proofs?".into(),
            kind: QuestionKind::Scale { min: 1, max: 5 },
            category: Some("Theory".into()),
            updated_at: String::new(),
        };
        let row = QuestionRow::build(&question);
        assert_eq!(row.kind_label, "Scale 1-5");
        assert_eq!(row.category.as_deref(), Some("Theory"));
    }
}
