//! Topics with their constraint categories and student allow-list.

use tracing::info;

use super::{
    ActionError, ActionStage, EntityActions, FeatureContext, LinkDiff, LinkedChildren, OptionItem,
    PendingLinks, RowSet,
};
use crate::adapter::{Adapter, QueryState};
use crate::dialog::DialogState;
use crate::errors::AppError;
use crate::models::{normalize_email, Category, Id, Topic, TopicFields, TopicPatch};
use crate::reactive::Derived;
use crate::store::{EntityFields, EntityKind, EntityPatch, LinkSet};

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRow {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub active_label: &'static str,
    pub active_class: &'static str,
}

impl TopicRow {
    fn build(topic: &Topic) -> Self {
        let (active_label, active_class) = if topic.is_active {
            ("Active", "topic-active")
        } else {
            ("Inactive", "topic-inactive")
        };
        Self {
            id: topic.id.clone(),
            title: topic.title.clone(),
            description: topic.description.clone().unwrap_or_default(),
            active_label,
            active_class,
        }
    }
}

/// Values submitted by the topic dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicForm {
    pub fields: TopicFields,
    pub constraint_ids: Vec<Id>,
    /// Raw addresses as typed; normalised before linking.
    pub allow_list: Vec<String>,
}

impl TopicForm {
    fn allow_list(&self) -> Result<Vec<String>, ActionError> {
        self.allow_list
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                normalize_email(raw).ok_or_else(|| {
                    ActionError::invalid(format!("Invalid email address: {}", raw.trim()))
                })
            })
            .collect()
    }
}

fn topic_id(topic: &Topic) -> Id {
    topic.id.clone()
}

pub struct TopicsViewModel {
    topics: Adapter<Vec<Topic>>,
    rows: Derived<RowSet<TopicRow>>,
    category_options: Derived<RowSet<OptionItem>>,
    linked_constraints: LinkedChildren,
    linked_allow_list: LinkedChildren,
    actions: EntityActions<Topic>,
}

impl TopicsViewModel {
    pub fn new(
        ctx: &FeatureContext,
        topics: Adapter<Vec<Topic>>,
        categories: Adapter<Vec<Category>>,
    ) -> Self {
        let rows = {
            let topics = topics.clone();
            Derived::new(move || {
                topics.with(|state| {
                    RowSet::project(state, |items| items.iter().map(TopicRow::build).collect())
                })
            })
        };

        let category_options = Derived::new(move || {
            categories.with(|state| {
                RowSet::project(state, |items| {
                    items
                        .iter()
                        .map(|category| OptionItem {
                            id: category.id.clone(),
                            label: category.name.clone(),
                        })
                        .collect()
                })
            })
        });

        let actions = EntityActions::new(ctx, EntityKind::Topic);
        let linked_constraints =
            LinkedChildren::new(ctx, &actions.edit, LinkSet::TopicConstraints, topic_id);
        let linked_allow_list =
            LinkedChildren::new(ctx, &actions.edit, LinkSet::TopicAllowList, topic_id);

        Self {
            topics,
            rows,
            category_options,
            linked_constraints,
            linked_allow_list,
            actions,
        }
    }

    pub fn rows(&self) -> &Derived<RowSet<TopicRow>> {
        &self.rows
    }

    pub fn category_options(&self) -> &Derived<RowSet<OptionItem>> {
        &self.category_options
    }

    pub fn linked_constraint_ids(&self) -> QueryState<Vec<Id>> {
        self.linked_constraints.get()
    }

    pub fn linked_allow_list(&self) -> QueryState<Vec<String>> {
        self.linked_allow_list.get()
    }

    pub fn edit_dialog(&self) -> DialogState<Topic> {
        self.actions.edit.state()
    }

    pub fn delete_dialog(&self) -> DialogState<Topic> {
        self.actions.delete.state()
    }

    pub fn pending_links(&self) -> Option<PendingLinks> {
        self.actions.pending_links()
    }

    pub fn open_create(&self) {
        self.actions.open_create();
    }

    pub fn open_edit(&self, topic: Topic) {
        self.actions.open_edit(topic);
    }

    pub fn close_edit(&self) {
        self.actions.close_edit();
    }

    pub fn confirm_delete(&self, topic: Topic) {
        self.actions.delete.open_with(topic);
    }

    pub fn close_delete(&self) {
        self.actions.delete.close();
    }

    pub async fn on_create_submit(&self, form: TopicForm) -> Result<Id, ActionError> {
        let allow_list = form.allow_list()?;
        self.actions
            .create(
                EntityFields::Topic(form.fields),
                vec![
                    (
                        LinkSet::TopicConstraints,
                        form.constraint_ids.into_iter().collect(),
                    ),
                    (LinkSet::TopicAllowList, allow_list.into_iter().collect()),
                ],
            )
            .await
    }

    pub async fn on_edit_submit(&self, form: TopicForm) -> Result<(), ActionError> {
        let Some(target) = self.actions.edit.target_untracked() else {
            return Err(ActionError::invalid("No topic is being edited"));
        };
        let allow_list = form.allow_list()?;
        let constraints = self.linked_constraints.loaded()?;
        let allowed = self.linked_allow_list.loaded()?;
        form.fields
            .validate()
            .map_err(|err| ActionError::new(ActionStage::Validation, err))?;

        let patch = TopicPatch {
            title: Some(form.fields.title),
            description: Some(form.fields.description),
            is_active: Some(form.fields.is_active),
        };
        let diffs = vec![
            LinkDiff::new(LinkSet::TopicConstraints, constraints, form.constraint_ids),
            LinkDiff::new(LinkSet::TopicAllowList, allowed, allow_list),
        ];
        self.actions
            .update(target.id, EntityPatch::Topic(patch), diffs)
            .await
    }

    pub async fn on_delete(&self, id: Id) -> Result<(), ActionError> {
        self.actions.remove(id).await
    }

    /// Flip `is_active` on a listed topic. No dialog is involved.
    pub async fn on_toggle_active(&self, id: Id) -> Result<(), ActionError> {
        let Some(is_active) = self.topics.get_untracked().as_ready().and_then(|items| {
            items
                .iter()
                .find(|topic| topic.id == id)
                .map(|topic| topic.is_active)
        }) else {
            return Err(ActionError::new(
                ActionStage::Update,
                AppError::NotFound(format!("Topic not found: {}", id)),
            ));
        };

        let patch = TopicPatch {
            is_active: Some(!is_active),
            ..TopicPatch::default()
        };
        self.actions
            .store()
            .update(id.clone(), EntityPatch::Topic(patch))
            .await
            .map_err(|err| ActionError::new(ActionStage::Update, err))?;
        info!(%id, active = !is_active, "topic toggled");
        Ok(())
    }

    pub async fn retry_linking(&self) -> Result<(), ActionError> {
        self.actions.retry_linking().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(allow_list: &[&str]) -> TopicForm {
        TopicForm {
            fields: TopicFields {
                title: "Compilers".into(),
                description: None,
                is_active: true,
            },
            constraint_ids: vec![],
            allow_list: allow_list.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_allow_list_is_normalised() {
        let emails = form(&[" Ada@Example.org", "", "bob@example.org "])
            .allow_list()
            .unwrap();
        assert_eq!(emails, vec!["ada@example.org", "bob@example.org"]);

        let err = form(&["not-an-address"]).allow_list().unwrap_err();
        assert_eq!(err.stage, ActionStage::Validation);
        assert!(err.user_message().contains("not-an-address"));
    }

    #[test]
    fn test_row_labels() {
        let topic = Topic {
            id: "t1".into(),
            title: "Compilers".into(),
            description: None,
            is_active: false,
            updated_at: String::new(),
        };
        let row = TopicRow::build(&topic);
        assert_eq!(row.active_label, "Inactive");
        assert_eq!(row.description, "");
    }
}
