//! Students joined with the current period's assignments.

use std::collections::HashMap;

use super::{ActionError, EntityActions, FeatureContext, RowSet};
use crate::adapter::{Adapter, QueryState};
use crate::dialog::DialogState;
use crate::models::{Assignment, Id, Period, Student, Topic};
use crate::reactive::{Cell, Derived};
use crate::store::EntityKind;

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRow {
    pub id: Id,
    pub email: String,
    pub display_name: String,
    pub topic_title: Option<String>,
    pub preference_rank: Option<u32>,
    pub match_label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StudentSummary {
    pub matched: usize,
    pub total: usize,
}

fn build_rows(
    students: &[Student],
    topics: &[Topic],
    assignments: &[Assignment],
) -> Vec<StudentRow> {
    let titles: HashMap<&str, &str> = topics
        .iter()
        .map(|topic| (topic.id.as_str(), topic.title.as_str()))
        .collect();
    let by_student: HashMap<&str, &Assignment> = assignments
        .iter()
        .map(|assignment| (assignment.student_id.as_str(), assignment))
        .collect();

    students
        .iter()
        .map(|student| {
            let assignment = by_student.get(student.id.as_str()).copied();
            StudentRow {
                id: student.id.clone(),
                email: student.email.clone(),
                display_name: student.display_name.clone(),
                topic_title: assignment
                    .and_then(|a| titles.get(a.topic_id.as_str()))
                    .map(|title| title.to_string()),
                preference_rank: assignment.map(|a| a.preference_rank),
                match_label: match assignment {
                    Some(a) if a.is_matched => "Matched",
                    Some(_) => "Unmatched",
                    None => "Not assigned",
                },
            }
        })
        .collect()
}

pub struct StudentsViewModel {
    rows: Derived<RowSet<StudentRow>>,
    summary: Derived<StudentSummary>,
    actions: EntityActions<Student>,
}

impl StudentsViewModel {
    /// `assignments` follows the current period and is skipped when there
    /// is none. A skipped adapter means no student is assigned only once
    /// `periods` is ready; before that it carries the periods' state.
    pub fn new(
        ctx: &FeatureContext,
        students: Adapter<Vec<Student>>,
        topics: Adapter<Vec<Topic>>,
        periods: Adapter<Vec<Period>>,
        assignments: Cell<Adapter<Vec<Assignment>>>,
    ) -> Self {
        let rows = Derived::new(move || {
            let current = assignments.get();
            let assigned = if current.is_skipped() {
                periods.with(|state| match state {
                    QueryState::Ready(_) => QueryState::Ready(Vec::new()),
                    QueryState::Failed(err) => QueryState::Failed(err.clone()),
                    QueryState::Pending => QueryState::Pending,
                })
            } else {
                current.get()
            };
            let listed = topics.get();
            students.with(|state| match (state, &listed, &assigned) {
                (QueryState::Failed(err), _, _)
                | (_, QueryState::Failed(err), _)
                | (_, _, QueryState::Failed(err)) => RowSet::unavailable(err),
                (
                    QueryState::Ready(students),
                    QueryState::Ready(topics),
                    QueryState::Ready(assignments),
                ) => RowSet::loaded(build_rows(students, topics, assignments)),
                _ => RowSet::loading(),
            })
        });

        let summary = {
            let rows = rows.clone();
            Derived::new(move || {
                let rows = rows.get();
                StudentSummary {
                    matched: rows
                        .rows
                        .iter()
                        .filter(|row| row.match_label == "Matched")
                        .count(),
                    total: rows.rows.len(),
                }
            })
        };

        Self {
            rows,
            summary,
            actions: EntityActions::new(ctx, EntityKind::Student),
        }
    }

    pub fn rows(&self) -> &Derived<RowSet<StudentRow>> {
        &self.rows
    }

    pub fn summary(&self) -> &Derived<StudentSummary> {
        &self.summary
    }

    pub fn delete_dialog(&self) -> DialogState<Student> {
        self.actions.delete.state()
    }

    pub fn confirm_delete(&self, student: Student) {
        self.actions.delete.open_with(student);
    }

    pub fn close_delete(&self) {
        self.actions.delete.close();
    }

    pub async fn on_delete(&self, id: Id) -> Result<(), ActionError> {
        self.actions.remove(id).await
    }
}
