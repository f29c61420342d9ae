//! The root view-model: shared adapters, cross-feature values and the
//! feature view-models built on them.

use std::rc::Rc;

use tracing::debug;

use crate::adapter::{Adapter, AdapterRegistry, QueryState};
use crate::config::ViewSettings;
use crate::features::{
    CategoriesViewModel, FeatureContext, PeriodsViewModel, QuestionsViewModel, StudentsViewModel,
    TopicsViewModel,
};
use crate::models::{Assignment, Category, Period, PeriodKind, Question, Student, Topic};
use crate::reactive::{untrack, Cell, Derived, Effect};
use crate::store::{Query, Store};

/// The period the app revolves around: the open one, or failing that the
/// first one with published assignments.
pub fn current_period_of(periods: &[Period]) -> Option<Period> {
    periods
        .iter()
        .find(|period| period.kind == PeriodKind::Open)
        .or_else(|| {
            periods
                .iter()
                .find(|period| period.kind == PeriodKind::Assigned)
        })
        .cloned()
}

pub struct RootViewModel {
    registry: Rc<AdapterRegistry>,
    period_source: Adapter<Vec<Period>>,
    topic_source: Adapter<Vec<Topic>>,
    question_source: Adapter<Vec<Question>>,
    category_source: Adapter<Vec<Category>>,
    student_source: Adapter<Vec<Student>>,
    current_period: Derived<Option<Period>>,
    assignments: Cell<Adapter<Vec<Assignment>>>,
    periods: PeriodsViewModel,
    topics: TopicsViewModel,
    questions: QuestionsViewModel,
    categories: CategoriesViewModel,
    students: StudentsViewModel,
    _follow_period: Effect,
}

impl RootViewModel {
    /// Subscribe to the global sources and build every feature once.
    ///
    /// Must be called inside a `tokio::task::LocalSet`.
    pub fn new(store: Rc<dyn Store>, settings: ViewSettings) -> Self {
        let registry = Rc::new(AdapterRegistry::new(store));
        let ctx = FeatureContext {
            registry: Rc::clone(&registry),
            settings,
        };

        let period_source: Adapter<Vec<Period>> = registry.adapter(Some(Query::Periods));
        let topic_source: Adapter<Vec<Topic>> = registry.adapter(Some(Query::Topics));
        let question_source: Adapter<Vec<Question>> = registry.adapter(Some(Query::Questions));
        let category_source: Adapter<Vec<Category>> = registry.adapter(Some(Query::Categories));
        let student_source: Adapter<Vec<Student>> = registry.adapter(Some(Query::Students));

        let current_period = {
            let periods = period_source.clone();
            Derived::new(move || {
                periods.with(|state| match state {
                    QueryState::Ready(items) => current_period_of(items),
                    _ => None,
                })
            })
        };

        let assignments = Cell::new(Adapter::skipped());
        let follow_period = {
            let current = current_period.clone();
            let registry = Rc::clone(&registry);
            let assignments = assignments.clone();
            Effect::new(move || {
                let query = current.get().map(|period| Query::Assignments {
                    period_id: period.id,
                });
                debug!(query = ?query, "assignments follow the current period");
                assignments.set(untrack(|| registry.adapter(query)));
            })
        };

        let periods = PeriodsViewModel::new(
            &ctx,
            period_source.clone(),
            question_source.clone(),
            current_period.clone(),
        );
        let topics = TopicsViewModel::new(&ctx, topic_source.clone(), category_source.clone());
        let questions =
            QuestionsViewModel::new(&ctx, question_source.clone(), category_source.clone());
        let categories =
            CategoriesViewModel::new(&ctx, category_source.clone(), question_source.clone());
        let students = StudentsViewModel::new(
            &ctx,
            student_source.clone(),
            topic_source.clone(),
            period_source.clone(),
            assignments.clone(),
        );

        Self {
            registry,
            period_source,
            topic_source,
            question_source,
            category_source,
            student_source,
            current_period,
            assignments,
            periods,
            topics,
            questions,
            categories,
            students,
            _follow_period: follow_period,
        }
    }

    pub fn registry(&self) -> &Rc<AdapterRegistry> {
        &self.registry
    }

    pub fn current_period(&self) -> &Derived<Option<Period>> {
        &self.current_period
    }

    /// Assignments of the current period; skipped when there is none.
    pub fn assignments(&self) -> Adapter<Vec<Assignment>> {
        self.assignments.get()
    }

    pub fn period_source(&self) -> &Adapter<Vec<Period>> {
        &self.period_source
    }

    pub fn topic_source(&self) -> &Adapter<Vec<Topic>> {
        &self.topic_source
    }

    pub fn question_source(&self) -> &Adapter<Vec<Question>> {
        &self.question_source
    }

    pub fn category_source(&self) -> &Adapter<Vec<Category>> {
        &self.category_source
    }

    pub fn student_source(&self) -> &Adapter<Vec<Student>> {
        &self.student_source
    }

    pub fn periods(&self) -> &PeriodsViewModel {
        &self.periods
    }

    pub fn topics(&self) -> &TopicsViewModel {
        &self.topics
    }

    pub fn questions(&self) -> &QuestionsViewModel {
        &self.questions
    }

    pub fn categories(&self) -> &CategoriesViewModel {
        &self.categories
    }

    pub fn students(&self) -> &StudentsViewModel {
        &self.students
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn period(id: &str, kind: PeriodKind) -> Period {
        Period {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: None,
            open_date: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            close_date: Utc.with_ymd_and_hms(2026, 3, 15, 18, 0, 0).unwrap(),
            kind,
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_current_period_prefers_open() {
        let periods = vec![
            period("a", PeriodKind::Assigned),
            period("b", PeriodKind::Open),
            period("c", PeriodKind::Closed),
        ];
        assert_eq!(current_period_of(&periods).map(|p| p.id), Some("b".into()));

        let periods = vec![period("a", PeriodKind::Closed), period("b", PeriodKind::Assigned)];
        assert_eq!(current_period_of(&periods).map(|p| p.id), Some("b".into()));

        let periods = vec![period("a", PeriodKind::Inactive)];
        assert_eq!(current_period_of(&periods), None);
    }
}
