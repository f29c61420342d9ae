//! The remote procedure boundary the view layer talks to.
//!
//! Queries are push-based: [`Store::watch`] returns a stream that yields a
//! snapshot now and another one whenever the underlying data changes.
//! Mutations are one-shot futures. Both are `'static` and not `Send`: they
//! run on the single thread that owns the reactive graph.

use std::fmt;

use futures::future::LocalBoxFuture;
use futures::stream::LocalBoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{
    Assignment, Category, CategoryFields, CategoryPatch, Id, Period, PeriodFields, PeriodPatch,
    Question, QuestionFields, QuestionPatch, Student, StudentFields, Topic, TopicFields,
    TopicPatch,
};

/// Result of a remote mutation.
pub type MutationResult<T> = Result<T, AppError>;

/// Future returned by every mutation.
pub type MutationFuture<T> = LocalBoxFuture<'static, MutationResult<T>>;

/// Stream of snapshots for one query.
pub type SnapshotStream = LocalBoxStream<'static, Result<Snapshot, AppError>>;

/// A many-to-many association the store maintains with set semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkSet {
    /// Period (parent) to question (child).
    PeriodQuestions,
    /// Topic (parent) to category (child).
    TopicConstraints,
    /// Topic (parent) to allow-listed student email (child).
    TopicAllowList,
}

impl LinkSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkSet::PeriodQuestions => "period-questions",
            LinkSet::TopicConstraints => "topic-constraints",
            LinkSet::TopicAllowList => "topic-allow-list",
        }
    }

    /// Plural noun for the child side, for messages.
    pub fn children(&self) -> &'static str {
        match self {
            LinkSet::PeriodQuestions => "questions",
            LinkSet::TopicConstraints => "categories",
            LinkSet::TopicAllowList => "allow-list entries",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "period-questions" => Some(LinkSet::PeriodQuestions),
            "topic-constraints" => Some(LinkSet::TopicConstraints),
            "topic-allow-list" => Some(LinkSet::TopicAllowList),
            _ => None,
        }
    }
}

impl fmt::Display for LinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a data source plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Query {
    Periods,
    Topics,
    Questions,
    Categories,
    Students,
    /// Child ids linked to `parent` in a link set.
    Links { set: LinkSet, parent: Id },
    /// Matching results of one period.
    Assignments { period_id: Id },
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Periods => f.write_str("periods"),
            Query::Topics => f.write_str("topics"),
            Query::Questions => f.write_str("questions"),
            Query::Categories => f.write_str("categories"),
            Query::Students => f.write_str("students"),
            Query::Links { set, parent } => write!(f, "links/{}/{}", set, parent),
            Query::Assignments { period_id } => write!(f, "assignments/{}", period_id),
        }
    }
}

/// One pushed value of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Periods(Vec<Period>),
    Topics(Vec<Topic>),
    Questions(Vec<Question>),
    Categories(Vec<Category>),
    Students(Vec<Student>),
    Links(Vec<Id>),
    Assignments(Vec<Assignment>),
}

impl Snapshot {
    fn shape(&self) -> &'static str {
        match self {
            Snapshot::Periods(_) => "periods",
            Snapshot::Topics(_) => "topics",
            Snapshot::Questions(_) => "questions",
            Snapshot::Categories(_) => "categories",
            Snapshot::Students(_) => "students",
            Snapshot::Links(_) => "links",
            Snapshot::Assignments(_) => "assignments",
        }
    }
}

/// Typed extraction of a [`Snapshot`].
pub trait FromSnapshot: Sized {
    fn from_snapshot(snapshot: Snapshot) -> Result<Self, AppError>;
}

macro_rules! from_snapshot {
    ($target:ty, $variant:ident) => {
        impl FromSnapshot for $target {
            fn from_snapshot(snapshot: Snapshot) -> Result<Self, AppError> {
                match snapshot {
                    Snapshot::$variant(items) => Ok(items),
                    other => Err(AppError::Internal(format!(
                        "expected {} snapshot, got {}",
                        stringify!($variant),
                        other.shape()
                    ))),
                }
            }
        }
    };
}

from_snapshot!(Vec<Period>, Periods);
from_snapshot!(Vec<Topic>, Topics);
from_snapshot!(Vec<Question>, Questions);
from_snapshot!(Vec<Category>, Categories);
from_snapshot!(Vec<Student>, Students);
from_snapshot!(Vec<Id>, Links);
from_snapshot!(Vec<Assignment>, Assignments);

/// Entity families that support create/update/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Period,
    Topic,
    Question,
    Category,
    Student,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Period => "Period",
            EntityKind::Topic => "Topic",
            EntityKind::Question => "Question",
            EntityKind::Category => "Category",
            EntityKind::Student => "Student",
        }
    }
}

/// Arguments of `createEntity`.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityFields {
    Period(PeriodFields),
    Topic(TopicFields),
    Question(QuestionFields),
    Category(CategoryFields),
    Student(StudentFields),
}

impl EntityFields {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityFields::Period(_) => EntityKind::Period,
            EntityFields::Topic(_) => EntityKind::Topic,
            EntityFields::Question(_) => EntityKind::Question,
            EntityFields::Category(_) => EntityKind::Category,
            EntityFields::Student(_) => EntityKind::Student,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            EntityFields::Period(fields) => fields.validate(),
            EntityFields::Topic(fields) => fields.validate(),
            EntityFields::Question(fields) => fields.validate(),
            EntityFields::Category(fields) => fields.validate(),
            EntityFields::Student(fields) => fields.validate(),
        }
    }
}

/// Arguments of `updateEntity`. Students are not editable.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPatch {
    Period(PeriodPatch),
    Topic(TopicPatch),
    Question(QuestionPatch),
    Category(CategoryPatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPatch::Period(_) => EntityKind::Period,
            EntityPatch::Topic(_) => EntityKind::Topic,
            EntityPatch::Question(_) => EntityKind::Question,
            EntityPatch::Category(_) => EntityKind::Category,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            EntityPatch::Period(patch) => patch.validate(),
            EntityPatch::Topic(patch) => patch.validate(),
            EntityPatch::Question(patch) => patch.validate(),
            EntityPatch::Category(patch) => patch.validate(),
        }
    }
}

/// The persistent store as seen by the view layer.
///
/// `link` and `unlink` must be idempotent: linking a present child or
/// unlinking an absent one succeeds without effect.
pub trait Store {
    /// Subscribe to a query. The stream yields an initial snapshot and then
    /// one per change; it ends when the store shuts down.
    fn watch(&self, query: &Query) -> SnapshotStream;

    fn create(&self, fields: EntityFields) -> MutationFuture<Id>;

    fn update(&self, id: Id, patch: EntityPatch) -> MutationFuture<()>;

    /// Fails with [`AppError::ReferentialConstraint`] while other entities
    /// still reference `id`.
    fn delete(&self, kind: EntityKind, id: Id) -> MutationFuture<()>;

    /// Make `id` the single open period.
    fn set_active_period(&self, id: Id) -> MutationFuture<()>;

    fn link(&self, set: LinkSet, parent: Id, child: Id) -> MutationFuture<()>;

    fn unlink(&self, set: LinkSet, parent: Id, child: Id) -> MutationFuture<()>;
}
