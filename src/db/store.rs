//! The repository as a [`Store`] for view-models running in-process.

use futures::{FutureExt, StreamExt};

use super::Repository;
use crate::errors::AppError;
use crate::models::Id;
use crate::store::{
    EntityFields, EntityKind, EntityPatch, LinkSet, MutationFuture, Query, Snapshot, SnapshotStream,
    Store,
};

impl Repository {
    /// Current value of `query`.
    pub async fn snapshot(&self, query: &Query) -> Result<Snapshot, AppError> {
        Ok(match query {
            Query::Periods => Snapshot::Periods(self.list_periods().await?),
            Query::Topics => Snapshot::Topics(self.list_topics().await?),
            Query::Questions => Snapshot::Questions(self.list_questions().await?),
            Query::Categories => Snapshot::Categories(self.list_categories().await?),
            Query::Students => Snapshot::Students(self.list_students().await?),
            Query::Links { set, parent } => Snapshot::Links(self.list_links(*set, parent).await?),
            Query::Assignments { period_id } => {
                Snapshot::Assignments(self.list_assignments(period_id).await?)
            }
        })
    }
}

impl Store for Repository {
    /// Emits a snapshot now and after every revision change. Revisions that
    /// arrive while a snapshot is being read collapse into one re-read.
    fn watch(&self, query: &Query) -> SnapshotStream {
        let revisions = self.subscribe();
        let state = (self.clone(), query.clone(), revisions, true);
        futures::stream::unfold(state, |(repo, query, mut revisions, first)| async move {
            if first {
                revisions.borrow_and_update();
            } else if revisions.changed().await.is_err() {
                return None;
            }
            let snapshot = repo.snapshot(&query).await;
            Some((snapshot, (repo, query, revisions, false)))
        })
        .boxed_local()
    }

    fn create(&self, fields: EntityFields) -> MutationFuture<Id> {
        let repo = self.clone();
        async move {
            let id = match fields {
                EntityFields::Period(fields) => repo.create_period(&fields).await?.id,
                EntityFields::Topic(fields) => repo.create_topic(&fields).await?.id,
                EntityFields::Question(fields) => repo.create_question(&fields).await?.id,
                EntityFields::Category(fields) => repo.create_category(&fields).await?.id,
                EntityFields::Student(fields) => repo.create_student(&fields).await?.id,
            };
            Ok(id)
        }
        .boxed_local()
    }

    fn update(&self, id: Id, patch: EntityPatch) -> MutationFuture<()> {
        let repo = self.clone();
        async move {
            match patch {
                EntityPatch::Period(patch) => {
                    repo.update_period(&id, &patch).await?;
                }
                EntityPatch::Topic(patch) => {
                    repo.update_topic(&id, &patch).await?;
                }
                EntityPatch::Question(patch) => {
                    repo.update_question(&id, &patch).await?;
                }
                EntityPatch::Category(patch) => {
                    repo.update_category(&id, &patch).await?;
                }
            }
            Ok(())
        }
        .boxed_local()
    }

    fn delete(&self, kind: EntityKind, id: Id) -> MutationFuture<()> {
        let repo = self.clone();
        async move { repo.delete(kind, &id).await }.boxed_local()
    }

    fn set_active_period(&self, id: Id) -> MutationFuture<()> {
        let repo = self.clone();
        async move { repo.set_active_period(&id).await }.boxed_local()
    }

    fn link(&self, set: LinkSet, parent: Id, child: Id) -> MutationFuture<()> {
        let repo = self.clone();
        async move { repo.link(set, &parent, &child).await }.boxed_local()
    }

    fn unlink(&self, set: LinkSet, parent: Id, child: Id) -> MutationFuture<()> {
        let repo = self.clone();
        async move { repo.unlink(set, &parent, &child).await }.boxed_local()
    }
}
