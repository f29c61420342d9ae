//! Diff-based synchronisation of a persisted link set.
//!
//! Given the ids currently linked to a parent and the ids a form wants
//! linked, [`DiffSynchronizer::sync`] issues one `unlink` per id to drop and
//! one `link` per id to add, and nothing else. The store treats both calls
//! as idempotent, so the calls commute.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::Id;

/// What happens to the remaining calls once one of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Issue every call, then report the first failure.
    #[default]
    AttemptAll,
    /// Issue calls one at a time and stop at the first failure.
    FailFast,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::AttemptAll => "attempt-all",
            FailurePolicy::FailFast => "fail-fast",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "attempt-all" => Some(FailurePolicy::AttemptAll),
            "fail-fast" => Some(FailurePolicy::FailFast),
            _ => None,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single remote call on a link set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkOp {
    Unlink(Id),
    Link(Id),
}

impl LinkOp {
    pub fn id(&self) -> &Id {
        match self {
            LinkOp::Unlink(id) | LinkOp::Link(id) => id,
        }
    }
}

impl fmt::Display for LinkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOp::Unlink(id) => write!(f, "unlink({id})"),
            LinkOp::Link(id) => write!(f, "link({id})"),
        }
    }
}

/// The set difference between current and desired ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkPlan {
    pub to_remove: BTreeSet<Id>,
    pub to_add: BTreeSet<Id>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    pub fn call_count(&self) -> usize {
        self.to_remove.len() + self.to_add.len()
    }

    /// Removals first, then additions, each in id order.
    pub fn ops(&self) -> Vec<LinkOp> {
        self.to_remove
            .iter()
            .cloned()
            .map(LinkOp::Unlink)
            .chain(self.to_add.iter().cloned().map(LinkOp::Link))
            .collect()
    }
}

/// Calls that reached the store successfully.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub applied: Vec<LinkOp>,
}

impl SyncReport {
    /// The link set the store holds once `applied` has taken effect on
    /// `current`.
    pub fn apply_to(&self, current: &BTreeSet<Id>) -> BTreeSet<Id> {
        let mut next = current.clone();
        for op in &self.applied {
            match op {
                LinkOp::Unlink(id) => {
                    next.remove(id);
                }
                LinkOp::Link(id) => {
                    next.insert(id.clone());
                }
            }
        }
        next
    }
}

/// A synchronisation that left the link set partially updated.
///
/// Nothing is rolled back: `applied` already took effect.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncError {
    /// The first failure, in removal-then-addition order.
    pub first: AppError,
    pub failed: Vec<(LinkOp, AppError)>,
    pub applied: Vec<LinkOp>,
    /// Never issued. Only populated under [`FailurePolicy::FailFast`].
    pub skipped: Vec<LinkOp>,
}

impl SyncError {
    pub fn report(&self) -> SyncReport {
        SyncReport {
            applied: self.applied.clone(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "link synchronisation incomplete: {} failed, {} applied, {} skipped: {}",
            self.failed.len(),
            self.applied.len(),
            self.skipped.len(),
            self.first
        )
    }
}

impl std::error::Error for SyncError {}

/// Reconciles a link set with a desired set of child ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffSynchronizer {
    policy: FailurePolicy,
}

impl DiffSynchronizer {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn plan(current: &BTreeSet<Id>, desired: &BTreeSet<Id>) -> LinkPlan {
        LinkPlan {
            to_remove: current.difference(desired).cloned().collect(),
            to_add: desired.difference(current).cloned().collect(),
        }
    }

    /// Issue the calls that turn `current` into `desired`.
    ///
    /// Makes no call at all when the sets are equal.
    pub async fn sync<L, LF, U, UF>(
        &self,
        current: &BTreeSet<Id>,
        desired: &BTreeSet<Id>,
        link: L,
        unlink: U,
    ) -> Result<SyncReport, SyncError>
    where
        L: Fn(Id) -> LF,
        LF: Future<Output = Result<(), AppError>>,
        U: Fn(Id) -> UF,
        UF: Future<Output = Result<(), AppError>>,
    {
        let plan = Self::plan(current, desired);
        if plan.is_empty() {
            return Ok(SyncReport::default());
        }
        debug!(
            policy = %self.policy,
            unlink = plan.to_remove.len(),
            link = plan.to_add.len(),
            "synchronising link set"
        );

        let ops = plan.ops();
        let (outcomes, skipped) = match self.policy {
            FailurePolicy::AttemptAll => {
                let calls = ops.into_iter().map(|op| {
                    let (link, unlink) = (&link, &unlink);
                    async move {
                        let result = match &op {
                            LinkOp::Unlink(id) => unlink(id.clone()).await,
                            LinkOp::Link(id) => link(id.clone()).await,
                        };
                        (op, result)
                    }
                });
                (join_all(calls).await, Vec::new())
            }
            FailurePolicy::FailFast => {
                let mut outcomes = Vec::with_capacity(ops.len());
                let mut remaining = ops.into_iter();
                for op in remaining.by_ref() {
                    let result = match &op {
                        LinkOp::Unlink(id) => unlink(id.clone()).await,
                        LinkOp::Link(id) => link(id.clone()).await,
                    };
                    let failed = result.is_err();
                    outcomes.push((op, result));
                    if failed {
                        break;
                    }
                }
                (outcomes, remaining.collect())
            }
        };

        let mut applied = Vec::new();
        let mut failed = Vec::new();
        for (op, result) in outcomes {
            match result {
                Ok(()) => applied.push(op),
                Err(err) => failed.push((op, err)),
            }
        }

        match failed.first() {
            None => Ok(SyncReport { applied }),
            Some((op, err)) => {
                warn!(
                    first = %op,
                    error = %err,
                    failed = failed.len(),
                    applied = applied.len(),
                    skipped = skipped.len(),
                    "link synchronisation incomplete"
                );
                Err(SyncError {
                    first: err.clone(),
                    failed,
                    applied,
                    skipped,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ids(items: &[&str]) -> BTreeSet<Id> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<LinkOp>>,
        failing: RefCell<BTreeSet<Id>>,
    }

    impl Recorder {
        fn fail_on(&self, id: &str) {
            self.failing.borrow_mut().insert(id.to_string());
        }

        fn call(&self, op: LinkOp) -> Result<(), AppError> {
            let fails = self.failing.borrow().contains(op.id());
            self.calls.borrow_mut().push(op.clone());
            if fails {
                Err(AppError::Database(format!("{op} failed")))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<LinkOp> {
            self.calls.borrow().clone()
        }
    }

    async fn run(
        sync: &DiffSynchronizer,
        recorder: &Rc<Recorder>,
        current: &BTreeSet<Id>,
        desired: &BTreeSet<Id>,
    ) -> Result<SyncReport, SyncError> {
        sync.sync(
            current,
            desired,
            |id| {
                let recorder = Rc::clone(recorder);
                async move { recorder.call(LinkOp::Link(id)) }
            },
            |id| {
                let recorder = Rc::clone(recorder);
                async move { recorder.call(LinkOp::Unlink(id)) }
            },
        )
        .await
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(FailurePolicy::parse("attempt-all"), Some(FailurePolicy::AttemptAll));
        assert_eq!(FailurePolicy::parse(" fail-fast "), Some(FailurePolicy::FailFast));
        assert_eq!(FailurePolicy::parse("retry"), None);
        assert_eq!(FailurePolicy::default(), FailurePolicy::AttemptAll);
    }

    #[test]
    fn test_plan_is_minimal_for_every_pair_of_subsets() {
        let universe = ["a", "b", "c", "d"];
        let subset = |mask: u32| -> BTreeSet<Id> {
            universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| s.to_string())
                .collect()
        };
        for c in 0..16 {
            for d in 0..16 {
                let (current, desired) = (subset(c), subset(d));
                let plan = DiffSynchronizer::plan(&current, &desired);
                assert_eq!(plan.to_add.len(), desired.difference(&current).count());
                assert_eq!(plan.to_remove.len(), current.difference(&desired).count());
                assert_eq!(plan.is_empty(), current == desired);
                assert!(plan.to_add.is_disjoint(&plan.to_remove));
            }
        }
    }

    #[tokio::test]
    async fn test_sync_edit_touches_only_changed_ids() {
        let recorder = Rc::new(Recorder::default());
        let sync = DiffSynchronizer::default();
        let report = run(&sync, &recorder, &ids(&["q1", "q2", "q3"]), &ids(&["q2", "q4"]))
            .await
            .unwrap();

        let calls = recorder.calls();
        assert_eq!(
            calls,
            vec![
                LinkOp::Unlink("q1".into()),
                LinkOp::Unlink("q3".into()),
                LinkOp::Link("q4".into()),
            ]
        );
        assert!(calls.iter().all(|op| op.id() != "q2"));
        assert_eq!(report.apply_to(&ids(&["q1", "q2", "q3"])), ids(&["q2", "q4"]));
    }

    #[tokio::test]
    async fn test_sync_edge_cases() {
        let sync = DiffSynchronizer::default();

        let recorder = Rc::new(Recorder::default());
        run(&sync, &recorder, &ids(&[]), &ids(&["q1", "q2"])).await.unwrap();
        assert_eq!(
            recorder.calls(),
            vec![LinkOp::Link("q1".into()), LinkOp::Link("q2".into())]
        );

        let recorder = Rc::new(Recorder::default());
        run(&sync, &recorder, &ids(&["q1", "q2"]), &ids(&[])).await.unwrap();
        assert_eq!(
            recorder.calls(),
            vec![LinkOp::Unlink("q1".into()), LinkOp::Unlink("q2".into())]
        );

        let recorder = Rc::new(Recorder::default());
        let report = run(&sync, &recorder, &ids(&["q1"]), &ids(&["q1"])).await.unwrap();
        assert!(recorder.calls().is_empty());
        assert!(report.applied.is_empty());
    }

    #[tokio::test]
    async fn test_resync_after_sync_is_silent() {
        let recorder = Rc::new(Recorder::default());
        let sync = DiffSynchronizer::default();
        let (current, desired) = (ids(&["a", "b"]), ids(&["b", "c"]));
        let report = run(&sync, &recorder, &current, &desired).await.unwrap();
        let now = report.apply_to(&current);
        assert_eq!(now, desired);

        let before = recorder.calls().len();
        run(&sync, &recorder, &now, &desired).await.unwrap();
        assert_eq!(recorder.calls().len(), before);
    }

    #[tokio::test]
    async fn test_attempt_all_issues_every_call_and_reports_first_error() {
        let recorder = Rc::new(Recorder::default());
        recorder.fail_on("a");
        recorder.fail_on("d");
        let sync = DiffSynchronizer::new(FailurePolicy::AttemptAll);
        let err = run(&sync, &recorder, &ids(&["a", "b"]), &ids(&["c", "d"]))
            .await
            .unwrap_err();

        assert_eq!(recorder.calls().len(), 4);
        assert_eq!(err.first, AppError::Database("unlink(a) failed".into()));
        assert_eq!(err.failed.len(), 2);
        assert_eq!(
            err.applied,
            vec![LinkOp::Unlink("b".into()), LinkOp::Link("c".into())]
        );
        assert!(err.skipped.is_empty());
        assert_eq!(err.report().apply_to(&ids(&["a", "b"])), ids(&["a", "c"]));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_and_lists_skipped_calls() {
        let recorder = Rc::new(Recorder::default());
        recorder.fail_on("b");
        let sync = DiffSynchronizer::new(FailurePolicy::FailFast);
        let err = run(&sync, &recorder, &ids(&["a", "b"]), &ids(&["c", "d"]))
            .await
            .unwrap_err();

        assert_eq!(
            recorder.calls(),
            vec![LinkOp::Unlink("a".into()), LinkOp::Unlink("b".into())]
        );
        assert_eq!(err.applied, vec![LinkOp::Unlink("a".into())]);
        assert_eq!(
            err.skipped,
            vec![LinkOp::Link("c".into()), LinkOp::Link("d".into())]
        );
        assert!(err.to_string().contains("1 failed, 1 applied, 2 skipped"));
    }
}
