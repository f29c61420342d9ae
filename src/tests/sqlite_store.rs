//! The SQLite repository through the `Store` interface.

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use tempfile::TempDir;

use crate::db::{init_database, Repository};
use crate::errors::AppError;
use crate::models::{
    Assignment, PeriodFields, PeriodKind, QuestionFields, QuestionKind, StudentFields,
    TopicFields,
};
use crate::store::{EntityFields, EntityKind, LinkSet, Query, Snapshot, Store};

async fn repository() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let pool = init_database(&temp_dir.path().join("store.sqlite"))
        .await
        .expect("Failed to init DB");
    (Repository::new(pool), temp_dir)
}

fn period_fields(title: &str) -> PeriodFields {
    PeriodFields {
        title: title.to_string(),
        description: None,
        open_date: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        close_date: Utc.with_ymd_and_hms(2026, 3, 15, 18, 0, 0).unwrap(),
    }
}

fn question_fields(text: &str) -> QuestionFields {
    QuestionFields {
        text: text.to_string(),
        kind: QuestionKind::Scale { min: 1, max: 5 },
        category: None,
    }
}

#[tokio::test]
async fn test_watch_pushes_after_every_write() {
    let (repo, _dir) = repository().await;
    let mut periods = Store::watch(&repo, &Query::Periods);

    let initial = periods.next().await.unwrap().unwrap();
    assert_eq!(initial, Snapshot::Periods(vec![]));

    let id = Store::create(&repo, EntityFields::Period(period_fields("Spring")))
        .await
        .unwrap();
    match periods.next().await.unwrap().unwrap() {
        Snapshot::Periods(items) => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].id, id);
            assert_eq!(items[0].kind, PeriodKind::Inactive);
        }
        other => panic!("unexpected snapshot: {:?}", other),
    }
}

#[tokio::test]
async fn test_link_watch_and_idempotence() {
    let (repo, _dir) = repository().await;
    let period = repo.create_period(&period_fields("Spring")).await.unwrap();
    let question = repo.create_question(&question_fields("Rust?")).await.unwrap();

    let query = Query::Links {
        set: LinkSet::PeriodQuestions,
        parent: period.id.clone(),
    };
    let mut links = Store::watch(&repo, &query);
    assert_eq!(links.next().await.unwrap().unwrap(), Snapshot::Links(vec![]));

    let before = repo.get_revision_id().await.unwrap();
    Store::link(&repo, LinkSet::PeriodQuestions, period.id.clone(), question.id.clone())
        .await
        .unwrap();
    Store::link(&repo, LinkSet::PeriodQuestions, period.id.clone(), question.id.clone())
        .await
        .unwrap();
    assert_eq!(repo.get_revision_id().await.unwrap(), before + 1);
    assert_eq!(
        links.next().await.unwrap().unwrap(),
        Snapshot::Links(vec![question.id.clone()])
    );

    Store::unlink(&repo, LinkSet::PeriodQuestions, period.id.clone(), question.id.clone())
        .await
        .unwrap();
    Store::unlink(&repo, LinkSet::PeriodQuestions, period.id.clone(), question.id.clone())
        .await
        .unwrap();
    assert_eq!(repo.get_revision_id().await.unwrap(), before + 2);
}

#[tokio::test]
async fn test_delete_is_restricted_while_linked() {
    let (repo, _dir) = repository().await;
    let period = repo.create_period(&period_fields("Spring")).await.unwrap();
    let question = repo.create_question(&question_fields("Rust?")).await.unwrap();
    repo.link(LinkSet::PeriodQuestions, &period.id, &question.id)
        .await
        .unwrap();

    let err = Store::delete(&repo, EntityKind::Question, question.id.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReferentialConstraint(_)));
    let err = repo.delete(EntityKind::Period, &period.id).await.unwrap_err();
    assert!(matches!(err, AppError::ReferentialConstraint(_)));

    repo.unlink(LinkSet::PeriodQuestions, &period.id, &question.id)
        .await
        .unwrap();
    repo.delete(EntityKind::Question, &question.id).await.unwrap();

    let err = repo.delete(EntityKind::Question, &question.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_allow_list_goes_with_its_topic() {
    let (repo, _dir) = repository().await;
    let topic = repo
        .create_topic(&TopicFields {
            title: "Compilers".to_string(),
            description: None,
            is_active: true,
        })
        .await
        .unwrap();
    repo.link(LinkSet::TopicAllowList, &topic.id, "ada@example.org")
        .await
        .unwrap();

    repo.delete(EntityKind::Topic, &topic.id).await.unwrap();
    assert!(repo
        .list_links(LinkSet::TopicAllowList, &topic.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_single_open_period() {
    let (repo, _dir) = repository().await;
    let first = repo.create_period(&period_fields("Spring")).await.unwrap();
    let second = repo.create_period(&period_fields("Autumn")).await.unwrap();

    Store::set_active_period(&repo, first.id.clone()).await.unwrap();
    Store::set_active_period(&repo, second.id.clone()).await.unwrap();

    let first = repo.get_period(&first.id).await.unwrap().unwrap();
    let second = repo.get_period(&second.id).await.unwrap().unwrap();
    assert_eq!(first.kind, PeriodKind::Inactive);
    assert_eq!(second.kind, PeriodKind::Open);

    let err = repo.set_active_period("missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let open = repo
        .list_periods()
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.kind == PeriodKind::Open)
        .count();
    assert_eq!(open, 1);
}

#[tokio::test]
async fn test_assignments_pin_students() {
    let (repo, _dir) = repository().await;
    let period = repo.create_period(&period_fields("Spring")).await.unwrap();
    let topic = repo
        .create_topic(&TopicFields {
            title: "Compilers".to_string(),
            description: None,
            is_active: true,
        })
        .await
        .unwrap();
    let student = repo
        .create_student(&StudentFields {
            email: "ada@example.org".to_string(),
            display_name: "Ada".to_string(),
        })
        .await
        .unwrap();

    let assignment = Assignment {
        period_id: period.id.clone(),
        student_id: student.id.clone(),
        topic_id: topic.id.clone(),
        preference_rank: 1,
        is_matched: true,
    };
    repo.save_assignments(&[assignment.clone()]).await.unwrap();

    let snapshot = repo
        .snapshot(&Query::Assignments {
            period_id: period.id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(snapshot, Snapshot::Assignments(vec![assignment]));

    let err = repo.delete(EntityKind::Student, &student.id).await.unwrap_err();
    assert!(matches!(err, AppError::ReferentialConstraint(_)));
}

#[tokio::test]
async fn test_update_rejects_inverted_window() {
    let (repo, _dir) = repository().await;
    let period = repo.create_period(&period_fields("Spring")).await.unwrap();

    let patch = crate::models::PeriodPatch {
        open_date: Some(Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()),
        ..Default::default()
    };
    let err = repo.update_period(&period.id, &patch).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_update_clears_description_only_when_asked() {
    let (repo, _dir) = repository().await;
    let mut fields = period_fields("Spring");
    fields.description = Some("First round".to_string());
    let period = repo.create_period(&fields).await.unwrap();

    let renamed = crate::models::PeriodPatch {
        title: Some("Spring 2026".to_string()),
        ..Default::default()
    };
    let updated = repo.update_period(&period.id, &renamed).await.unwrap();
    assert_eq!(updated.description.as_deref(), Some("First round"));

    let cleared = crate::models::PeriodPatch {
        description: Some(None),
        ..Default::default()
    };
    repo.update_period(&period.id, &cleared).await.unwrap();
    let stored = repo.get_period(&period.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Spring 2026");
    assert_eq!(stored.description, None);
}
