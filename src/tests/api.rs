//! Integration tests for the store API.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, DEFAULT_DATE_FORMAT};
use crate::db::{init_database, Repository};
use crate::sync::FailurePolicy;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            sync_policy: FailurePolicy::AttemptAll,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        };

        let state = AppState {
            repo,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn put(&self, path: &str) -> (u16, Value) {
        let resp = self.client.put(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }
}

fn period_body(title: &str) -> Value {
    json!({
        "title": title,
        "openDate": "2026-03-01T09:00:00Z",
        "closeDate": "2026-03-15T18:00:00Z"
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_revision() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/revision").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["revisionId"], 0);
    assert!(body["data"]["generatedAt"].is_string());
}

#[tokio::test]
async fn test_period_lifecycle() {
    let fixture = TestFixture::new().await;

    let (status, created) = fixture.post("/api/periods", period_body("Spring")).await;
    assert_eq!(status, 200);
    assert_eq!(created["data"]["kind"], "inactive");
    let revision_after_create = created["revisionId"].as_i64().unwrap();
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/periods/{}", id)))
        .json(&json!({ "title": "Spring 2026" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["data"]["title"], "Spring 2026");
    assert_eq!(updated["data"]["openDate"], created["data"]["openDate"]);

    for (body, expected) in [
        (json!({ "description": "First round" }), json!("First round")),
        (json!({ "title": "Spring 2026" }), json!("First round")),
        (json!({ "description": null }), Value::Null),
    ] {
        let resp = fixture
            .client
            .put(fixture.url(&format!("/api/periods/{}", id)))
            .json(&body)
            .send()
            .await
            .unwrap();
        let updated: Value = resp.json().await.unwrap();
        assert_eq!(updated["data"]["description"], expected);
    }

    let (status, activated) = fixture.post(&format!("/api/periods/{}/activate", id), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(activated["data"]["kind"], "open");
    assert!(activated["revisionId"].as_i64().unwrap() > revision_after_create);

    let (status, assignments) = fixture.get(&format!("/api/periods/{}/assignments", id)).await;
    assert_eq!(status, 200);
    assert_eq!(assignments["data"], json!([]));

    let (status, _) = fixture.delete(&format!("/api/periods/{}", id)).await;
    assert_eq!(status, 200);
    let (_, list) = fixture.get("/api/periods").await;
    assert_eq!(list["data"], json!([]));
}

#[tokio::test]
async fn test_period_validation() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/periods",
            json!({
                "title": "Backwards",
                "openDate": "2026-03-15T18:00:00Z",
                "closeDate": "2026-03-01T09:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_links_and_referential_delete() {
    let fixture = TestFixture::new().await;

    let (_, period) = fixture.post("/api/periods", period_body("Spring")).await;
    let period_id = period["data"]["id"].as_str().unwrap().to_string();
    let (status, question) = fixture
        .post(
            "/api/questions",
            json!({ "text": "Enjoys parsers?", "kind": { "type": "boolean" } }),
        )
        .await;
    assert_eq!(status, 200);
    let question_id = question["data"]["id"].as_str().unwrap().to_string();

    let link_path = format!("/api/links/period-questions/{}/{}", period_id, question_id);
    let (status, first) = fixture.put(&link_path).await;
    assert_eq!(status, 200);
    // Linking again changes nothing, so the revision stays.
    let (status, second) = fixture.put(&link_path).await;
    assert_eq!(status, 200);
    assert_eq!(first["revisionId"], second["revisionId"]);

    let (_, links) = fixture
        .get(&format!("/api/links/period-questions/{}", period_id))
        .await;
    assert_eq!(links["data"], json!([question_id.clone()]));

    let (status, body) = fixture.delete(&format!("/api/questions/{}", question_id)).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "REFERENTIAL_CONSTRAINT_VIOLATION");

    let (status, _) = fixture.delete(&link_path).await;
    assert_eq!(status, 200);
    let (status, _) = fixture.delete(&format!("/api/questions/{}", question_id)).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_unknown_link_set() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/links/friendships/p1").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_topic_and_category_crud() {
    let fixture = TestFixture::new().await;

    let (status, category) = fixture
        .post(
            "/api/categories",
            json!({ "name": "Rust", "criterion": { "criterionType": "maximize" } }),
        )
        .await;
    assert_eq!(status, 200);
    let category_id = category["data"]["id"].as_str().unwrap().to_string();

    let (status, duplicate) = fixture
        .post(
            "/api/categories",
            json!({ "name": "Rust", "criterion": { "criterionType": "minimize" } }),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(duplicate["error"]["code"], "CONFLICT");

    let (status, topic) = fixture
        .post("/api/topics", json!({ "title": "Compilers" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(topic["data"]["isActive"], true);
    let topic_id = topic["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = fixture
        .put(&format!("/api/links/topic-constraints/{}/{}", topic_id, category_id))
        .await;
    assert_eq!(status, 200);
    let (status, _) = fixture
        .put(&format!("/api/links/topic-allow-list/{}/ada@example.org", topic_id))
        .await;
    assert_eq!(status, 200);

    let (status, _) = fixture.delete(&format!("/api/categories/{}", category_id)).await;
    assert_eq!(status, 409);

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/topics/{}", topic_id)))
        .json(&json!({ "isActive": false }))
        .send()
        .await
        .unwrap();
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["data"]["isActive"], false);
    assert_eq!(updated["data"]["title"], "Compilers");

    let (status, _) = fixture.delete("/api/topics/missing").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_students() {
    let fixture = TestFixture::new().await;

    let (status, student) = fixture
        .post(
            "/api/students",
            json!({ "email": "Ada@Example.org", "displayName": "Ada" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(student["data"]["email"], "ada@example.org");

    let (status, _) = fixture
        .post(
            "/api/students",
            json!({ "email": "ada@example.org", "displayName": "Ada again" }),
        )
        .await;
    assert_eq!(status, 409);

    let (_, list) = fixture.get("/api/students").await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let id = student["data"]["id"].as_str().unwrap();
    let (status, _) = fixture.delete(&format!("/api/students/{}", id)).await;
    assert_eq!(status, 200);
}
