//! Integration tests for the catalogue console.
//!
//! A scripted mock of the REST API runs on a random local port and records
//! every request; the console talks to it over real HTTP.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::console::Console;
use crate::errors::ApiError;
use crate::models::{CourseEdit, NewCourse, QuestionContentType, QuestionKey, Upload};
use crate::store::LoadingState;
use crate::sync::Scope;

/// One request as seen by the mock API.
#[derive(Debug, Clone)]
struct RecordedRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    content_type: Option<String>,
    authorization: Option<String>,
    body: Bytes,
}

impl RecordedRequest {
    fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn is_multipart(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.starts_with("multipart/form-data"))
    }
}

/// Scripted response of the mock API.
struct Reply {
    status: StatusCode,
    body: Value,
    delay: Duration,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self::status(StatusCode::OK, body)
    }

    fn status(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    fn no_content() -> Self {
        Self::status(StatusCode::NO_CONTENT, Value::Null)
    }

    fn not_found() -> Self {
        Self::status(StatusCode::NOT_FOUND, json!({"detail": "Not found."}))
    }

    fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

type Responder = Box<dyn Fn(&RecordedRequest, &str) -> Reply + Send + Sync>;

struct MockApi {
    base_url: String,
    requests: Mutex<Vec<RecordedRequest>>,
    responder: Responder,
}

async fn handle(
    State(mock): State<Arc<MockApi>>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let request = RecordedRequest {
        method,
        path: uri.path().to_string(),
        query,
        content_type: header_value(header::CONTENT_TYPE),
        authorization: header_value(header::AUTHORIZATION),
        body,
    };

    let reply = (mock.responder)(&request, &mock.base_url);
    mock.requests.lock().unwrap().push(request);

    tokio::time::sleep(reply.delay).await;

    if reply.body.is_null() {
        reply.status.into_response()
    } else {
        (reply.status, Json(reply.body)).into_response()
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    console: Console,
    mock: Arc<MockApi>,
}

impl TestFixture {
    async fn new(responder: impl Fn(&RecordedRequest, &str) -> Reply + Send + Sync + 'static) -> Self {
        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        let mock = Arc::new(MockApi {
            base_url: base_url.clone(),
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        });

        let app = Router::new().fallback(handle).with_state(mock.clone());

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        let config = Config {
            api_base_url: base_url,
            api_token: Some("test-token".to_string()),
            search_debounce: Duration::from_millis(30),
            log_level: "warn".to_string(),
            ..Config::default()
        };

        TestFixture {
            console: Console::new(&config).expect("Failed to build console"),
            mock,
        }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.mock.requests.lock().unwrap().clone()
    }

    fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }
}

fn timestamp(day: u32) -> String {
    format!("2024-01-{:02}T00:00:00Z", day)
}

fn course(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": "",
        "is_visible": true,
        "illustration": null,
        "tags": [{"id": 1, "name": "rust"}],
        "created_at": timestamp(id as u32),
        "updated_at": timestamp(id as u32)
    })
}

fn question(content_type: &str, id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "content_type": content_type,
        "choices": [],
        "created_at": timestamp(id as u32),
        "updated_at": timestamp(id as u32)
    })
}

fn page(count: u64, next: Option<String>, results: Vec<Value>) -> Value {
    json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results
    })
}

fn names(courses: &[crate::models::Course]) -> Vec<&str> {
    courses.iter().map(|course| course.name.as_str()).collect()
}

// ==================== LIST LOADING ====================

#[tokio::test]
async fn test_fresh_load_replaces_collection() {
    let fixture = TestFixture::new(|request, _| match request.param("search") {
        Some("rust") => Reply::ok(page(1, None, vec![course(3, "Rust")])),
        _ => Reply::ok(page(2, None, vec![course(1, "Go"), course(2, "Zig")])),
    })
    .await;

    let courses = &fixture.console.courses;
    assert_eq!(courses.loading_state(), LoadingState::Idle);

    courses.fetch(Scope::all()).await.unwrap();
    assert_eq!(names(&courses.select_all()), vec!["Go", "Zig"]);
    assert_eq!(courses.count(), 2);
    assert_eq!(courses.loading_state(), LoadingState::Success);

    courses.search("  rust ").await.unwrap();
    assert_eq!(names(&courses.select_all()), vec!["Rust"]);
    assert!(courses.select_by_id(1).is_none());

    let requests = fixture.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/api/catalogue/courses/");
    assert_eq!(requests[1].param("search"), Some("rust"));
    for request in &requests {
        assert_eq!(request.authorization.as_deref(), Some("Token test-token"));
    }
}

#[tokio::test]
async fn test_load_more_upserts_next_page() {
    let fixture = TestFixture::new(|request, base| match request.param("page") {
        Some("2") => Reply::ok(page(
            3,
            None,
            vec![course(2, "Zig 0.12"), course(3, "Rust")],
        )),
        _ => Reply::ok(page(
            3,
            Some(format!("{}/api/catalogue/courses/?page=2", base)),
            vec![course(1, "Go"), course(2, "Zig")],
        )),
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();
    assert!(courses.has_more());

    assert!(courses.load_more().await.unwrap());
    assert_eq!(names(&courses.select_all()), vec!["Go", "Zig 0.12", "Rust"]);
    assert!(!courses.has_more());

    // Nothing left to follow: no request is made.
    assert!(!courses.load_more().await.unwrap());
    assert_eq!(fixture.requests().len(), 2);
}

#[tokio::test]
async fn test_pending_only_while_list_is_empty() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let fixture = TestFixture::new(move |_, _| match counter.fetch_add(1, Ordering::SeqCst) {
        0 | 1 => Reply::ok(page(2, None, vec![course(1, "Go"), course(2, "Zig")])).delayed(150),
        _ => Reply::status(StatusCode::INTERNAL_SERVER_ERROR, json!({"detail": "boom"})),
    })
    .await;

    let courses = &fixture.console.courses;
    let observe = move || async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        courses.loading_state()
    };

    let (result, during) = tokio::join!(courses.fetch(Scope::all()), observe());
    result.unwrap();
    assert_eq!(during, LoadingState::Pending);

    let (result, during) = tokio::join!(courses.refresh(), observe());
    result.unwrap();
    assert_eq!(during, LoadingState::Success);

    // A failed refresh of a populated list keeps its data and state.
    let err = courses.refresh().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(courses.loading_state(), LoadingState::Success);
    assert_eq!(courses.select_all().len(), 2);
}

#[tokio::test]
async fn test_failed_first_load_marks_list_failed() {
    let fixture = TestFixture::new(|_, _| {
        Reply::status(StatusCode::SERVICE_UNAVAILABLE, json!({"detail": "down"}))
    })
    .await;

    let err = fixture.console.tags.fetch(Scope::all()).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 503, .. }));
    assert_eq!(fixture.console.tags.loading_state(), LoadingState::Failed);
    assert!(fixture.console.tags.select_all().is_empty());
}

#[tokio::test]
async fn test_superseded_fresh_load_is_never_applied() {
    let fixture = TestFixture::new(|request, _| match request.param("search") {
        Some("slow") => Reply::ok(page(1, None, vec![course(9, "Stale")])).delayed(300),
        _ => Reply::ok(page(1, None, vec![course(1, "Fresh")])),
    })
    .await;

    let courses = &fixture.console.courses;
    let (stale, fresh) = tokio::join!(courses.search("slow"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        courses.search("fast").await
    });

    assert!(stale.unwrap_err().is_cancelled());
    fresh.unwrap();
    assert_eq!(names(&courses.select_all()), vec!["Fresh"]);
}

#[tokio::test]
async fn test_load_more_discarded_after_fresh_load() {
    let fixture = TestFixture::new(|request, base| {
        match (request.param("page"), request.param("search")) {
            (Some("2"), _) => Reply::ok(page(3, None, vec![course(3, "Late")])).delayed(300),
            (_, Some("fresh")) => Reply::ok(page(1, None, vec![course(5, "Fresh")])),
            _ => Reply::ok(page(
                3,
                Some(format!("{}/api/catalogue/courses/?page=2", base)),
                vec![course(1, "Go"), course(2, "Zig")],
            )),
        }
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();

    let (more, fresh) = tokio::join!(courses.load_more(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        courses.search("fresh").await
    });

    assert!(more.unwrap_err().is_cancelled());
    fresh.unwrap();
    assert_eq!(names(&courses.select_all()), vec!["Fresh"]);
    assert!(!courses.has_more());
    assert_eq!(courses.count(), 1);
}

#[tokio::test]
async fn test_debounced_search_sends_only_last_term() {
    let fixture = TestFixture::new(|_, _| Reply::ok(page(0, None, vec![]))).await;

    let courses = &fixture.console.courses;
    let (first, last) = tokio::join!(courses.search_debounced("ru"), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        courses.search_debounced("rust").await
    });

    assert!(!first.unwrap());
    assert!(last.unwrap());

    let requests = fixture.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("search"), Some("rust"));
}

#[tokio::test]
async fn test_nested_list_stores_breadcrumb() {
    let fixture = TestFixture::new(|request, _| {
        if request.path != "/api/catalogue/modules/" {
            return Reply::not_found();
        }
        Reply::ok(json!({
            "breadcrumb": {"course": {"id": 4, "name": "Rust"}},
            "response": page(1, None, vec![json!({
                "id": 10,
                "name": "Ownership",
                "is_visible": true,
                "created_at": timestamp(1),
                "updated_at": timestamp(1)
            })])
        }))
    })
    .await;

    let modules = &fixture.console.modules;
    modules
        .fetch(Scope::within(crate::models::EntityKind::Module, 4))
        .await
        .unwrap();

    assert_eq!(fixture.requests()[0].param("course"), Some("4"));
    assert_eq!(modules.select_by_id(10).unwrap().name, "Ownership");
    let breadcrumb = modules.breadcrumb().unwrap();
    assert_eq!(breadcrumb.course.unwrap().name, "Rust");
    assert!(breadcrumb.module.is_none());
}

#[tokio::test]
async fn test_topics_scoped_to_lesson() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::POST => Reply::status(StatusCode::CREATED, request.json()),
        _ => Reply::ok(json!({
            "breadcrumb": {
                "course": {"id": 1, "name": "Rust"},
                "module": {"id": 2, "name": "Ownership"},
                "lesson": {"id": 3, "name": "Borrowing"}
            },
            "response": page(1, None, vec![json!({
                "id": 7,
                "title": "Shared references",
                "content": "<p>&T</p>",
                "is_visible": true,
                "topic_questions": [{
                    "id": 1,
                    "question": {"id": 4},
                    "question_content_type": "singlechoicequestion"
                }],
                "created_at": timestamp(1),
                "updated_at": timestamp(1)
            })])
        })),
    })
    .await;

    let topics = &fixture.console.topics;
    topics
        .fetch(Scope::within(crate::models::EntityKind::Topic, 3))
        .await
        .unwrap();

    assert_eq!(fixture.requests()[0].param("lesson"), Some("3"));
    let topic = topics.select_by_id(7).unwrap();
    assert_eq!(
        topic.topic_questions[0].question_content_type,
        QuestionContentType::SingleChoiceQuestion
    );
    let trail: Vec<_> = topics
        .breadcrumb()
        .unwrap()
        .trail()
        .into_iter()
        .map(|(kind, crumb)| format!("{}:{}", kind, crumb.id))
        .collect();
    assert_eq!(trail, vec!["course:1", "module:2", "lesson:3"]);

    let mut data = Map::new();
    data.insert("id".to_string(), json!(8));
    data.insert("title".to_string(), json!("Mutable references"));
    data.insert("created_at".to_string(), json!(timestamp(2)));
    data.insert("updated_at".to_string(), json!(timestamp(2)));
    topics.create(data).await.unwrap();

    let titles: Vec<String> = topics.select_all().into_iter().map(|topic| topic.title).collect();
    assert_eq!(titles, vec!["Shared references", "Mutable references"]);
}

// ==================== WRITES ====================

#[tokio::test]
async fn test_bulk_delete_is_one_request() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::GET => Reply::ok(page(
            3,
            None,
            vec![course(1, "Go"), course(2, "Zig"), course(3, "Rust")],
        )),
        Method::DELETE => Reply::no_content(),
        _ => Reply::not_found(),
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();
    courses.remove_many(&[1, 2]).await.unwrap();

    let deletes = fixture.requests_with(Method::DELETE);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].path, "/api/catalogue/courses/bulk-delete/");
    assert_eq!(deletes[0].param("ids"), Some("1,2"));
    assert_eq!(names(&courses.select_all()), vec!["Rust"]);

    courses.remove(3).await.unwrap();
    assert_eq!(
        fixture.requests_with(Method::DELETE)[1].path,
        "/api/catalogue/courses/3/"
    );
    assert!(courses.select_all().is_empty());
}

#[tokio::test]
async fn test_validation_error_leaves_store_unchanged() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::POST => Reply::status(
            StatusCode::BAD_REQUEST,
            json!({"name": ["This field is required.", "Too short"], "tags": "Unknown tag"}),
        ),
        _ => Reply::ok(page(1, None, vec![course(1, "Go")])),
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();

    let mut data = Map::new();
    data.insert("name".to_string(), json!(""));
    let err = courses.create(data).await.unwrap_err();

    assert!(err.is_validation());
    let messages = err.field_messages();
    assert_eq!(messages["name"], "This field is required..Too short");
    assert_eq!(messages["tags"], "Unknown tag");
    assert_eq!(names(&courses.select_all()), vec!["Go"]);
}

#[tokio::test]
async fn test_update_sends_only_changed_fields() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::PATCH => Reply::ok(course(1, "Go 2")),
        _ => Reply::ok(page(1, None, vec![course(1, "Go")])),
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();
    let original = courses.select_by_id(1).unwrap();

    // Unchanged: no request.
    let same = courses.update(&original, &original.clone()).await.unwrap();
    assert_eq!(same, original);
    assert!(fixture.requests_with(Method::PATCH).is_empty());

    let mut edited = original.clone();
    edited.name = "Go 2".to_string();
    let updated = courses.update(&original, &edited).await.unwrap();
    assert_eq!(updated.name, "Go 2");

    let patches = fixture.requests_with(Method::PATCH);
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].path, "/api/catalogue/courses/1/");
    assert_eq!(patches[0].json(), json!({"name": "Go 2"}));
    assert_eq!(courses.select_by_id(1).unwrap().name, "Go 2");
}

#[tokio::test]
async fn test_course_illustration_uploaded_before_fields() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::PATCH if request.is_multipart() => {
            let mut body = course(1, "Rust");
            body["illustration"] = json!("http://cdn.test/rust.png");
            Reply::ok(body)
        }
        Method::PATCH => {
            let mut body = course(1, "Advanced Rust");
            body["illustration"] = json!("http://cdn.test/rust.png");
            Reply::ok(body)
        }
        _ => Reply::ok(page(1, None, vec![course(1, "Rust")])),
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();
    let original = courses.select_by_id(1).unwrap();

    let mut edited = original.clone();
    edited.name = "Advanced Rust".to_string();
    let edit = CourseEdit::new(edited)
        .with_illustration(Upload::new("rust.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]));

    let saved = courses.update_course(&original, edit).await.unwrap();

    let patches = fixture.requests_with(Method::PATCH);
    assert_eq!(patches.len(), 2);
    assert!(patches[0].is_multipart());
    assert!(patches[0].body_text().contains("filename=\"rust.png\""));
    assert!(!patches[0].body_text().contains("Advanced Rust"));
    assert!(!patches[1].is_multipart());
    assert_eq!(patches[1].json(), json!({"name": "Advanced Rust"}));

    assert_eq!(saved.name, "Advanced Rust");
    let stored = courses.select_by_id(1).unwrap();
    assert_eq!(stored.name, "Advanced Rust");
    assert_eq!(stored.illustration.as_deref(), Some("http://cdn.test/rust.png"));
}

#[tokio::test]
async fn test_update_sets_optional_field_from_none() {
    let lesson = |description: Value| {
        json!({
            "id": 3,
            "name": "Borrowing",
            "description": description,
            "is_visible": true,
            "created_at": timestamp(1),
            "updated_at": timestamp(1)
        })
    };

    let fixture = TestFixture::new(move |request, _| match request.method {
        Method::PATCH => Reply::ok(lesson(request.json()["description"].clone())),
        _ => Reply::ok(page(1, None, vec![lesson(Value::Null)])),
    })
    .await;

    let lessons = &fixture.console.lessons;
    lessons
        .fetch(Scope::within(crate::models::EntityKind::Lesson, 2))
        .await
        .unwrap();
    let original = lessons.select_by_id(3).unwrap();
    assert!(original.description.is_none());

    let mut edited = original.clone();
    edited.description = Some("Shared and mutable references".to_string());
    lessons.update(&original, &edited).await.unwrap();

    let patches = fixture.requests_with(Method::PATCH);
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].path, "/api/catalogue/lessons/3/");
    assert_eq!(
        patches[0].json(),
        json!({"description": "Shared and mutable references"})
    );
    assert_eq!(
        lessons.select_by_id(3).unwrap().description.as_deref(),
        Some("Shared and mutable references")
    );
}

#[tokio::test]
async fn test_failed_field_update_keeps_saved_illustration() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::PATCH if request.is_multipart() => {
            let mut body = course(1, "Rust");
            body["illustration"] = json!("http://cdn.test/rust.png");
            Reply::ok(body)
        }
        Method::PATCH => Reply::status(StatusCode::BAD_REQUEST, json!({"name": ["Too long"]})),
        _ => Reply::ok(page(1, None, vec![course(1, "Rust")])),
    })
    .await;

    let courses = &fixture.console.courses;
    courses.fetch(Scope::all()).await.unwrap();
    let original = courses.select_by_id(1).unwrap();

    let mut edited = original.clone();
    edited.name = "R".repeat(300);
    let edit = CourseEdit::new(edited)
        .with_illustration(Upload::new("rust.png", "image/png", vec![1, 2, 3]));

    let err = courses.update_course(&original, edit).await.unwrap_err();
    assert_eq!(err.field_messages()["name"], "Too long");

    let stored = courses.select_by_id(1).unwrap();
    assert_eq!(stored.name, "Rust");
    assert_eq!(stored.illustration.as_deref(), Some("http://cdn.test/rust.png"));
}

#[tokio::test]
async fn test_illustration_only_edit_is_one_request() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::PATCH => {
            let mut body = course(1, "Rust");
            body["illustration"] = json!("http://cdn.test/new.png");
            Reply::ok(body)
        }
        _ => Reply::not_found(),
    })
    .await;

    let original: crate::models::Course = serde_json::from_value(course(1, "Rust")).unwrap();
    let edit = CourseEdit::new(original.clone())
        .with_illustration(Upload::new("new.png", "image/png", vec![1, 2, 3]));

    let saved = fixture
        .console
        .courses
        .update_course(&original, edit)
        .await
        .unwrap();

    assert_eq!(saved.illustration.as_deref(), Some("http://cdn.test/new.png"));
    assert_eq!(fixture.requests_with(Method::PATCH).len(), 1);
}

#[tokio::test]
async fn test_create_course_is_multipart() {
    let fixture = TestFixture::new(|request, _| match request.method {
        Method::POST => Reply::status(StatusCode::CREATED, course(5, "Haskell")),
        _ => Reply::not_found(),
    })
    .await;

    let created = fixture
        .console
        .courses
        .create_course(NewCourse {
            name: "Haskell".to_string(),
            description: None,
            is_visible: true,
            tags: vec![1, 2],
            illustration: Upload::new("haskell.png", "image/png", vec![7; 16]),
        })
        .await
        .unwrap();

    assert_eq!(created.id, 5);
    assert_eq!(fixture.console.courses.select_all().len(), 1);

    let posts = fixture.requests_with(Method::POST);
    assert_eq!(posts.len(), 1);
    assert!(posts[0].is_multipart());
    let body = posts[0].body_text();
    assert_eq!(body.matches("name=\"tags\"").count(), 2);
    assert!(body.contains("filename=\"haskell.png\""));
    assert!(!body.contains("name=\"description\""));
}

// ==================== QUESTIONS ====================

fn question_page(request: &RecordedRequest, base: &str) -> Reply {
    let content_type = request.param("content_type").unwrap_or_default().to_string();
    match (content_type.as_str(), request.param("page")) {
        ("singlechoicequestion", None) => Reply::ok(page(
            2,
            Some(format!(
                "{}/api/assessment/questions/?content_type=singlechoicequestion&page=2",
                base
            )),
            vec![question(&content_type, 1, "Pick one")],
        )),
        ("singlechoicequestion", Some("2")) => Reply::ok(page(
            2,
            None,
            vec![question(&content_type, 2, "Pick another")],
        )),
        _ => Reply::ok(page(1, None, vec![question(&content_type, 1, "First")])),
    }
}

#[tokio::test]
async fn test_question_fan_out_merges_all_streams() {
    let fixture = TestFixture::new(question_page).await;

    let questions = &fixture.console.questions;
    questions
        .fetch(vec![("search".to_string(), "first".to_string())])
        .await
        .unwrap();

    // Same id in every sub-type, still five distinct records.
    assert_eq!(questions.select_all().len(), 5);
    assert_eq!(questions.count(), 6);
    assert!(questions.has_more());

    let requests = fixture.requests();
    assert_eq!(requests.len(), 5);
    for kind in QuestionContentType::ALL {
        assert!(requests.iter().any(|request| {
            request.param("content_type") == Some(kind.as_str())
                && request.param("search") == Some("first")
        }));
    }

    // Only the stream with a cursor is followed.
    assert!(questions.load_more().await.unwrap());
    let requests = fixture.requests();
    assert_eq!(requests.len(), 6);
    assert_eq!(requests[5].param("page"), Some("2"));
    assert_eq!(questions.select_all().len(), 6);
    assert!(!questions.has_more());
    assert!(questions
        .stream(QuestionContentType::TextOptionQuestion)
        .is_some_and(|cursor| cursor.count == 1));

    assert!(!questions.load_more().await.unwrap());
    assert_eq!(fixture.requests().len(), 6);
}

#[tokio::test]
async fn test_question_fan_out_failure_leaves_store_unmodified() {
    let failing = Arc::new(AtomicBool::new(false));
    let flag = failing.clone();

    let fixture = TestFixture::new(move |request, base| {
        if flag.load(Ordering::SeqCst) && request.param("content_type") == Some("multichoicequestion") {
            return Reply::status(StatusCode::INTERNAL_SERVER_ERROR, json!({"detail": "boom"}));
        }
        question_page(request, base)
    })
    .await;

    let questions = &fixture.console.questions;
    questions.fetch(Vec::new()).await.unwrap();
    let before = questions.select_all();
    assert_eq!(before.len(), 5);

    failing.store(true, Ordering::SeqCst);
    let err = questions
        .fetch(vec![("search".to_string(), "x".to_string())])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(questions.select_all(), before);
    assert_eq!(questions.loading_state(), LoadingState::Success);
}

#[tokio::test]
async fn test_failed_question_fan_out_on_empty_store() {
    let fixture = TestFixture::new(|request, base| {
        if request.param("content_type") == Some("dragdropquestion") {
            return Reply::status(StatusCode::BAD_GATEWAY, json!({"detail": "upstream"}));
        }
        question_page(request, base)
    })
    .await;

    let questions = &fixture.console.questions;
    let err = questions.fetch(Vec::new()).await.unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(questions.loading_state(), LoadingState::Failed);
    assert!(questions.select_all().is_empty());
    assert_eq!(questions.count(), 0);
    assert!(!questions.has_more());
}

#[tokio::test]
async fn test_question_fetch_pages_replaces_streams() {
    let fixture = TestFixture::new(question_page).await;
    let base = fixture.mock.base_url.clone();

    let questions = &fixture.console.questions;
    questions.fetch(Vec::new()).await.unwrap();
    assert_eq!(questions.select_all().len(), 5);

    let url = format!(
        "{}/api/assessment/questions/?content_type=singlechoicequestion&page=2",
        base
    );
    questions
        .fetch_pages(vec![(QuestionContentType::SingleChoiceQuestion, url)])
        .await
        .unwrap();

    let all = questions.select_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Pick another");
    assert_eq!(questions.count(), 2);
    assert!(questions.stream(QuestionContentType::TextOptionQuestion).is_none());
    assert!(!questions.has_more());

    let last = fixture.requests().pop().unwrap();
    assert_eq!(last.param("page"), Some("2"));
    assert_eq!(last.param("content_type"), Some("singlechoicequestion"));
}

#[tokio::test]
async fn test_question_writes_carry_content_type() {
    let fixture = TestFixture::new(|request, base| match request.method {
        Method::PATCH => Reply::ok(question("textoptionquestion", 1, "Renamed")),
        Method::DELETE => Reply::no_content(),
        _ => question_page(request, base),
    })
    .await;

    let questions = &fixture.console.questions;
    questions.fetch(Vec::new()).await.unwrap();

    let text = QuestionKey::new(QuestionContentType::TextOptionQuestion, 1);
    let mut changes = Map::new();
    changes.insert("title".to_string(), json!("Renamed"));
    questions.update_fields(text, changes).await.unwrap();

    let patch = &fixture.requests_with(Method::PATCH)[0];
    assert_eq!(patch.path, "/api/assessment/questions/1/");
    assert_eq!(patch.param("content_type"), Some("textoptionquestion"));
    assert_eq!(questions.select_by_id(&text).unwrap().title, "Renamed");

    let single = QuestionKey::new(QuestionContentType::SingleChoiceQuestion, 1);
    let drag = QuestionKey::new(QuestionContentType::DragDropQuestion, 1);
    questions.remove_many(&[single, drag, text]).await.unwrap();

    let deletes = fixture.requests_with(Method::DELETE);
    assert_eq!(deletes.len(), 3);
    for delete in &deletes {
        assert_eq!(delete.path, "/api/assessment/questions/bulk-delete/");
        assert_eq!(delete.param("ids"), Some("1"));
    }
    assert_eq!(questions.select_all().len(), 2);
    assert!(questions.select_by_id(&single).is_none());
}

// ==================== SESSION ====================

#[tokio::test]
async fn test_current_user_session() {
    let fixture = TestFixture::new(|request, _| {
        let mut user = json!({
            "id": 1,
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "user_type": "staff",
            "is_staff": true
        });
        if request.method == Method::PATCH {
            user["first_name"] = request.json()["first_name"].clone();
        }
        Reply::ok(user)
    })
    .await;

    let console = &fixture.console;
    assert!(console.current_user().is_none());

    let user = console.load_current_user().await.unwrap();
    assert_eq!(user.display_name(), "Ada Lovelace");
    assert_eq!(console.session().loading_state, LoadingState::Success);

    let mut changes = Map::new();
    changes.insert("first_name".to_string(), json!("Augusta"));
    console.update_current_user(changes).await.unwrap();
    assert_eq!(console.current_user().unwrap().first_name, "Augusta");

    let requests = fixture.requests();
    assert!(requests
        .iter()
        .all(|request| request.path == "/api/account/users/current-user/"));
}
