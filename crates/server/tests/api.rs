use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use course_core::Clock;
use course_core::model::{CourseId, LessonId};
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use serde_json::{Value, json};
use server::auth::AuthKeys;
use server::router;
use server::state::AppState;
use services::{CatalogService, ProgressTracker};
use storage::repository::Storage;
use tower::ServiceExt;

const SECRET: &[u8] = b"test-secret";

struct TestApp {
    router: Router,
    course_id: CourseId,
    lessons: Vec<LessonId>,
}

async fn app() -> TestApp {
    let storage = Storage::in_memory();
    let catalog = CatalogService::new(Clock::default(), Arc::clone(&storage.catalog));
    let course_id = catalog
        .create_course("HTTP".to_string(), None)
        .await
        .unwrap();
    let module_id = catalog
        .add_module(course_id, "Basics".to_string(), 0)
        .await
        .unwrap();
    let mut lessons = Vec::new();
    for (position, title) in ["Requests", "Responses"].into_iter().enumerate() {
        lessons.push(
            catalog
                .add_lesson(module_id, title.to_string(), position as u32)
                .await
                .unwrap(),
        );
    }

    let tracker = ProgressTracker::from_storage(Clock::default(), &storage);
    let state = AppState::new(tracker, AuthKeys::from_secret(SECRET));
    TestApp {
        router: router(state),
        course_id,
        lessons,
    }
}

fn token_for(student: u64, secret: &[u8]) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": student, "exp": get_current_timestamp() + 3_600 }),
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = app().await;
    let (status, body) = send(&app.router, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": "ok" }));
}

#[tokio::test]
async fn missing_or_forged_token_is_unauthorized() {
    let app = app().await;
    let uri = format!("/api/progress/courses/{}", app.course_id);

    let (status, body) = send(&app.router, request("GET", &uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let forged = token_for(1, b"someone-else");
    let (status, _) = send(&app.router, request("GET", &uri, Some(&forged), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn start_course_creates_once() {
    let app = app().await;
    let token = token_for(1, SECRET);
    let body = json!({ "courseId": app.course_id.value() });

    let (status, first) = send(
        &app.router,
        request("POST", "/api/progress/start", Some(&token), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["wasCreated"], json!(true));
    assert_eq!(first["data"]["status"], json!("IN_PROGRESS"));

    let (_, second) = send(
        &app.router,
        request("POST", "/api/progress/start", Some(&token), Some(body)),
    )
    .await;
    assert_eq!(second["data"]["wasCreated"], json!(false));
    assert_eq!(second["data"]["progressId"], first["data"]["progressId"]);
}

#[tokio::test]
async fn start_course_rejects_unknown_course_and_bad_body() {
    let app = app().await;
    let token = token_for(1, SECRET);

    let (status, body) = send(
        &app.router,
        request(
            "POST",
            "/api/progress/start",
            Some(&token),
            Some(json!({ "courseId": 9_999 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("course 9999 not found"));

    let (status, body) = send(
        &app.router,
        request(
            "POST",
            "/api/progress/start",
            Some(&token),
            Some(json!({ "course": "nope" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn completing_every_lesson_completes_the_course() {
    let app = app().await;
    let token = token_for(7, SECRET);

    let mut statuses = Vec::new();
    for lesson in &app.lessons {
        let uri = format!("/api/progress/lessons/{lesson}/complete");
        let (status, body) = send(&app.router, request("POST", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["courseId"], json!(app.course_id.value()));
        statuses.push(body["data"]["status"].clone());
    }
    assert_eq!(statuses, vec![json!("IN_PROGRESS"), json!("COMPLETED")]);

    let uri = format!("/api/progress/courses/{}", app.course_id);
    let (status, body) = send(&app.router, request("GET", &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("COMPLETED"));
    let expected: Vec<u64> = app.lessons.iter().map(LessonId::value).collect();
    assert_eq!(body["data"]["completedLessonIds"], json!(expected));
}

#[tokio::test]
async fn progress_is_scoped_to_the_token_subject() {
    let app = app().await;
    let alice = token_for(1, SECRET);
    let bob = token_for(2, SECRET);

    let uri = format!("/api/progress/lessons/{}/complete", app.lessons[0]);
    send(&app.router, request("POST", &uri, Some(&alice), None)).await;

    let uri = format!("/api/progress/courses/{}", app.course_id);
    let (status, body) = send(&app.router, request("GET", &uri, Some(&bob), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("NOT_STARTED"));
    assert_eq!(body["data"]["completedLessonIds"], json!([]));
}

#[tokio::test]
async fn unknown_lesson_is_not_found() {
    let app = app().await;
    let token = token_for(1, SECRET);

    let (status, body) = send(
        &app.router,
        request("POST", "/api/progress/lessons/424242/complete", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(
        &app.router,
        request("POST", "/api/progress/lessons/abc/complete", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
