mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::TestApp;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session={token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn lecture_body() -> Value {
    json!({
        "topic": "Optics",
        "subject": "Physics",
        "date": "2026-03-02",
        "time": "10:00",
        "duration": 60,
    })
}

#[tokio::test]
async fn requests_without_a_known_token_are_unauthorized() {
    let app = TestApp::new();
    let router = app.router();

    let (status, body) = call(&router, Method::GET, "/lectures", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let (status, _) = call(&router, Method::GET, "/lectures", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.token_for(app.teacher).await;
    let (status, _) = call(&router, Method::GET, "/lectures", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    app.store.revoke_token(&token).await;
    let (status, _) = call(&router, Method::GET, "/lectures", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_tokens_are_accepted() {
    let app = TestApp::new();
    let router = app.router();
    let token = app.token_for(app.student).await;

    let request = Request::builder()
        .uri("/lectures")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn lecture_lifecycle_over_http() {
    let app = TestApp::new();
    let router = app.router();
    let teacher = app.token_for(app.teacher).await;

    let (status, body) =
        call(&router, Method::POST, "/lectures", Some(&teacher), Some(lecture_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Class created successfully");
    assert_eq!(body["lecture"]["status"], "pending");
    assert_eq!(body["lecture"]["time"], "10:00");
    let id = body["lecture"]["id"].as_str().unwrap().to_string();

    let (status, body) =
        call(&router, Method::POST, "/lectures", Some(&teacher), Some(lecture_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        "A pending class for this topic, subject, and time already exists."
    );

    let (status, body) = call(
        &router,
        Method::PATCH,
        &format!("/lectures/{id}"),
        Some(&teacher),
        Some(json!({ "description": "Bring a prism" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lecture"]["description"], "Bring a prism");

    let (status, body) = call(
        &router,
        Method::PATCH,
        &format!("/lectures/{id}/status"),
        Some(&teacher),
        Some(json!({ "status": "live" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lecture"]["status"], "live");

    let (status, body) = call(
        &router,
        Method::PATCH,
        &format!("/lectures/{id}/status"),
        Some(&teacher),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = call(&router, Method::GET, "/lectures", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) =
        call(&router, Method::DELETE, &format!("/lectures/{id}"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, body) =
        call(&router, Method::DELETE, &format!("/lectures/{id}"), Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Lecture not found");
}

#[tokio::test]
async fn malformed_lecture_requests_are_bad_requests() {
    let app = TestApp::new();
    let router = app.router();
    let teacher = app.token_for(app.teacher).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/lectures",
        Some(&teacher),
        Some(json!({ "topic": "Optics" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "All fields (topic, subject, date, time, duration) are required"
    );

    let mut bad_date = lecture_body();
    bad_date["date"] = json!("02/03/2026");
    let (status, _) = call(&router, Method::POST, "/lectures", Some(&teacher), Some(bad_date)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &router,
        Method::PATCH,
        "/lectures/not-a-uuid/status",
        Some(&teacher),
        Some(json!({ "status": "live" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let lecture = app.schedule("Optics").await;
    let (status, body) = call(
        &router,
        Method::PATCH,
        &format!("/lectures/{}/status", lecture.id),
        Some(&teacher),
        Some(json!({ "status": "archived" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Status required"));
}

#[tokio::test]
async fn students_are_forbidden_from_teacher_routes() {
    let app = TestApp::new();
    let router = app.router();
    let student = app.token_for(app.student).await;

    let (status, body) =
        call(&router, Method::POST, "/lectures", Some(&student), Some(lecture_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: Access allowed only for teachers");
}

#[tokio::test]
async fn question_routes_end_to_end() {
    let app = TestApp::new();
    let router = app.router();
    let lecture = app.schedule("Optics").await;
    let student = app.token_for(app.student).await;
    let teacher = app.token_for(app.teacher).await;
    let mut room = app.listener(lecture.id);

    let (status, body) = call(
        &router,
        Method::POST,
        "/questions",
        Some(&student),
        Some(json!({ "question": "What is a photon?", "lecture_id": lecture.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["question"]["status"], "unanswered");
    let id = body["question"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &router,
        Method::POST,
        "/questions",
        Some(&student),
        Some(json!({ "text": "what is a PHOTON?", "lecture_id": lecture.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Question already exists in this lecture.");

    let (status, body) = call(
        &router,
        Method::PATCH,
        &format!("/questions/{id}/status"),
        Some(&teacher),
        Some(json!({ "status": "answered", "answer": "A quantum of light." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"]["status"], "answered");
    assert!(body["question"]["answered_at"].is_string());

    let (status, _) = call(
        &router,
        Method::PATCH,
        &format!("/questions/{id}"),
        Some(&teacher),
        Some(json!({ "is_important": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let other = app.ask(lecture.id, "What is a wave?").await;
    let (status, body) = call(
        &router,
        Method::PATCH,
        &format!("/questions/{}", other.id),
        Some(&teacher),
        Some(json!({ "text": "what is a photon?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Question already exists in this lecture.");

    let (status, body) = call(
        &router,
        Method::GET,
        &format!("/questions?lecture_id={}", lecture.id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["questions"][1]["is_important"], true);

    let (status, _) = call(
        &router,
        Method::PATCH,
        &format!("/questions/{id}/invalidate"),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(
        &router,
        Method::GET,
        &format!("/questions?lecture_id={}", lecture.id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(body["count"], 1);

    let (status, _) = call(&router, Method::GET, "/questions", Some(&student), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let kinds: Vec<&'static str> = common::drain(&mut room)
        .into_iter()
        .filter_map(|m| m.into_room_event())
        .map(|e| e.kind.as_str())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "question_created",
            "question_answered",
            "question_starred",
            "question_created",
            "question_deleted",
        ]
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let router = app.router();

    let (status, body) = call(&router, Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/lectures"].is_object());
    assert!(body["paths"]["/questions/{id}/invalidate"].is_object());
}

#[tokio::test]
async fn generated_openapi_file_matches_the_served_document() {
    let app = TestApp::new();
    let router = app.router();

    let (_, served) = call(&router, Method::GET, "/api-docs/openapi.json", None, None).await;
    let generated: Value =
        serde_json::from_str(&api_lib::web::ApiDoc::to_pretty_json().unwrap()).unwrap();
    assert_eq!(served, generated);
    for path in [
        "/lectures",
        "/lectures/{id}",
        "/lectures/{id}/status",
        "/questions",
        "/questions/{id}",
        "/questions/{id}/status",
        "/questions/{id}/invalidate",
    ] {
        assert!(generated["paths"][path].is_object(), "{path}");
    }
}
