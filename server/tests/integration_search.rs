use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use qpsearch::EngineConfig;
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "s3cret";

fn build_tiny_feed(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("feed.jsonl");
    let lines = [
        r#"{"op": "insert", "record": {"id": 1, "course_code": "CS101", "course_name": "Data Structures", "year": 2023, "exam": "endsem", "approved": true, "created_at": "2024-01-01T00:00:00Z"}}"#,
        r#"{"op": "insert", "record": {"id": 2, "course_code": "CS102", "course_name": "Algorithms", "year": 2023, "exam": "midsem", "approved": true, "created_at": "2024-01-02T00:00:00Z"}}"#,
        r#"{"op": "insert", "record": {"id": 3, "course_code": "CS101", "course_name": "Data Structures", "year": 2024, "approved": false, "created_at": "2024-02-01T00:00:00Z"}}"#,
    ];
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn app() -> Router {
    let dir = tempdir().unwrap();
    let feed = build_tiny_feed(dir.path());
    let engine = server::load_engine(Some(feed.as_path()), EngineConfig::default()).unwrap();
    server::build_app(Arc::new(engine), Some(TOKEN.into()))
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).header("X-ADMIN-TOKEN", TOKEN).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("X-ADMIN-TOKEN", TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn result_ids(json: &Value) -> Vec<u64> {
    json["results"].as_array().unwrap().iter().map(|r| r["id"].as_u64().unwrap()).collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (status, json) = call(app(), get("/search?query=data%20structures")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result_ids(&json), vec![1]);
    assert_eq!(json["results"][0]["course_code"], "CS101");
}

#[tokio::test]
async fn search_prefix_and_exam_filter() {
    let (_, json) = call(app(), get("/search?query=algo")).await;
    assert_eq!(result_ids(&json), vec![2]);

    let (_, json) = call(app(), get("/search?query=algo&exam=endsem")).await;
    assert!(!result_ids(&json).contains(&2));

    let (status, _) = call(app(), get("/search?query=algo&exam=viva")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_query_is_bad_request() {
    let resp = app().oneshot(get("/search?query=")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"course is required");
}

#[tokio::test]
async fn admin_routes_require_token() {
    let req = Request::get("/admin/unapproved").body(Body::empty()).unwrap();
    let (status, _) = call(app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = call(app(), get("/admin/unapproved")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["id"], 3);
}

#[tokio::test]
async fn similar_lists_duplicates() {
    let (status, json) = call(app(), get("/admin/similar?course_code=CS101")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);

    let (_, json) = call(app(), get("/admin/similar?course_code=CS101&year=2024")).await;
    assert_eq!(json["records"][0]["id"], 3);

    let (_, json) = call(app(), get("/admin/similar?course_code=ZZ999")).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn approve_then_delete_flow() {
    let app = app();

    let (status, json) = call(
        app.clone(),
        post("/admin/edit", serde_json::json!({ "id": 3, "approved": true, "replace": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["approved"], true);

    let (_, json) = call(app.clone(), get("/search?query=data%20structures")).await;
    assert_eq!(result_ids(&json), vec![3]);

    let (status, _) = call(app.clone(), post("/admin/delete", serde_json::json!({ "id": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = call(app.clone(), get("/search?query=data%20structures")).await;
    assert!(result_ids(&json).is_empty());

    let (_, json) = call(app.clone(), get("/admin/trash")).await;
    assert_eq!(json["count"], 2);

    let (status, _) = call(app, post("/admin/delete", serde_json::json!({ "id": 99 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restored_record_needs_reapproval() {
    let app = app();
    let (status, _) = call(app.clone(), post("/admin/delete", serde_json::json!({ "id": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, json) = call(app.clone(), post("/admin/restore", serde_json::json!({ "id": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["approved"], false);
    let (_, json) = call(app, get("/search?query=algo")).await;
    assert!(result_ids(&json).is_empty());
}

#[tokio::test]
async fn record_endpoint_hides_unapproved() {
    let (status, json) = call(app(), get("/record/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["course_name"], "Data Structures");
    let (status, _) = call(app(), get("/record/3")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
