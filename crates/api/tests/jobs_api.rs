//! Integration tests for `/api/v1/jobs`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_empty, post_json};
use prospector_core::job::JobType;
use serde_json::json;

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enqueue_without_body_creates_pending_manual_job() {
    let test = common::build_test_app();

    let response = post_empty(&test.app, "/api/v1/jobs/score").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let job = &body_json(response).await["data"];
    assert_eq!(job["job_type"], "score");
    assert_eq!(job["status"], "pending");
    assert_eq!(job["origin"], "manual");
    assert_eq!(job["target_ids"], json!([]));
}

#[tokio::test]
async fn enqueue_discover_with_scope() {
    let test = common::build_test_app();

    let response = post_json(
        &test.app,
        "/api/v1/jobs/discover",
        json!({ "locations": ["uk", "us", "uk"], "categories": ["saas"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let job = &body_json(response).await["data"];
    assert_eq!(job["parameters"]["locations"], json!(["uk", "us"]));
    assert_eq!(job["parameters"]["categories"], json!(["saas"]));
}

#[tokio::test]
async fn enqueue_dedups_target_ids() {
    let test = common::build_test_app();

    let response = post_json(
        &test.app,
        "/api/v1/jobs/enrich",
        json!({ "target_ids": [4, 2, 4] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["target_ids"], json!([4, 2]));
}

#[tokio::test]
async fn unknown_job_type_returns_400() {
    let test = common::build_test_app();

    let response = post_empty(&test.app, "/api/v1/jobs/teleport").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_body_field_returns_400() {
    let test = common::build_test_app();

    let response = post_json(&test.app, "/api/v1/jobs/score", json!({ "priority": 9 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn reprocess_requires_targets() {
    let test = common::build_test_app();

    let response = post_json(&test.app, "/api/v1/jobs/score", json!({ "reprocess": true })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        &test.app,
        "/api/v1/jobs/score",
        json!({ "reprocess": true, "target_ids": [1] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn scope_on_non_discover_job_returns_400() {
    let test = common::build_test_app();

    let response = post_json(
        &test.app,
        "/api/v1/jobs/enrich",
        json!({ "locations": ["us"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_location_returns_400() {
    let test = common::build_test_app();

    let response = post_json(
        &test.app,
        "/api/v1/jobs/discover",
        json!({ "locations": ["atlantis"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_returns_most_recent_first_and_filters_by_type() {
    let test = common::build_test_app();
    for job_type in ["score", "enrich", "score"] {
        post_empty(&test.app, &format!("/api/v1/jobs/{job_type}")).await;
    }

    let json = body_json(get(&test.app, "/api/v1/jobs").await).await;
    let ids: Vec<i64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let json = body_json(get(&test.app, "/api/v1/jobs?job_type=score").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn get_job_by_id() {
    let test = common::build_test_app();
    post_empty(&test.app, "/api/v1/jobs/verify").await;

    let response = get(&test.app, "/api/v1/jobs/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["job_type"], "verify");
}

#[tokio::test]
async fn get_missing_job_returns_404() {
    let test = common::build_test_app();

    let response = get(&test.app, "/api/v1/jobs/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Job with id 999 not found");
}

#[tokio::test]
async fn malformed_job_id_returns_json_400() {
    let test = common::build_test_app();

    for path in ["/api/v1/jobs/abc", "/api/v1/jobs/9999999999999999999999"] {
        let response = get(&test.app, path).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }

    let response = post_empty(&test.app, "/api/v1/jobs/abc/retry").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["error"], "Invalid job id: 'abc'");
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retry_of_pending_job_returns_409() {
    let test = common::build_test_app();
    post_empty(&test.app, "/api/v1/jobs/score").await;

    let response = post_empty(&test.app, "/api/v1/jobs/1/retry").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn retry_of_failed_job_enqueues_a_copy() {
    let test = common::build_test_app();
    post_json(&test.app, "/api/v1/jobs/draft", json!({ "target_ids": [7] })).await;

    let queue = &test.services.queue;
    let job = queue.claim(JobType::Draft).await.unwrap().unwrap();
    queue.fail(&job, "drafting service down", None).await.unwrap();

    let response = post_empty(&test.app, &format!("/api/v1/jobs/{}/retry", job.id)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let retry = &body_json(response).await["data"];
    assert_eq!(retry["origin"], "retry");
    assert_eq!(retry["retry_of_job_id"], job.id);
    assert_eq!(retry["target_ids"], json!([7]));
    assert_eq!(retry["status"], "pending");

    let original = body_json(get(&test.app, &format!("/api/v1/jobs/{}", job.id)).await).await;
    assert_eq!(original["data"]["status"], "failed");
    assert_eq!(original["data"]["error_message"], "drafting service down");
}
