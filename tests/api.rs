mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{app, send};

fn project_payload(name: &str) -> Value {
    json!({ "name": name, "description": "Retainer work" })
}

async fn create_project(router: &axum::Router, name: &str) -> String {
    let (status, body) = send(router, "POST", "/api/v1/projects", Some(project_payload(name))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn create_time_frame(router: &axum::Router, project_id: &str) -> String {
    let (status, body) = send(
        router,
        "POST",
        "/api/v1/time-frames",
        Some(json!({
            "project_id": project_id,
            "name": "March",
            "start_date": "2024-03-01",
            "end_date": "2024-03-10",
            "hourly_rate": 80,
            "currency": "usd",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_project_returns_envelope_and_resource() {
    let (router, _) = app();

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/projects",
        Some(project_payload("Client Portal")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], 201);
    assert_eq!(body["message"], "Project Created");
    assert_eq!(body["data"]["type"], "project");
    assert_eq!(body["data"]["attributes"]["slug"], "client-portal");
    assert_eq!(body["data"]["attributes"]["additionalProperties"], json!({}));

    let id = body["data"]["id"].as_str().unwrap();
    assert_eq!(body["data"]["links"]["self"], format!("/api/v1/projects/{id}"));
}

#[tokio::test]
async fn project_is_addressable_by_slug() {
    let (router, _) = app();
    let id = create_project(&router, "Client Portal").await;

    let (status, body) = send(&router, "GET", "/api/v1/projects/client-portal", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Project Retrieved Successfully");
    assert_eq!(body["data"]["id"], id);
}

#[tokio::test]
async fn list_reports_pagination_meta_and_links() {
    let (router, _) = app();
    for name in ["Alpha", "Beta", "Gamma"] {
        create_project(&router, name).await;
    }

    let (status, body) = send(&router, "GET", "/api/v1/projects?page[size]=2", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["last_page"], 2);
    assert_eq!(body["meta"]["current_page"], 1);
    assert_eq!(body["meta"]["path"], "/api/v1/projects");
    assert!(body["links"]["prev"].is_null());
    assert_eq!(
        body["links"]["next"],
        "/api/v1/projects?page%5Bnumber%5D=2&page%5Bsize%5D=2"
    );
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let (router, _) = app();

    let (status, body) = send(&router, "GET", "/api/v1/projects/nowhere", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["message"], "Project not found");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn malformed_time_frame_id_is_not_found() {
    let (router, _) = app();

    let (status, body) = send(&router, "GET", "/api/v1/time-frames/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "TimeFrame not found");
}

#[tokio::test]
async fn validation_failures_name_the_field() {
    let (router, _) = app();

    let (status, body) = send(&router, "POST", "/api/v1/projects", Some(json!({ "name": "  " }))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], 422);
    assert!(body["data"]["errors"]["name"].is_array());
}

#[tokio::test]
async fn reversed_time_frame_dates_are_rejected() {
    let (router, _) = app();
    let project_id = create_project(&router, "Acme").await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/time-frames",
        Some(json!({
            "project_id": project_id,
            "start_date": "2024-03-10",
            "end_date": "2024-03-01",
            "hourly_rate": 80,
            "currency": "USD",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["errors"]["end_date"].is_array());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (router, _) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/projects")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\":"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (router, _) = app();
    let request = Request::builder()
        .uri("/api/v1/projects")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn time_frame_carries_entries_and_derived_figures() {
    let (router, _) = app();
    let project_id = create_project(&router, "Acme").await;
    let frame_id = create_time_frame(&router, &project_id).await;

    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/time-entries",
        Some(json!({
            "time_frame_id": frame_id,
            "start_time": "2024-03-02T09:00:00Z",
            "end_time": "2024-03-02T11:00:00Z",
            "description": "Kickoff",
            "billable": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        "GET",
        &format!("/api/v1/time-frames/{frame_id}?include=timeEntries"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let attributes = &body["data"]["attributes"];
    assert_eq!(attributes["currency"], "USD");
    assert_eq!(attributes["hourlyRate"], 80.0);
    assert_eq!(attributes["periodDurationInDays"], 9);
    assert_eq!(attributes["totalRecordedDurationInMinutes"], 120);
    assert!(attributes["totalBillable"].as_str().unwrap().starts_with("USD"));

    let entries = body["data"]["includes"]["timeEntries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["attributes"]["workDay"], "2024-03-02");
    assert_eq!(
        body["data"]["relationships"]["project"]["data"]["id"],
        project_id
    );
}

#[tokio::test]
async fn time_entry_links_back_to_its_frame() {
    let (router, _) = app();
    let project_id = create_project(&router, "Acme").await;
    let frame_id = create_time_frame(&router, &project_id).await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/time-entries",
        Some(json!({
            "time_frame_id": frame_id,
            "start_time": "2024-03-02T09:00:00+02:00",
            "billable": false,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Time Entry Created");
    let entry = &body["data"];
    assert_eq!(entry["attributes"]["startTime"], "2024-03-02T07:00:00Z");
    assert!(entry["attributes"]["endTime"].is_null());
    assert_eq!(
        entry["relationships"]["timeFrame"]["links"]["self"],
        format!("/api/v1/time-frames/{frame_id}")
    );
}

#[tokio::test]
async fn cached_collection_is_evicted_by_a_write() {
    let (router, repos) = app();
    create_project(&router, "Alpha").await;

    send(&router, "GET", "/api/v1/projects?sort=name", None).await;
    let after_first = repos.reads();
    let (_, body) = send(&router, "GET", "/api/v1/projects?sort=name", None).await;
    assert_eq!(repos.reads(), after_first);
    assert_eq!(body["meta"]["total"], 1);

    create_project(&router, "Beta").await;
    let (_, body) = send(&router, "GET", "/api/v1/projects?sort=name", None).await;
    assert!(repos.reads() > after_first);
    assert_eq!(body["meta"]["total"], 2);
}

#[tokio::test]
async fn deleted_project_is_gone() {
    let (router, _) = app();
    let id = create_project(&router, "Alpha").await;
    send(&router, "GET", &format!("/api/v1/projects/{id}"), None).await;

    let (status, body) = send(&router, "DELETE", &format!("/api/v1/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Project deleted successfully");
    assert!(body.get("data").is_none());

    let (status, _) = send(&router, "GET", &format!("/api/v1/projects/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_time_frame_is_gone_and_project_survives() {
    let (router, _) = app();
    let project_id = create_project(&router, "Acme").await;
    let frame_id = create_time_frame(&router, &project_id).await;
    send(&router, "GET", &format!("/api/v1/time-frames/{frame_id}"), None).await;

    let (status, body) = send(
        &router,
        "DELETE",
        &format!("/api/v1/time-frames/{frame_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "TimeFrame deleted successfully");

    let (status, _) = send(&router, "GET", &format!("/api/v1/time-frames/{frame_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, "GET", &format!("/api/v1/projects/{project_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn time_frame_route_does_not_delete_projects() {
    let (router, _) = app();
    let project_id = create_project(&router, "Acme").await;

    let (status, body) = send(
        &router,
        "DELETE",
        &format!("/api/v1/time-frames/{project_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "TimeFrame not found");

    let (status, _) = send(&router, "GET", &format!("/api/v1/projects/{project_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn deleted_time_entry_is_gone() {
    let (router, _) = app();
    let project_id = create_project(&router, "Acme").await;
    let frame_id = create_time_frame(&router, &project_id).await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/time-entries",
        Some(json!({
            "time_frame_id": frame_id,
            "start_time": "2024-03-02T09:00:00Z",
            "end_time": "2024-03-02T10:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let entry_id = body["data"]["id"].as_str().unwrap().to_string();
    send(&router, "GET", &format!("/api/v1/time-entries/{entry_id}"), None).await;

    let (status, body) = send(
        &router,
        "DELETE",
        &format!("/api/v1/time-entries/{entry_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Time Entry deleted successfully");

    let (status, _) = send(&router, "GET", &format!("/api/v1/time-entries/{entry_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, "GET", &format!("/api/v1/time-frames/{frame_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn preferences_round_trip_through_the_singleton_route() {
    let (router, _) = app();

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/preferences",
        Some(json!({
            "hourly_rate": 95.5,
            "currency": "eur",
            "week_start": "monday",
            "additional_properties": { "theme": "dark" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Preferences Created");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        "PUT",
        &format!("/api/v1/preferences/{id}"),
        Some(json!({
            "hourly_rate": 100,
            "currency": "EUR",
            "week_start": "sunday",
            "additional_properties": {},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Preference Updated");

    let (status, body) = send(&router, "GET", "/api/v1/preferences", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);
    assert_eq!(body["data"]["attributes"]["hourlyRate"], 100.0);
    assert_eq!(body["data"]["links"]["self"], "/api/v1/preferences");
}
