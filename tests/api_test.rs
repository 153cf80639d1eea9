mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use flock::{api::create_app, domain::Role};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> anyhow::Result<(Router, Arc<flock::service::ServiceContext>)> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    let app = create_app(context.clone(), Arc::new(settings));
    Ok((app, context))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Vec<u8>, axum::http::HeaderMap)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec(), headers))
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Value)> {
    let (status, bytes, _) = send(app, method, uri, token, body).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn setup_and_login(app: &Router) -> anyhow::Result<String> {
    let (status, _) = send_json(
        app,
        Method::POST,
        "/setup",
        None,
        Some(json!({
            "first_name": "Church",
            "last_name": "Admin",
            "username": "admin",
            "password": "admin12345"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    login(app, "admin", "admin12345").await
}

async fn login(app: &Router, username: &str, password: &str) -> anyhow::Result<String> {
    let (status, body) = send_json(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

async fn create_person(app: &Router, token: &str, body: Value) -> anyhow::Result<Value> {
    let (status, person) = send_json(app, Method::POST, "/api/people", Some(token), Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", person);
    Ok(person)
}

#[tokio::test]
async fn test_health_and_setup_status() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send_json(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (_, body) = send_json(&app, Method::GET, "/setup", None, None).await?;
    assert_eq!(body["needs_setup"], true);

    setup_and_login(&app).await?;
    let (_, body) = send_json(&app, Method::GET, "/setup", None, None).await?;
    assert_eq!(body["needs_setup"], false);

    Ok(())
}

#[tokio::test]
async fn test_api_requires_a_session() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send_json(&app, Method::GET, "/api/people", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send_json(&app, Method::GET, "/api/people", Some("not-a-token"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_create_and_list_people_with_filters() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let token = setup_and_login(&app).await?;

    create_person(&app, &token, json!({ "first_name": "Maria", "last_name": "Santos", "status": "ACTIVE" })).await?;
    create_person(&app, &token, json!({ "first_name": "Jose", "last_name": "Rizal", "status": "INACTIVE" })).await?;
    create_person(&app, &token, json!({ "first_name": "Andres", "last_name": "Bonifacio", "status": "ACTIVE" })).await?;

    let (status, page) = send_json(
        &app,
        Method::GET,
        "/api/people?status=inactive",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["last_name"], "Rizal");
    // Usernames are derived when not given
    assert_eq!(page["items"][0]["username"], "jose.rizal");

    let (_, page) = send_json(
        &app,
        Method::GET,
        "/api/people?search=san&page_size=10",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["first_name"], "Maria");

    let (_, page) = send_json(
        &app,
        Method::GET,
        "/api/people?role=MEMBER&sort=last_name&order=desc&page_size=1&page=2",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"][0]["last_name"], "Rizal");

    let (status, body) = send_json(
        &app,
        Method::GET,
        "/api/people?sort=shoe_size",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unknown sort field: shoe_size");

    Ok(())
}

#[tokio::test]
async fn test_bulk_delete_and_export() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let token = setup_and_login(&app).await?;

    let a = create_person(&app, &token, json!({ "first_name": "Ana", "last_name": "Cruz", "member_id": "M-1" })).await?;
    let b = create_person(&app, &token, json!({ "first_name": "Ben", "last_name": "Reyes", "member_id": "M-2" })).await?;

    let (status, bytes, headers) = send(
        &app,
        Method::POST,
        "/api/people/export",
        Some(&token),
        Some(json!({
            "format": "csv",
            "ids": [a["id"], b["id"]],
            "columns": ["member_id", "full_name"]
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/csv"));
    let disposition = headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(disposition.starts_with("attachment; filename=\"people_"));
    assert!(disposition.ends_with(".csv\""));

    let text = String::from_utf8(bytes)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["Member ID,Full Name", "M-1,Ana Cruz", "M-2,Ben Reyes"]);

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/people/export",
        Some(&token),
        Some(json!({ "format": "pdf", "ids": [] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No records selected for export");

    let (status, result) = send_json(
        &app,
        Method::POST,
        "/api/people/bulk-delete",
        Some(&token),
        Some(json!({ "ids": [a["id"], b["id"]] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["deleted"].as_array().map(Vec::len), Some(2));
    assert_eq!(result["failed"].as_array().map(Vec::len), Some(0));

    let (status, _) = send_json(
        &app,
        Method::GET,
        &format!("/api/people/{}", a["id"].as_str().unwrap_or_default()),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_import_blocks_duplicates() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let token = setup_and_login(&app).await?;

    let csv = "First Name,Last Name,Email\nJohn,Doe,john@example.com\nJane,Doe,\njohn,doe,\n";

    let (status, preview) = send_json(
        &app,
        Method::POST,
        "/api/people/import/preview",
        Some(&token),
        Some(json!({ "csv": csv })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["can_import"], false);
    assert_eq!(preview["duplicates"]["name_duplicates"], json!([2]));

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/people/import",
        Some(&token),
        Some(json!({ "csv": csv })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Import blocked: 1 duplicate rows");

    let clean = "First Name,Last Name\nJohn,Doe\nJane,Doe\n";
    let (status, result) = send_json(
        &app,
        Method::POST,
        "/api/people/import",
        Some(&token),
        Some(json!({ "csv": clean })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["created"].as_array().map(Vec::len), Some(2));

    Ok(())
}

#[tokio::test]
async fn test_coordinator_cannot_reach_admin_routes() -> anyhow::Result<()> {
    let (app, context) = test_app().await?;
    setup_and_login(&app).await?;
    common::create_user(&context, "coord.cruz", Role::Coordinator, "cluster123").await?;
    common::create_user(&context, "member.lee", Role::Member, "member1234").await?;

    let token = login(&app, "coord.cruz", "cluster123").await?;
    let (status, _) = send_json(&app, Method::GET, "/api/people", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    for uri in ["/api/branches", "/api/admin/audit-logs", "/api/admin/locked-accounts"] {
        let (status, body) = send_json(&app, Method::GET, uri, Some(&token), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "forbidden");
    }

    // Members can sign in but are kept out of the console
    let token = login(&app, "member.lee", "member1234").await?;
    let (status, _) = send_json(&app, Method::GET, "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, Method::GET, "/api/people", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn test_coordinator_cannot_grant_admin() -> anyhow::Result<()> {
    let (app, context) = test_app().await?;
    let admin_token = setup_and_login(&app).await?;
    let coordinator = common::create_user(&context, "coord.reyes", Role::Coordinator, "cluster123").await?;
    let token = login(&app, "coord.reyes", "cluster123").await?;

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/api/people",
        Some(&token),
        Some(json!({
            "first_name": "Shadow",
            "last_name": "Admin",
            "username": "shadow.admin",
            "role": "ADMIN",
            "password": "takeover123"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A password alone is also an administrator's call
    let (status, _) = send_json(
        &app,
        Method::POST,
        "/api/people",
        Some(&token),
        Some(json!({ "first_name": "New", "last_name": "Member", "password": "member1234" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let own = format!("/api/people/{}", coordinator.id);
    let (status, _) = send_json(&app, Method::PUT, &own, Some(&token), Some(json!({ "role": "ADMIN" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Ordinary records are still theirs to manage
    let member = create_person(&app, &token, json!({ "first_name": "Lia", "last_name": "Dee" })).await?;
    assert_eq!(member["role"], "MEMBER");

    let (_, me) = send_json(&app, Method::GET, "/auth/me", Some(&token), None).await?;
    assert_eq!(me["role"], "COORDINATOR");

    // Administrators can still promote
    let (status, promoted) =
        send_json(&app, Method::PUT, &own, Some(&admin_token), Some(json!({ "role": "ADMIN" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "ADMIN");

    Ok(())
}

#[tokio::test]
async fn test_admin_approves_a_reset_over_http() -> anyhow::Result<()> {
    let (app, context) = test_app().await?;
    let token = setup_and_login(&app).await?;
    common::create_user(&context, "coord.dizon", Role::Coordinator, "cluster123").await?;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/auth/password-reset",
        None,
        Some(json!({ "username": "coord.dizon", "reason": "Lost phone" })),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let generic = body["message"].clone();

    // Same answer for an account that does not exist
    let (status, body) = send_json(
        &app,
        Method::POST,
        "/auth/password-reset",
        None,
        Some(json!({ "username": "nobody" })),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], generic);

    let (_, page) = send_json(&app, Method::GET, "/api/admin/password-resets", Some(&token), None).await?;
    assert_eq!(page["total"], 1);
    let id = page["items"][0]["id"].as_str().unwrap_or_default().to_string();

    let (status, approved) = send_json(
        &app,
        Method::POST,
        &format!("/api/admin/password-resets/{}/approve", id),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let temporary = approved["temporary_password"].as_str().unwrap_or_default().to_string();
    assert!(!temporary.is_empty());

    login(&app, "coord.dizon", &temporary).await?;

    let (_, logs) = send_json(
        &app,
        Method::GET,
        "/api/admin/audit-logs?action=approve",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(logs["total"], 1);

    Ok(())
}

#[tokio::test]
async fn test_attendance_across_new_year() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let token = setup_and_login(&app).await?;

    let a = create_person(&app, &token, json!({ "first_name": "Ana", "last_name": "Uy" })).await?;
    let b = create_person(&app, &token, json!({ "first_name": "Ben", "last_name": "Go" })).await?;
    let guest = create_person(&app, &token, json!({ "first_name": "Cy", "last_name": "Tan", "role": "VISITOR" })).await?;

    let (status, cluster) = send_json(
        &app,
        Method::POST,
        "/api/clusters",
        Some(&token),
        Some(json!({ "code": "CL-01", "name": "North", "members": [a["id"], b["id"]] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", cluster);
    let cluster_id = cluster["id"].as_str().unwrap_or_default().to_string();

    let reports = [
        (2024, 52, json!([a["id"], b["id"]]), json!([guest["id"]])),
        (2025, 1, json!([b["id"]]), json!([])),
    ];
    for (year, week, members, visitors) in reports {
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/reports",
            Some(&token),
            Some(json!({
                "cluster_id": cluster_id,
                "year": year,
                "week_number": week,
                "gathering_type": "PHYSICAL",
                "members_attended": members,
                "visitors_attended": visitors
            })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let uri = format!("/api/clusters/{}/attendance", cluster_id);
    let (status, history) = send_json(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    // Week 1 of 2025 is the latest, not week 52 of 2024
    assert_eq!(history["most_recent_week"], json!({ "year": 2025, "week": 1 }));
    assert_eq!(history["most_recent_members"], json!([b["id"]]));
    assert_eq!(history["previously_attended_members"].as_array().map(Vec::len), Some(2));
    assert_eq!(history["previously_attended_visitors"], json!([guest["id"]]));

    let (_, history) = send_json(
        &app,
        Method::GET,
        &format!("{}?year=2025&week=1", uri),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(history["most_recent_week"], json!({ "year": 2024, "week": 52 }));

    let (status, _) = send_json(&app, Method::GET, &format!("{}?year=2025", uri), Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app,
        Method::GET,
        &format!("{}?year=2024&week=60", uri),
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}

#[tokio::test]
async fn test_deleting_a_person_keeps_clusters_editable() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let token = setup_and_login(&app).await?;

    let a = create_person(&app, &token, json!({ "first_name": "Dan", "last_name": "Co" })).await?;
    let b = create_person(&app, &token, json!({ "first_name": "Eve", "last_name": "Co" })).await?;
    let (status, cluster) = send_json(
        &app,
        Method::POST,
        "/api/clusters",
        Some(&token),
        Some(json!({ "code": "CL-09", "name": "East", "members": [a["id"], b["id"]] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", cluster);
    let uri = format!("/api/clusters/{}", cluster["id"].as_str().unwrap_or_default());

    let person_uri = format!("/api/people/{}", a["id"].as_str().unwrap_or_default());
    let (status, _) = send_json(&app, Method::DELETE, &person_uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, cluster) = send_json(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(cluster["members"], json!([b["id"]]));

    // Sending the roster back unchanged must not trip the existence check
    let (status, body) = send_json(
        &app,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "members": cluster["members"], "location": "Pasig" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, page) = send_json(&app, Method::GET, "/api/clusters?member_count=2", Some(&token), None).await?;
    assert_eq!(page["total"], 0);

    Ok(())
}

#[tokio::test]
async fn test_null_clears_a_field() -> anyhow::Result<()> {
    let (app, _) = test_app().await?;
    let token = setup_and_login(&app).await?;

    let lead = create_person(
        &app,
        &token,
        json!({ "first_name": "Ivy", "last_name": "Ong", "email": "ivy@example.com", "phone": "0917" }),
    )
    .await?;
    let (_, cluster) = send_json(
        &app,
        Method::POST,
        "/api/clusters",
        Some(&token),
        Some(json!({ "code": "CL-07", "name": "West", "coordinator_id": lead["id"] })),
    )
    .await?;
    assert_eq!(cluster["coordinator_id"], lead["id"]);

    let uri = format!("/api/clusters/{}", cluster["id"].as_str().unwrap_or_default());
    let (status, cluster) = send_json(
        &app,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "coordinator_id": null })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", cluster);
    assert_eq!(cluster["coordinator_id"], Value::Null);
    assert_eq!(cluster["name"], "West");

    let uri = format!("/api/people/{}", lead["id"].as_str().unwrap_or_default());
    let (status, person) = send_json(&app, Method::PUT, &uri, Some(&token), Some(json!({ "email": null }))).await?;
    assert_eq!(status, StatusCode::OK, "{}", person);
    assert_eq!(person["email"], Value::Null);
    assert_eq!(person["phone"], "0917");

    Ok(())
}
