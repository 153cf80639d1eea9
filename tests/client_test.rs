use flock::{
    client::{ApiClient, ClientError, FALLBACK_MESSAGE},
    domain::Person,
    export::ExportFormat,
    listing::{ListQuery, Page, SortDirection},
    service::bulk::ExportRequest,
};
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn person_json(username: &str) -> serde_json::Value {
    json!({
        "id": "6f1c2a3e-8f44-4a7b-9a51-2f3c1d0e9b10",
        "member_id": null,
        "username": username,
        "first_name": "Grace",
        "middle_name": null,
        "last_name": "Lim",
        "suffix": null,
        "email": null,
        "phone": null,
        "address": null,
        "role": "COORDINATOR",
        "status": "ACTIVE",
        "branch_id": null,
        "date_of_birth": null,
        "date_first_attended": null,
        "water_baptism_date": null,
        "spirit_baptism_date": null,
        "notes": null,
        "created_at": "2024-03-01T08:00:00Z",
        "updated_at": "2024-03-01T08:00:00Z"
    })
}

#[tokio::test]
async fn test_login_stores_the_token() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "username": "grace.lim", "password": "cluster123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc123",
            "person": person_json("grace.lim")
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(person_json("grace.lim")))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(server.uri());
    let person = client.login("grace.lim", "cluster123").await?;
    assert_eq!(person.username, "grace.lim");
    assert_eq!(client.token(), Some("abc123"));

    let me = client.me().await?;
    assert_eq!(me.full_name(), "Grace Lim");

    Ok(())
}

#[tokio::test]
async fn test_server_message_is_surfaced() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/people"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "conflict",
            "message": "Email already exists"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).with_token("t");

    let err = client
        .create::<Person, _>("people", &json!({ "first_name": "A", "last_name": "B" }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.message(), "Email already exists");

    let err = client.delete("people", uuid::Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), FALLBACK_MESSAGE);

    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Nothing listens on port 9 locally
    let client = ApiClient::new("http://127.0.0.1:9");
    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.status().is_none());
    assert!(!err.message().is_empty());
}

#[tokio::test]
async fn test_list_sends_the_query() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/people"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "25"))
        .and(query_param("search", "lim"))
        .and(query_param("sort", "last_name"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [person_json("grace.lim")],
            "total": 26,
            "page": 2,
            "page_size": 25,
            "total_pages": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(format!("{}/", server.uri())).with_token("t");
    let query = ListQuery::new(2, 25)
        .with_search("lim")
        .with_sort("last_name", SortDirection::Desc);
    let page: Page<Person> = client.list("people", &query).await?;

    assert_eq!(page.total, 26);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_pages, 2);

    Ok(())
}

#[tokio::test]
async fn test_export_download_keeps_the_filename() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/clusters/export"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    "attachment; filename=\"clusters_20240301_080000.csv\"",
                )
                .set_body_raw("Code,Name\nCL-01,North\n", "text/csv; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).with_token("t");
    let download = client
        .export(
            "clusters",
            &ExportRequest {
                format: ExportFormat::Csv,
                ids: None,
                query: None,
                columns: Some(vec!["code".to_string(), "name".to_string()]),
            },
        )
        .await?;

    assert_eq!(download.filename.as_deref(), Some("clusters_20240301_080000.csv"));
    assert_eq!(download.content_type.as_deref(), Some("text/csv; charset=utf-8"));
    assert_eq!(download.bytes, b"Code,Name\nCL-01,North\n");

    Ok(())
}
