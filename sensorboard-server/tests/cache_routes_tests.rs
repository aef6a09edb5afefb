// Response cache over HTTP
// Tests x-cache outcomes, per-caller keys, invalidation and degraded mode


use reqwest::StatusCode;
use sensorboard_server::auth::Role;
use serde_json::{Value, json};
use test_helper::{
    SAMPLE_CSV, cache_header, client, spawn_test_server, spawn_uncached_server,
};

#[tokio::test]
async fn test_files_miss_then_hit() {
    let server = spawn_test_server().await;
    let client = server.login_admin().await;

    let first = client
        .get(server.endpoint("/api/v1/files"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_header(&first).as_deref(), Some("MISS"));
    let first_body: Value = first.json().await.unwrap();

    let second = client
        .get(server.endpoint("/api/v1/files"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(cache_header(&second).as_deref(), Some("HIT"));
    assert_eq!(
        second.headers().get("content-type").unwrap(),
        "application/json"
    );
    let second_body: Value = second.json().await.unwrap();

    assert_eq!(first_body, second_body);
    assert_eq!(first_body, json!({"files": []}));
}

#[tokio::test]
async fn test_cache_entries_are_per_user() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;
    let viewer = server.user_client("viewer1", Role::Viewer).await;

    let response = admin.get(server.endpoint("/api/v1/stats")).send().await.unwrap();
    assert_eq!(cache_header(&response).as_deref(), Some("MISS"));

    let response = viewer.get(server.endpoint("/api/v1/stats")).send().await.unwrap();
    assert_eq!(cache_header(&response).as_deref(), Some("MISS"));

    let response = viewer.get(server.endpoint("/api/v1/stats")).send().await.unwrap();
    assert_eq!(cache_header(&response).as_deref(), Some("HIT"));
}

#[tokio::test]
async fn test_query_string_is_part_of_key() {
    let server = spawn_test_server().await;
    let client = server.login_admin().await;

    let outcomes = [
        ("/api/v1/logs?page=1", "MISS"),
        ("/api/v1/logs?page=2", "MISS"),
        ("/api/v1/logs?page=1", "HIT"),
        ("/api/v1/logs?page=2", "HIT"),
    ];
    for (path, expected) in outcomes {
        let response = client.get(server.endpoint(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response).as_deref(), Some(expected), "{}", path);
    }

    let response = client
        .get(server.endpoint("/api/v1/logs?page=2"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["page"], 2);
}

#[tokio::test]
async fn test_post_search_bypasses_cache() {
    let server = spawn_test_server().await;
    let client = server.login_admin().await;

    for _ in 0..2 {
        let response = client
            .post(server.endpoint("/search/query"))
            .json(&json!({"q": "T-01"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response).as_deref(), Some("BYPASS"));
    }

    let stats: Value = client
        .get(server.endpoint("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["route_keys"], 0);
}

#[tokio::test]
async fn test_error_responses_not_cached() {
    let server = spawn_test_server().await;
    let client = server.login_admin().await;

    for _ in 0..2 {
        let response = client
            .get(server.endpoint("/search/query?date_from=someday"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(cache_header(&response).as_deref(), Some("MISS"));
    }
}

#[tokio::test]
async fn test_anonymous_never_served_cached_response() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;

    admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
    let response = admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
    assert_eq!(cache_header(&response).as_deref(), Some("HIT"));

    let response = client()
        .get(server.endpoint("/api/v1/files"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cache_header(&response), None);
}

#[tokio::test]
async fn test_cached_response_served_until_cleared() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;

    let body: Value = admin
        .get(server.endpoint("/api/v1/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["files"].as_array().unwrap().len(), 0);

    let response = server.upload(&admin, "sensors.csv", SAMPLE_CSV).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Still within TTL: the stale listing is served
    let response = admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
    assert_eq!(cache_header(&response).as_deref(), Some("HIT"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["files"].as_array().unwrap().len(), 0);

    let response = admin
        .post(server.endpoint("/api/v1/cache/clear"))
        .json(&json!({"pattern": "route:get_files:*"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared: Value = response.json().await.unwrap();
    assert_eq!(cleared["scope"], "matched");
    assert_eq!(cleared["keys_deleted"], 1);

    let response = admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
    assert_eq!(cache_header(&response).as_deref(), Some("MISS"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_admin_clear_forbidden() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;
    let analyst = server.user_client("analyst1", Role::Analyst).await;

    admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
    admin.get(server.endpoint("/api/v1/stats")).send().await.unwrap();

    let response = analyst
        .post(server.endpoint("/api/v1/cache/clear"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 403);

    let stats: Value = analyst
        .get(server.endpoint("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["connected"], true);
    assert_eq!(stats["route_keys"], 2);
}

#[tokio::test]
async fn test_clear_all_twice() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;

    admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
    admin.get(server.endpoint("/api/v1/dashboard/stats")).send().await.unwrap();

    let first: Value = admin
        .post(server.endpoint("/api/v1/cache/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["scope"], "all");
    assert_eq!(first["pattern"], "*");
    assert_eq!(first["keys_deleted"], 2);

    let second: Value = admin
        .post(server.endpoint("/api/v1/cache/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["scope"], "all");
    assert_eq!(second["keys_deleted"], 0);
}

#[tokio::test]
async fn test_backend_down_serves_fresh_results() {
    let server = spawn_uncached_server().await;
    let admin = server.login_admin().await;

    for _ in 0..2 {
        let response = admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response).as_deref(), Some("MISS"));
    }

    let stats: Value = admin
        .get(server.endpoint("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["connected"], false);
    assert!(stats["error"].as_str().unwrap().contains("Cannot connect"));

    let cleared: Value = admin
        .post(server.endpoint("/api/v1/cache/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(cleared["keys_deleted"].is_null());
}

#[tokio::test]
async fn test_search_filters_use_function_cache() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;

    let filters: Value = admin
        .get(server.endpoint("/search/filters"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filters["zones"], json!([]));

    let stats: Value = admin
        .get(server.endpoint("/api/v1/cache/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["cache_keys"], 1);

    // Upload drops the cached filters
    server.upload(&admin, "sensors.csv", SAMPLE_CSV).await;
    let filters: Value = admin
        .get(server.endpoint("/search/filters"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filters["zones"], json!(["A", "B"]));
}

#[tokio::test]
async fn test_cache_metrics_exported() {
    let server = spawn_test_server().await;
    let admin = server.login_admin().await;
    admin.get(server.endpoint("/api/v1/files")).send().await.unwrap();

    let metrics = client()
        .get(server.endpoint("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("sensorboard_cache_requests_total"));
    assert!(metrics.contains("operation=\"get_files\""));
    assert!(metrics.contains("sensorboard_http_requests_total"));
}
