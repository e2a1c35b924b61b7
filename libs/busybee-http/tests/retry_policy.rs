#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Retry behaviour against a real HTTP server.
//!
//! Retried requests carry `X-Retry-Attempt`, which lets each mock answer
//! exactly one attempt.

use busybee_http::{
    ExponentialBackoff, HttpClient, HttpClientBuilder, Method, RetryConfig, StatusCode,
};
use httpmock::prelude::*;
use serde_json::json;

const ENABLE_STATUSES: [u16; 5] = [400, 500, 502, 503, 504];

fn enable_client() -> HttpClient {
    let policy = RetryConfig::on_statuses(
        5,
        ExponentialBackoff::fast(),
        ENABLE_STATUSES,
        [
            Method::HEAD,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::TRACE,
        ],
    );
    HttpClientBuilder::new()
        .allow_insecure_http()
        .retry(Some(policy))
        .build()
        .expect("client builds")
}

#[tokio::test]
async fn post_retried_after_service_unavailable() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(httpmock::Method::POST)
            .path("/_/proxy/tenants/diku/modules")
            .header_missing("x-retry-attempt");
        then.status(503).body("okapi starting");
    });
    let second = server.mock(|when, then| {
        when.method(httpmock::Method::POST)
            .path("/_/proxy/tenants/diku/modules")
            .header("x-retry-attempt", "1")
            .json_body(json!({"id": "mod-users-1.0.0"}));
        then.status(201).json_body(json!({"id": "mod-users-1.0.0"}));
    });

    let resp = enable_client()
        .post(&format!("{}/_/proxy/tenants/diku/modules", server.base_url()))
        .json(&json!({"id": "mod-users-1.0.0"}))
        .unwrap()
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    first.assert_calls(1);
    second.assert_calls(1);
}

#[tokio::test]
async fn exhausted_retries_surface_final_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/_/proxy/tenants/diku/modules");
        then.status(400)
            .body("Module mod-users-1.0.0 has no launchDescriptor");
    });

    let resp = enable_client()
        .post(&format!("{}/_/proxy/tenants/diku/modules", server.base_url()))
        .json(&json!({"id": "mod-users-1.0.0"}))
        .unwrap()
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().contains("has no launchDescriptor"));
    mock.assert_calls(6);
}

#[tokio::test]
async fn unlisted_status_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/_/proxy/tenants/diku/modules");
        then.status(422).body("unknown module");
    });

    let resp = enable_client()
        .post(&format!("{}/_/proxy/tenants/diku/modules", server.base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    mock.assert_calls(1);
}

#[tokio::test]
async fn client_without_policy_sends_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/_/discovery/modules");
        then.status(503);
    });

    let client = HttpClientBuilder::new()
        .allow_insecure_http()
        .retry(None)
        .build()
        .unwrap();
    let resp = client
        .post(&format!("{}/_/discovery/modules", server.base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    mock.assert_calls(1);
}
