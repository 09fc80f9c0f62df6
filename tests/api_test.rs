//! HTTP API tests driven through the router

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Utc};
use pricebatch::{
    Clock, Config, Engine, LookupError, LookupReply, PriceClient, ProductDetails,
    RateLimitConfig, SessionConfig, WorkerConfig,
};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, sleep, timeout};
use tower::ServiceExt;

struct FakeClient {
    prices: HashMap<String, f64>,
}

#[async_trait]
impl PriceClient for FakeClient {
    async fn fetch(
        &self,
        _auth_token: &SecretString,
        identifier: &str,
    ) -> Result<LookupReply, LookupError> {
        match self.prices.get(identifier) {
            Some(price) => Ok(LookupReply::Found(ProductDetails {
                name: Some(format!("Product {}", identifier)),
                available: true,
                current_price: Some(*price),
                currency: "CAD".to_string(),
                ..Default::default()
            })),
            None => Ok(LookupReply::NotCarried),
        }
    }
}

struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

fn test_engine(prices: &[(&str, f64)]) -> Engine {
    let client = Arc::new(FakeClient {
        prices: prices
            .iter()
            .map(|(id, price)| (id.to_string(), *price))
            .collect(),
    });
    let clock = Arc::new(ManualClock {
        now: Mutex::new(Utc::now()),
    });

    let config = Config::builder()
        .with_session(SessionConfig {
            chunk_size: 2,
            ttl_secs: 3600,
            sweep_interval_secs: 3600,
        })
        .with_worker(WorkerConfig {
            max_workers: 2,
            chunk_concurrency: 1,
            max_retries: 1,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 10,
        })
        .with_rate_limit(RateLimitConfig {
            requests_per_second: 1_000,
            burst: 1_000,
            acquire_timeout_ms: 1_000,
        })
        .build();

    Engine::with_parts(config, client, clock)
}

async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

async fn poll_until_settled(router: &Router, session_id: &str) -> serde_json::Value {
    timeout(Duration::from_secs(5), async {
        loop {
            let (status, body) = send_json(
                router,
                "GET",
                &format!("/api/sessions/{}/results", session_id),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let submitted = body["submitted"].as_u64().unwrap();
            let done = body["completed"].as_u64().unwrap() + body["failed"].as_u64().unwrap();
            if submitted > 0 && done >= submitted {
                return body;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("lookups did not settle in time")
}

#[tokio::test]
async fn test_start_session_requires_token() {
    let engine = test_engine(&[]);
    let router = engine.router();

    let (status, body) = send_json(
        &router,
        "POST",
        "/api/sessions",
        Some(serde_json::json!({ "auth_token": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Invalid credential"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_results_for_unknown_session_is_404() {
    let engine = test_engine(&[]);
    let router = engine.router();

    let (status, _) = send_json(&router, "GET", "/api/sessions/missing/results", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_full_session_flow() {
    let engine = test_engine(&[("1234EA", 12.99)]);
    let router = engine.router();

    // Start a session
    let (status, body) = send_json(
        &router,
        "POST",
        "/api/sessions",
        Some(serde_json::json!({ "auth_token": "tok-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // Submit raw pasted article codes
    let (status, body) = send_json(
        &router,
        "POST",
        &format!("/api/sessions/{}/identifiers", session_id),
        Some(serde_json::json!({ "raw": "1234EA5678EA" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], 2);
    assert_eq!(body["duplicate_count"], 0);
    assert_eq!(body["contains_article_codes"], true);

    // Poll until both identifiers are terminal
    let results = poll_until_settled(&router, &session_id).await;
    assert_eq!(results["completed"], 2);
    assert_eq!(results["failed"], 0);
    assert_eq!(results["auth_invalid"], false);

    let rows = results["results"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["identifier"], "1234EA");
    assert_eq!(rows[0]["outcome"], "success");
    assert_eq!(rows[0]["price"], 12.99);
    assert_eq!(rows[1]["identifier"], "5678EA");
    assert_eq!(rows[1]["outcome"], "not_found");

    // Close: no further submissions accepted
    let (status, _) = send_json(
        &router,
        "POST",
        &format!("/api/sessions/{}/close", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(
        &router,
        "POST",
        &format!("/api/sessions/{}/identifiers", session_id),
        Some(serde_json::json!({ "identifiers": ["another"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Explicit cleanup
    let (status, _) = send_json(
        &router,
        "DELETE",
        &format!("/api/sessions/{}", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(
        &router,
        "GET",
        &format!("/api/sessions/{}/results", session_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_submit_requires_identifiers_or_raw() {
    let engine = test_engine(&[]);
    let router = engine.router();

    let (status, body) = send_json(
        &router,
        "POST",
        "/api/sessions",
        Some(serde_json::json!({ "auth_token": "tok-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &router,
        "POST",
        &format!("/api/sessions/{}/identifiers", session_id),
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let engine = test_engine(&[]);
    let router = engine.router();

    let (status, body) = send_json(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    engine.shutdown().await;
}
