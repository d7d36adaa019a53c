#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use tokenwarden::{
    ServerConfig,
    auth::TokenPolicy,
    clock::{ManualClock, from_unix},
    create_app,
    db::Database,
};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-for-testing-only";

/// Fixed start time so tests are independent of the wall clock.
pub fn start_time() -> DateTime<Utc> {
    from_unix(1_705_321_845).expect("valid timestamp")
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub clock: Arc<ManualClock>,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_policy(TokenPolicy::default()).await
}

pub async fn create_test_app_with_policy(token_policy: TokenPolicy) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let clock = Arc::new(ManualClock::new(start_time()));
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        jwt_algorithm: Algorithm::HS256,
        token_policy,
        clock: clock.clone(),
    };
    TestApp {
        app: create_app(&config),
        db,
        clock,
    }
}

impl TestApp {
    /// Send a request with an optional JSON body and decode the JSON response.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    /// Send a raw (possibly malformed) JSON body.
    pub async fn request_raw(
        &self,
        method: &str,
        uri: &str,
        body: &'static str,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Register an access group, asserting success. Returns the response body.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> serde_json::Value {
        let (status, json) = self
            .request(
                "POST",
                "/api/access-groups",
                Some(serde_json::json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
        json
    }

    /// Request a token, asserting success. Returns the token record.
    pub async fn login(&self, email: &str, password: &str) -> serde_json::Value {
        let (status, json) = self
            .request(
                "POST",
                "/api/auth",
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "login failed: {json}");
        json
    }

    /// Present a token for verification.
    pub async fn verify(
        &self,
        access_group: &str,
        signature: &str,
    ) -> (StatusCode, serde_json::Value) {
        self.request(
            "PUT",
            "/api/auth",
            Some(serde_json::json!({ "access_group": access_group, "signature": signature })),
        )
        .await
    }
}

/// Parse an RFC 3339 timestamp from a response field.
pub fn timestamp(value: &serde_json::Value) -> DateTime<Utc> {
    value
        .as_str()
        .expect("timestamp should be a string")
        .parse::<DateTime<Utc>>()
        .expect("timestamp should be RFC 3339")
}
