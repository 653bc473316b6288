//! Shared test utilities for integration tests.
//!
//! `TestClient` drives the full router against the in-memory backend and
//! keeps a cookie jar, so a sequence of requests behaves like one browser
//! session. Methods are intentionally broad to support various test
//! scenarios across different test files.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use moneymind::config::Config;
use moneymind::gateway::memory::InMemoryBackend;
use moneymind::server::build_router;
use moneymind::state::AppState;
use tower::ServiceExt;

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn is_redirect_to(&self, target: &str) -> bool {
        self.status.is_redirection() && self.location.as_deref() == Some(target)
    }
}

/// A test client that simulates a browser session, allowing sequential requests
/// against the application.
pub struct TestClient {
    pub backend: Arc<InMemoryBackend>,
    pub state: AppState,
    cookies: Mutex<HashMap<String, String>>,
}

impl TestClient {
    /// Fresh backend, no session. Must be created inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()))
    }

    /// A second browser against an existing backend.
    pub fn with_backend(backend: Arc<InMemoryBackend>) -> Self {
        let state = AppState::new(Config::in_memory(), backend.clone(), backend.clone());
        Self {
            backend,
            state,
            cookies: Mutex::new(HashMap::new()),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().unwrap().get(name).cloned()
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn store_cookies(&self, response: &axum::response::Response) {
        let mut jar = self.cookies.lock().unwrap();
        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = value.to_str().unwrap();
            let pair = raw.split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            let removed = value.is_empty() || raw.contains("Max-Age=0");
            if removed {
                jar.remove(name.trim());
            } else {
                jar.insert(name.trim().to_string(), value.to_string());
            }
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.unwrap();
        self.store_cookies(&response);

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&body).to_string(),
        }
    }

    /// Make a GET request and return the response.
    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(header::COOKIE, self.cookie_header())
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Make a POST request with form data.
    pub async fn post_form(&self, uri: &str, form_data: &[(&str, &str)]) -> TestResponse {
        let body = form_data
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, self.cookie_header())
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Get JSON from an endpoint and parse it.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        uri: &str,
    ) -> (StatusCode, Option<T>) {
        let response = self.get(uri).await;
        (response.status, serde_json::from_str(&response.body).ok())
    }

    /// Let the auth event listener catch up with published events.
    pub async fn settle(&self) {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    // =========================================================================
    // Helper methods for common flows
    // =========================================================================

    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> TestResponse {
        self.post_form(
            "/signup",
            &[("full_name", name), ("email", email), ("password", password)],
        )
        .await
    }

    /// Create an account and sign in to it; the client then holds the session cookies.
    pub async fn signed_in(name: &str, email: &str) -> Self {
        let client = Self::new();
        client.register_and_sign_in(name, email).await;
        client
    }

    pub async fn register_and_sign_in(&self, name: &str, email: &str) {
        self.sign_up(name, email, "secret1").await;
        let response = self
            .post_form("/login", &[("email", email), ("password", "secret1")])
            .await;
        assert!(response.status.is_redirection(), "sign-in failed: {}", response.body);
        self.settle().await;
    }

    pub async fn add_transaction(
        &self,
        kind: &str,
        title: &str,
        amount: &str,
        category: &str,
        date: &str,
    ) -> TestResponse {
        self.post_form(
            "/transactions/create",
            &[
                ("type", kind),
                ("title", title),
                ("amount", amount),
                ("category", category),
                ("date", date),
            ],
        )
        .await
    }

    pub async fn add_budget(&self, category: &str, amount: &str) -> TestResponse {
        self.post_form(
            "/budget/create",
            &[("category", category), ("amount", amount)],
        )
        .await
    }
}
