mod common;

use axum::http::StatusCode;
use common::TestClient;
use moneymind::session::{ACCESS_COOKIE, REFRESH_COOKIE};

#[tokio::test]
async fn anonymous_dashboard_redirects_to_login_with_target() {
    let client = TestClient::new();
    let response = client.get("/dashboard").await;
    assert!(
        response.is_redirect_to("/login?redirect=%2Fdashboard"),
        "got {:?} {:?}",
        response.status,
        response.location
    );
}

#[tokio::test]
async fn anonymous_redirect_keeps_query_string() {
    let client = TestClient::new();
    let response = client.get("/dashboard?period=7d").await;
    assert_eq!(
        response.location.as_deref(),
        Some("/login?redirect=%2Fdashboard%3Fperiod%3D7d")
    );
}

#[tokio::test]
async fn anonymous_api_request_is_unauthorized() {
    let client = TestClient::new();
    let response = client.get("/api/summary").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_pages_need_no_session() {
    let client = TestClient::new();

    let health = client.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body, "OK");

    let login = client.get("/login?redirect=%2Fbudget").await;
    assert_eq!(login.status, StatusCode::OK);
    assert!(login.body.contains(r#"name="redirect""#));
    assert!(login.body.contains("redirect=%2Fbudget"));
}

#[tokio::test]
async fn sign_up_requires_name_then_credentials() {
    let client = TestClient::new();

    let response = client.sign_up("", "ann@example.com", "secret1").await;
    assert!(response.body.contains("Enter your name to create an account."));

    let response = client.sign_up("Ann", "", "").await;
    assert!(response
        .body
        .contains("Enter an email and password to create an account."));

    let response = client.sign_up("Ann", "ann@example.com", "secret1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .body
        .contains("Account created. Check your email to confirm."));
}

#[tokio::test]
async fn duplicate_sign_up_surfaces_provider_message() {
    let client = TestClient::new();
    client.sign_up("Ann", "ann@example.com", "secret1").await;
    let response = client.sign_up("Ann", "ann@example.com", "secret1").await;
    assert!(response.body.contains("User already registered"));
}

#[tokio::test]
async fn sign_in_returns_to_requested_page() {
    let client = TestClient::new();
    client.sign_up("Ann", "ann@example.com", "secret1").await;

    let response = client
        .post_form(
            "/login",
            &[
                ("email", "ann@example.com"),
                ("password", "secret1"),
                ("redirect", "/budget"),
            ],
        )
        .await;
    assert!(response.is_redirect_to("/budget"));
    assert!(client.cookie(ACCESS_COOKIE).is_some());
    assert!(client.cookie(REFRESH_COOKIE).is_some());

    client.settle().await;
    let page = client.get("/budget").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Ann"));
}

#[tokio::test]
async fn unsafe_redirect_falls_back_to_dashboard() {
    let client = TestClient::new();
    client.sign_up("Ann", "ann@example.com", "secret1").await;

    let response = client
        .post_form(
            "/login",
            &[
                ("email", "ann@example.com"),
                ("password", "secret1"),
                ("redirect", "https://evil.example/"),
            ],
        )
        .await;
    assert!(response.is_redirect_to("/dashboard"));
}

#[tokio::test]
async fn wrong_password_shows_provider_message() {
    let client = TestClient::new();
    client.sign_up("Ann", "ann@example.com", "secret1").await;

    let response = client
        .post_form(
            "/login",
            &[("email", "ann@example.com"), ("password", "nope-nope")],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Invalid login credentials"));
    assert!(client.cookie(ACCESS_COOKIE).is_none());
}

#[tokio::test]
async fn sign_out_ends_the_session() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    assert_eq!(client.get("/").await.status, StatusCode::OK);

    let response = client.post_form("/logout", &[]).await;
    assert!(response.is_redirect_to("/login"));
    assert!(client.cookie(ACCESS_COOKIE).is_none());

    let response = client.get("/").await;
    assert!(response.is_redirect_to("/login?redirect=%2F"));
}

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    let old_access = client.cookie(ACCESS_COOKIE).unwrap();
    client.backend.expire_access_token(&old_access);

    let response = client.get("/dashboard").await;
    assert_eq!(response.status, StatusCode::OK);
    let new_access = client.cookie(ACCESS_COOKIE).unwrap();
    assert_ne!(new_access, old_access);
}

#[tokio::test]
async fn garbage_tokens_are_cleared_and_redirected() {
    let client = TestClient::new();
    client.set_cookie(ACCESS_COOKIE, "not-a-token");
    client.set_cookie(REFRESH_COOKIE, "also-not-a-token");

    let response = client.get("/transactions").await;
    assert!(response.is_redirect_to("/login?redirect=%2Ftransactions"));
    assert!(client.cookie(ACCESS_COOKIE).is_none());
}

#[tokio::test]
async fn display_name_comes_from_profile() {
    let client = TestClient::signed_in("Ann Lee", "ann@example.com").await;
    let page = client.get("/").await;
    assert!(page.body.contains("Welcome back, Ann Lee"));
}
