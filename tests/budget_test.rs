mod common;

use axum::http::StatusCode;
use common::TestClient;

/// Id of the first budget row on the page, taken from its edit link.
fn first_budget_id(body: &str) -> String {
    let start = body.find(r#"href="/budget/"#).unwrap() + r#"href="/budget/"#.len();
    let rest = &body[start..];
    let end = rest.find("/edit").unwrap();
    rest[..end].to_string()
}

#[tokio::test]
async fn budget_lifecycle() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;

    let response = client.add_budget("Groceries", "400").await;
    assert!(response.is_redirect_to("/budget"));

    let page = client.get("/budget").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Groceries"));
    assert!(page.body.contains("$400.00"));
    let id = first_budget_id(&page.body);

    let edit = client.get(&format!("/budget/{}/edit", id)).await;
    assert_eq!(edit.status, StatusCode::OK);
    assert!(edit.body.contains(r#"value="400""#));
    assert!(edit.body.contains(&format!("/budget/{}/update", id)));

    let response = client
        .post_form(&format!("/budget/{}/update", id), &[("amount", "450.5")])
        .await;
    assert!(response.is_redirect_to("/budget"));
    let page = client.get("/budget").await;
    assert!(page.body.contains("$450.50"));

    let response = client
        .post_form(&format!("/budget/{}/delete", id), &[])
        .await;
    assert!(response.is_redirect_to("/budget"));
    let page = client.get("/budget").await;
    assert!(page.body.contains("No budgets yet."));
}

#[tokio::test]
async fn invalid_amount_redirects_with_message() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;

    let response = client.add_budget("Groceries", "lots").await;
    assert!(response.is_redirect_to("/budget?error=Amount+must+be+a+number"));

    let page = client
        .get(response.location.as_deref().unwrap())
        .await;
    assert!(page.body.contains("Amount must be a number"));
    assert!(page.body.contains("No budgets yet."));
}

#[tokio::test]
async fn unknown_category_is_rejected() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    let response = client.add_budget("Yachts", "10").await;
    assert!(response.is_redirect_to("/budget?error=Choose+a+category+from+the+list"));
}

#[tokio::test]
async fn editing_unknown_budget_is_not_found() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    let response = client.get("/budget/does-not-exist/edit").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overview_totals_all_budgets() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    client.add_budget("Groceries", "300").await;
    client.add_budget("Housing", "1200").await;

    let page = client.get("/budget").await;
    assert!(page.body.contains("$1500.00"));
    assert!(page.body.contains("across 2 categories"));
}

#[tokio::test]
async fn enormous_limit_is_rejected() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;

    let response = client.add_budget("Groceries", "-1e300").await;
    assert!(response.is_redirect_to("/budget?error=Amount+is+too+large"));

    let page = client.get("/budget").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("No budgets yet."));
}
