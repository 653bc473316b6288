mod common;

use axum::http::StatusCode;
use common::TestClient;

#[tokio::test]
async fn created_transaction_is_listed() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;

    let response = client
        .add_transaction("expense", "Weekly shop", "42.50", "Groceries", "2024-03-02")
        .await;
    assert!(response.is_redirect_to("/transactions"));

    let page = client.get("/transactions").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Weekly shop"));
    assert!(page.body.contains("-$42.50"));
    assert!(page.body.contains("Mar 2, 2024"));
}

#[tokio::test]
async fn income_is_shown_with_plus_sign() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    client
        .add_transaction("income", "Payday", "2000", "Salary", "2024-03-01")
        .await;

    let page = client.get("/transactions").await;
    assert!(page.body.contains("+$2000.00"));
}

#[tokio::test]
async fn newest_entry_comes_first() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    client
        .add_transaction("expense", "First entry", "1", "Other", "2024-03-01")
        .await;
    client
        .add_transaction("expense", "Second entry", "2", "Other", "2024-03-01")
        .await;

    let page = client.get("/transactions").await;
    let first = page.body.find("First entry").unwrap();
    let second = page.body.find("Second entry").unwrap();
    assert!(second < first);
}

#[tokio::test]
async fn non_numeric_amount_is_rejected_without_backend_call() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    client.get("/transactions").await;
    let calls = client.backend.data_call_count();

    let response = client
        .add_transaction("expense", "Lunch", "abc", "Dining Out", "2024-03-02")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Amount must be a number"));
    // The entered values are kept in the form.
    assert!(response.body.contains(r#"value="Lunch""#));
    assert_eq!(client.backend.data_call_count(), calls);
}

#[tokio::test]
async fn validation_messages_for_each_field() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;

    let cases = [
        (("", "5", "Other", "2024-03-02"), "Title is required"),
        (("Taxi", "-5", "Transportation", "2024-03-02"), "Amount must not be negative"),
        (("Taxi", "5", "Taxis", "2024-03-02"), "Choose a category from the list"),
        (
            ("Taxi", "5", "Transportation", "2024-02-30"),
            "Date must be a valid calendar date (YYYY-MM-DD)",
        ),
    ];

    for ((title, amount, category, date), message) in cases {
        let response = client
            .add_transaction("expense", title, amount, category, date)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(
            response.body.contains(message),
            "expected {:?} for {:?}",
            message,
            (title, amount, category, date)
        );
    }
}

#[tokio::test]
async fn failed_write_shows_error_and_keeps_list() {
    let client = TestClient::signed_in("Ann", "ann@example.com").await;
    client.get("/transactions").await;
    client.backend.set_fail_writes(true);

    let response = client
        .add_transaction("expense", "Concert", "80", "Entertainment", "2024-03-02")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Service unavailable"));

    let page = client.get("/transactions").await;
    assert!(!page.body.contains("Concert"));
    assert!(page.body.contains("No transactions yet."));
}

#[tokio::test]
async fn transactions_are_private_to_their_owner() {
    let ann = TestClient::signed_in("Ann", "ann@example.com").await;
    ann.add_transaction("expense", "Zanzibar trip", "900", "Other", "2024-03-01")
        .await;

    let bob = TestClient::with_backend(ann.backend.clone());
    bob.register_and_sign_in("Bob", "bob@example.com").await;

    let page = bob.get("/transactions").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(!page.body.contains("Zanzibar"));
    assert!(ann.get("/transactions").await.body.contains("Zanzibar"));
}
