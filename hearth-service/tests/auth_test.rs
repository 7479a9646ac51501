//! Authentication and organization-scoping integration tests.

mod common;

use common::{mint_token, TestApp, TEST_JWT_SECRET};
use reqwest::Client;
use uuid::Uuid;

#[tokio::test]
#[ignore] // Requires PostgreSQL - run with integ-tests.sh
async fn api_rejects_requests_without_a_token() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/accounts", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 401);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn api_rejects_a_token_signed_with_the_wrong_secret() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let token = mint_token("not-the-real-secret", Some(app.organization_id));
    let response = client
        .get(format!("{}/api/accounts", app.address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 401);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn api_rejects_a_token_without_an_org_claim() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let token = mint_token(TEST_JWT_SECRET, None);
    let response = client
        .get(format!("{}/api/accounts", app.address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 403);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn api_accepts_a_valid_token() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/accounts", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body.as_array().map(|a| a.len()), Some(0));

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn organizations_cannot_see_each_others_data() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id =
        common::create_test_account(&app, &client, "Checking", "checking", "100").await;

    // A different organization listing accounts sees nothing
    let other_token = app.token_for_org(Uuid::new_v4());
    let response = client
        .get(format!("{}/api/accounts", app.address))
        .bearer_auth(&other_token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body.as_array().map(|a| a.len()), Some(0));

    // Fetching the account by id from the other organization is a 404
    let response = client
        .get(format!("{}/api/accounts/{}", app.address, account_id))
        .bearer_auth(&other_token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
