//! Savings goal integration tests.

mod common;

use common::TestApp;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

fn d(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("expected decimal string")).unwrap()
}

async fn create_goal(app: &TestApp, client: &Client, body: serde_json::Value) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/goals", app.address))
        .bearer_auth(app.token())
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);
    response.json().await.expect("Failed to parse response")
}

#[tokio::test]
#[ignore] // Requires PostgreSQL - run with integ-tests.sh
async fn create_goal_succeeds() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let body = create_goal(
        &app,
        &client,
        json!({
            "name": "Emergency fund",
            "target_amount": "5000",
            "target_date": "2035-01-01"
        }),
    )
    .await;

    assert!(body.get("goal_id").is_some());
    assert_eq!(body["name"], "Emergency fund");
    assert_eq!(d(&body["target_amount"]), Decimal::from_str("5000").unwrap());
    assert_eq!(d(&body["current_amount"]), Decimal::ZERO);
    assert_eq!(body["target_date"], "2035-01-01");
    assert_eq!(d(&body["progress_percent"]), Decimal::ZERO);
    assert_eq!(body["is_reached"], false);
    // Future target date yields a monthly savings figure
    assert!(body["required_monthly"].is_string());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn create_goal_rejects_bad_input() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/goals", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "name": "Backwards", "target_amount": "-100" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{}/api/goals", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "name": "", "target_amount": "100" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn contributions_accumulate() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let goal = create_goal(
        &app,
        &client,
        json!({ "name": "Vacation", "target_amount": "1000" }),
    )
    .await;
    let goal_id = goal["goal_id"].as_str().unwrap();

    let response = client
        .post(format!("{}/api/goals/{}/contributions", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "amount": "250" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(d(&body["current_amount"]), Decimal::from_str("250").unwrap());
    assert_eq!(
        d(&body["progress_percent"]),
        Decimal::from_str("25.0").unwrap()
    );
    assert_eq!(body["is_reached"], false);

    let body: serde_json::Value = client
        .post(format!("{}/api/goals/{}/contributions", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "amount": "250" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(d(&body["current_amount"]), Decimal::from_str("500").unwrap());
    assert_eq!(
        d(&body["progress_percent"]),
        Decimal::from_str("50.0").unwrap()
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn contribution_must_be_positive() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let goal = create_goal(
        &app,
        &client,
        json!({ "name": "Vacation", "target_amount": "1000" }),
    )
    .await;
    let goal_id = goal["goal_id"].as_str().unwrap();

    for amount in ["0", "-25"] {
        let response = client
            .post(format!("{}/api/goals/{}/contributions", app.address, goal_id))
            .bearer_auth(app.token())
            .json(&json!({ "amount": amount }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 400);
    }

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn reaching_a_goal_notifies_exactly_once() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let goal = create_goal(
        &app,
        &client,
        json!({ "name": "New laptop", "target_amount": "100" }),
    )
    .await;
    let goal_id = goal["goal_id"].as_str().unwrap();

    // Partway there: no notification yet
    let body: serde_json::Value = client
        .post(format!("{}/api/goals/{}/contributions", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "amount": "60" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["is_reached"], false);

    let notifications: serde_json::Value = client
        .get(format!("{}/api/notifications", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(notifications.as_array().unwrap().is_empty());

    // Crossing the target notifies
    let body: serde_json::Value = client
        .post(format!("{}/api/goals/{}/contributions", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "amount": "50" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["is_reached"], true);
    assert_eq!(d(&body["current_amount"]), Decimal::from_str("110").unwrap());
    // Progress caps at 100
    assert_eq!(
        d(&body["progress_percent"]),
        Decimal::from_str("100").unwrap()
    );

    let notifications: serde_json::Value = client
        .get(format!("{}/api/notifications", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let notifications = notifications.as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "goal_reached");
    assert!(notifications[0]["message"]
        .as_str()
        .unwrap()
        .contains("New laptop"));

    // Contributing past the target stays quiet
    let response = client
        .post(format!("{}/api/goals/{}/contributions", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "amount": "10" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    let notifications: serde_json::Value = client
        .get(format!("{}/api/notifications", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notifications.as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn update_goal_patches_only_given_fields() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let goal = create_goal(
        &app,
        &client,
        json!({ "name": "House fund", "target_amount": "20000" }),
    )
    .await;
    let goal_id = goal["goal_id"].as_str().unwrap();

    let response = client
        .patch(format!("{}/api/goals/{}", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "current_amount": "1500" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["name"], "House fund");
    assert_eq!(
        d(&body["current_amount"]),
        Decimal::from_str("1500").unwrap()
    );

    // Negative balances are rejected
    let response = client
        .patch(format!("{}/api/goals/{}", app.address, goal_id))
        .bearer_auth(app.token())
        .json(&json!({ "current_amount": "-1" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn delete_goal_removes_it() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let goal = create_goal(
        &app,
        &client,
        json!({ "name": "Short lived", "target_amount": "10" }),
    )
    .await;
    let goal_id = goal["goal_id"].as_str().unwrap();

    let response = client
        .delete(format!("{}/api/goals/{}", app.address, goal_id))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/api/goals/{}", app.address, goal_id))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
