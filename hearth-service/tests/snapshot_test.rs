//! Net worth snapshot integration tests.

mod common;

use common::{create_test_account, TestApp};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

fn d(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("expected decimal string")).unwrap()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL - run with integ-tests.sh
async fn snapshot_captures_assets_liabilities_and_net_worth() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    create_test_account(&app, &client, "Checking", "checking", "1000").await;
    create_test_account(&app, &client, "Savings", "savings", "2500").await;
    create_test_account(&app, &client, "Visa", "credit_card", "-500").await;
    create_test_account(&app, &client, "Car Loan", "loan", "-8000").await;

    // Inactive accounts stay out of the balance sheet
    let closed_id = create_test_account(&app, &client, "Closed", "savings", "99999").await;
    let response = client
        .patch(format!("{}/api/accounts/{}", app.address, closed_id))
        .bearer_auth(app.token())
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/api/snapshots", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();

    assert!(body.get("snapshot_id").is_some());
    assert!(body["captured_utc"].is_string());
    assert_eq!(d(&body["assets"]), Decimal::from_str("3500").unwrap());
    assert_eq!(d(&body["liabilities"]), Decimal::from_str("8500").unwrap());
    assert_eq!(d(&body["net_worth"]), Decimal::from_str("-5000").unwrap());

    // Breakdown keeps the signed per-type totals
    assert_eq!(
        d(&body["detail"]["checking"]),
        Decimal::from_str("1000").unwrap()
    );
    assert_eq!(
        d(&body["detail"]["credit_card"]),
        Decimal::from_str("-500").unwrap()
    );
    assert_eq!(
        d(&body["detail"]["loan"]),
        Decimal::from_str("-8000").unwrap()
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn snapshots_list_newest_first() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    create_test_account(&app, &client, "Checking", "checking", "1000").await;
    let response = client
        .post(format!("{}/api/snapshots", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);

    create_test_account(&app, &client, "Savings", "savings", "500").await;
    let response = client
        .post(format!("{}/api/snapshots", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = client
        .get(format!("{}/api/snapshots", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let snapshots = body.as_array().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(
        d(&snapshots[0]["net_worth"]),
        Decimal::from_str("1500").unwrap()
    );
    assert_eq!(
        d(&snapshots[1]["net_worth"]),
        Decimal::from_str("1000").unwrap()
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn snapshot_of_an_empty_organization_is_zero() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/snapshots", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(d(&body["assets"]), Decimal::ZERO);
    assert_eq!(d(&body["liabilities"]), Decimal::ZERO);
    assert_eq!(d(&body["net_worth"]), Decimal::ZERO);
    assert!(body["detail"].as_object().unwrap().is_empty());

    app.cleanup().await;
}
