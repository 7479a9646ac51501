//! Debt listing and payoff plan integration tests.

mod common;

use common::TestApp;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

fn d(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("expected decimal string")).unwrap()
}

async fn create_debt_account(
    app: &TestApp,
    client: &Client,
    name: &str,
    account_type: &str,
    balance: &str,
    interest_rate: &str,
    minimum_payment: &str,
) -> Uuid {
    let response = client
        .post(format!("{}/api/accounts", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "name": name,
            "account_type": account_type,
            "balance": balance,
            "interest_rate": interest_rate,
            "minimum_payment": minimum_payment
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    Uuid::parse_str(body["account_id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL - run with integ-tests.sh
async fn debts_lists_active_debt_accounts_by_magnitude() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    // Not a debt type; never listed
    let response = client
        .post(format!("{}/api/accounts", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "name": "Checking", "account_type": "checking", "balance": "3000" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);

    create_debt_account(&app, &client, "Visa", "credit_card", "-500", "24", "25").await;
    create_debt_account(&app, &client, "Car Loan", "loan", "-8000", "6.5", "220").await;
    let closed_id =
        create_debt_account(&app, &client, "Old Card", "credit_card", "-100", "19", "20").await;

    // Deactivated debts drop out of the planner
    let response = client
        .patch(format!("{}/api/accounts/{}", app.address, closed_id))
        .bearer_auth(app.token())
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = client
        .get(format!("{}/api/debts", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let debts = body.as_array().unwrap();
    assert_eq!(debts.len(), 2);

    let visa = debts.iter().find(|d| d["name"] == "Visa").unwrap();
    assert_eq!(visa["account_type"], "credit_card");
    // Balance is reported as the amount owed, not the signed book value
    assert_eq!(d(&visa["balance"]), Decimal::from_str("500").unwrap());
    assert_eq!(d(&visa["interest_rate"]), Decimal::from_str("24").unwrap());
    assert_eq!(
        d(&visa["minimum_payment"]),
        Decimal::from_str("25").unwrap()
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn payoff_plan_compares_all_three_strategies() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    create_debt_account(&app, &client, "Visa", "credit_card", "-1000", "24", "50").await;
    create_debt_account(&app, &client, "Car Loan", "loan", "-5000", "6", "100").await;

    let response = client
        .get(format!(
            "{}/api/debts/payoff-plan?extra_payment=100",
            app.address
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    for strategy in ["snowball", "avalanche", "current_pace"] {
        let result = &body[strategy];
        assert!(result["total_months"].is_u64(), "{} months", strategy);
        assert!(result["total_interest"].is_string(), "{} interest", strategy);
        assert_eq!(result["debts"].as_array().unwrap().len(), 2);
    }

    // Paying down the highest rate first never costs more interest
    let avalanche_interest = d(&body["avalanche"]["total_interest"]);
    let snowball_interest = d(&body["snowball"]["total_interest"]);
    assert!(avalanche_interest <= snowball_interest);

    // The extra payment beats the minimum-only baseline
    let accelerated = body["snowball"]["total_months"].as_u64().unwrap();
    let baseline = body["current_pace"]["total_months"].as_u64().unwrap();
    assert!(accelerated < baseline);

    assert!(d(&body["snowball_interest_saved"]) > Decimal::ZERO);
    assert!(body["snowball_months_saved"].as_i64().unwrap() > 0);
    assert!(body["snowball"]["debt_free_date"].is_string());

    // Each debt projection carries a month-by-month schedule
    let first_debt = &body["snowball"]["debts"][0];
    let schedule = first_debt["schedule"].as_array().unwrap();
    assert!(!schedule.is_empty());
    assert_eq!(schedule[0]["month"], 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn payoff_plan_rejects_a_negative_extra_payment() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!(
            "{}/api/debts/payoff-plan?extra_payment=-5",
            app.address
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn payoff_plan_with_no_debts_is_empty_but_valid() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/debts/payoff-plan", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["snowball"]["total_months"], 0);
    assert!(body["snowball"]["debts"].as_array().unwrap().is_empty());
    assert!(body["snowball"]["debt_free_date"].is_null());
    assert_eq!(d(&body["snowball"]["total_interest"]), Decimal::ZERO);

    app.cleanup().await;
}
