//! Rule CRUD, batch application and preview integration tests.

mod common;

use common::{create_test_account, create_test_transaction, TestApp};
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

async fn create_rule(app: &TestApp, client: &Client, body: serde_json::Value) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/rules", app.address))
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
async fn create_rule_fills_defaults() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let body = create_rule(
        &app,
        &client,
        json!({
            "name": "Categorize groceries",
            "actions": [
                { "action_type": "set_category", "action_value": "Groceries" }
            ]
        }),
    )
    .await;

    assert!(body.get("rule_id").is_some());
    assert_eq!(body["match_type"], "all");
    assert_eq!(body["apply_to"], "both");
    assert_eq!(body["priority"], 0);
    assert_eq!(body["is_active"], true);
    assert_eq!(body["times_applied"], 0);
    assert!(body["conditions"].as_array().unwrap().is_empty());
    assert_eq!(body["actions"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn create_rule_rejects_malformed_parts() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let cases = [
        // Unknown condition field
        json!({
            "name": "r",
            "conditions": [{ "field": "memo", "operator": "equals", "value": "x" }],
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
        // Unknown operator
        json!({
            "name": "r",
            "conditions": [{ "field": "merchant_name", "operator": "like", "value": "x" }],
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
        // between without value_max
        json!({
            "name": "r",
            "conditions": [{ "field": "amount", "operator": "between", "value": "10" }],
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
        // No actions at all
        json!({
            "name": "r",
            "conditions": [{ "field": "merchant_name", "operator": "contains", "value": "x" }],
            "actions": []
        }),
        // add_label needs a label UUID
        json!({
            "name": "r",
            "actions": [{ "action_type": "add_label", "action_value": "vacation" }]
        }),
        // Unknown match_type
        json!({
            "name": "r",
            "match_type": "some",
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
        // Unknown apply_to
        json!({
            "name": "r",
            "apply_to": "sometimes",
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
    ];

    for body in cases {
        let response = client
            .post(format!("{}/api/rules", app.address))
            .bearer_auth(app.token())
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 400, "body: {}", body);
    }

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn apply_backfills_existing_transactions_and_counts_hits() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    create_test_transaction(&app, &client, account_id, "2025-06-01", "-42.00", Some("Whole Foods")).await;
    create_test_transaction(&app, &client, account_id, "2025-06-02", "-9.00", Some("Shell Gas")).await;

    let rule = create_rule(
        &app,
        &client,
        json!({
            "name": "Groceries",
            "apply_to": "existing",
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "whole foods" }
            ],
            "actions": [
                { "action_type": "set_category", "action_value": "Groceries" }
            ]
        }),
    )
    .await;

    let response = client
        .post(format!("{}/api/rules/apply", app.address))
        .bearer_auth(app.token())
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["evaluated"], 2);
    assert_eq!(body["matched"], 1);
    let hits = body["rules"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Groceries");
    assert_eq!(hits[0]["matched"], 1);

    // The matched transaction got its category
    let list: serde_json::Value = client
        .get(format!(
            "{}/api/transactions?category=Groceries",
            app.address
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["transactions"].as_array().unwrap().len(), 1);

    // Rule statistics were persisted
    let stored: serde_json::Value = client
        .get(format!("{}/api/rules/{}", app.address, rule["rule_id"].as_str().unwrap()))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["times_applied"], 1);
    assert!(stored["last_applied_utc"].is_string());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn apply_with_uncategorized_only_leaves_categorized_rows_alone() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;

    // One transaction already categorized, one not, same merchant
    let response = client
        .post(format!("{}/api/transactions", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "account_id": account_id,
            "posted_date": "2025-06-01",
            "amount": "-50.00",
            "merchant_name": "Delta Air",
            "category_primary": "Travel"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);
    create_test_transaction(&app, &client, account_id, "2025-06-02", "-60.00", Some("Delta Air")).await;

    create_rule(
        &app,
        &client,
        json!({
            "name": "Flights",
            "apply_to": "existing",
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "delta" }
            ],
            "actions": [
                { "action_type": "set_category", "action_value": "Flights" }
            ]
        }),
    )
    .await;

    let response = client
        .post(format!("{}/api/rules/apply", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "uncategorized_only": true }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["evaluated"], 1);
    assert_eq!(body["matched"], 1);

    // The pre-categorized row kept its category
    let list: serde_json::Value = client
        .get(format!("{}/api/transactions?category=Travel", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["transactions"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn higher_priority_rule_claims_the_transaction() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    create_test_transaction(&app, &client, account_id, "2025-06-01", "-42.00", Some("Whole Foods")).await;

    create_rule(
        &app,
        &client,
        json!({
            "name": "Catch-all",
            "apply_to": "existing",
            "priority": 1,
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "whole" }
            ],
            "actions": [{ "action_type": "set_category", "action_value": "Misc" }]
        }),
    )
    .await;
    create_rule(
        &app,
        &client,
        json!({
            "name": "Groceries",
            "apply_to": "existing",
            "priority": 10,
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "whole" }
            ],
            "actions": [{ "action_type": "set_category", "action_value": "Groceries" }]
        }),
    )
    .await;

    let response = client
        .post(format!("{}/api/rules/apply", app.address))
        .bearer_auth(app.token())
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["matched"], 1);
    let hits = body["rules"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Groceries");

    let list: serde_json::Value = client
        .get(format!(
            "{}/api/transactions?category=Groceries",
            app.address
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["transactions"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn single_scope_rules_fire_only_when_targeted() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    let created =
        create_test_transaction(&app, &client, account_id, "2025-06-01", "-42.00", Some("Whole Foods")).await;
    let transaction_id = created["transaction_id"].as_str().unwrap();

    create_rule(
        &app,
        &client,
        json!({
            "name": "On demand",
            "apply_to": "single",
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "whole" }
            ],
            "actions": [{ "action_type": "set_category", "action_value": "Groceries" }]
        }),
    )
    .await;

    // A batch run does not pick it up
    let body: serde_json::Value = client
        .post(format!("{}/api/rules/apply", app.address))
        .bearer_auth(app.token())
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["matched"], 0);

    // Targeting the transaction does
    let body: serde_json::Value = client
        .post(format!("{}/api/rules/apply", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "transaction_id": transaction_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["evaluated"], 1);
    assert_eq!(body["matched"], 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn preview_reports_matches_without_persisting() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    let created =
        create_test_transaction(&app, &client, account_id, "2025-06-01", "-42.00", Some("Whole Foods")).await;
    let transaction_id = created["transaction_id"].as_str().unwrap();

    // Inactive and new-scope on purpose; preview ignores both
    let rule = create_rule(
        &app,
        &client,
        json!({
            "name": "Draft rule",
            "apply_to": "new",
            "is_active": false,
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "whole" }
            ],
            "actions": [{ "action_type": "set_category", "action_value": "Groceries" }]
        }),
    )
    .await;
    let rule_id = rule["rule_id"].as_str().unwrap();

    let response = client
        .post(format!("{}/api/rules/{}/preview", app.address, rule_id))
        .bearer_auth(app.token())
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["evaluated"], 1);
    assert_eq!(body["matches"], 1);
    let patches = body["patches"].as_array().unwrap();
    assert_eq!(patches[0]["transaction_id"], transaction_id);
    assert_eq!(patches[0]["category"], "Groceries");

    // Nothing was written
    let stored: serde_json::Value = client
        .get(format!(
            "{}/api/transactions/{}",
            app.address, transaction_id
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["category_primary"], serde_json::Value::Null);

    let stored: serde_json::Value = client
        .get(format!("{}/api/rules/{}", app.address, rule_id))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["times_applied"], 0);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn update_rule_replaces_conditions_wholesale() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let rule = create_rule(
        &app,
        &client,
        json!({
            "name": "Two conditions",
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "a" },
                { "field": "amount", "operator": "greater_than", "value": "10" }
            ],
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
    )
    .await;
    let rule_id = rule["rule_id"].as_str().unwrap();
    assert_eq!(rule["conditions"].as_array().unwrap().len(), 2);

    let response = client
        .patch(format!("{}/api/rules/{}", app.address, rule_id))
        .bearer_auth(app.token())
        .json(&json!({
            "priority": 5,
            "conditions": [
                { "field": "description", "operator": "regex", "value": "^ACH" }
            ]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Two conditions");
    assert_eq!(body["priority"], 5);
    let conditions = body["conditions"].as_array().unwrap();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0]["field"], "description");
    // Actions were not sent, so they survive
    assert_eq!(body["actions"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn delete_rule_removes_it() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let rule = create_rule(
        &app,
        &client,
        json!({
            "name": "Short lived",
            "actions": [{ "action_type": "set_category", "action_value": "X" }]
        }),
    )
    .await;
    let rule_id = rule["rule_id"].as_str().unwrap();

    let response = client
        .delete(format!("{}/api/rules/{}", app.address, rule_id))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/api/rules/{}", app.address, rule_id))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{}/api/rules/{}", app.address, Uuid::new_v4()))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
