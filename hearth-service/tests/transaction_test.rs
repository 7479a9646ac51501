//! Transaction CRUD, import and labeling integration tests.

mod common;

use common::{create_test_account, create_test_transaction, TestApp};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

fn d(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("expected decimal string")).unwrap()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL - run with integ-tests.sh
async fn create_transaction_succeeds() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;

    let response = client
        .post(format!("{}/api/transactions", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "account_id": account_id,
            "posted_date": "2025-06-15",
            "amount": "-42.50",
            "merchant_name": "Whole Foods Market",
            "description": "POS PURCHASE"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert!(body.get("transaction_id").is_some());
    assert_eq!(body["account_id"], account_id.to_string());
    assert_eq!(body["posted_date"], "2025-06-15");
    assert_eq!(d(&body["amount"]), Decimal::from_str("-42.50").unwrap());
    assert_eq!(body["merchant_name"], "Whole Foods Market");
    assert_eq!(body["category_primary"], serde_json::Value::Null);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn create_transaction_rejects_unknown_account() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/transactions", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "account_id": uuid::Uuid::new_v4(),
            "posted_date": "2025-06-15",
            "amount": "-5.00"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn new_transactions_are_categorized_by_matching_rules() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;

    let response = client
        .post(format!("{}/api/rules", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "name": "Coffee shops",
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "starbucks" }
            ],
            "actions": [
                { "action_type": "set_category", "action_value": "Dining" }
            ]
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);

    // Matching merchant is categorized in the create response itself
    let categorized =
        create_test_transaction(&app, &client, account_id, "2025-06-16", "-6.40", Some("STARBUCKS #4821")).await;
    assert_eq!(categorized["category_primary"], "Dining");

    // Non-matching merchant is left alone
    let untouched =
        create_test_transaction(&app, &client, account_id, "2025-06-17", "-30.00", Some("Shell Gas")).await;
    assert_eq!(untouched["category_primary"], serde_json::Value::Null);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn import_skips_duplicates_by_hash() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;

    let batch = json!({
        "transactions": [
            {
                "account_id": account_id,
                "posted_date": "2025-05-01",
                "amount": "-12.00",
                "merchant_name": "Cafe One",
                "import_hash": "hash-a"
            },
            {
                "account_id": account_id,
                "posted_date": "2025-05-02",
                "amount": "-24.00",
                "merchant_name": "Cafe Two",
                "import_hash": "hash-b"
            }
        ]
    });

    let response = client
        .post(format!("{}/api/transactions/import", app.address))
        .bearer_auth(app.token())
        .json(&batch)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["imported"], 2);
    assert_eq!(body["skipped"], 0);

    // Re-importing the same batch skips everything
    let response = client
        .post(format!("{}/api/transactions/import", app.address))
        .bearer_auth(app.token())
        .json(&batch)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["imported"], 0);
    assert_eq!(body["skipped"], 2);

    let list: serde_json::Value = client
        .get(format!("{}/api/transactions", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["transactions"].as_array().unwrap().len(), 2);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn import_runs_rules_over_the_batch() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;

    let response = client
        .post(format!("{}/api/rules", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "name": "Groceries",
            "apply_to": "new",
            "conditions": [
                { "field": "merchant_name", "operator": "contains", "value": "market" }
            ],
            "actions": [
                { "action_type": "set_category", "action_value": "Groceries" }
            ]
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{}/api/transactions/import", app.address))
        .bearer_auth(app.token())
        .json(&json!({
            "transactions": [
                {
                    "account_id": account_id,
                    "posted_date": "2025-05-03",
                    "amount": "-88.10",
                    "merchant_name": "Central Market",
                    "import_hash": "hash-1"
                },
                {
                    "account_id": account_id,
                    "posted_date": "2025-05-04",
                    "amount": "-9.99",
                    "merchant_name": "Gas Station",
                    "import_hash": "hash-2"
                }
            ]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["imported"], 2);
    assert_eq!(body["rules"]["evaluated"], 2);
    assert_eq!(body["rules"]["matched"], 1);

    // The matched transaction carries the category afterwards
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
    let transactions = list["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["merchant_name"], "Central Market");

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn import_rejects_an_empty_batch() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/transactions/import", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "transactions": [] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn list_transactions_paginates_newest_first() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    create_test_transaction(&app, &client, account_id, "2025-06-01", "-10", Some("One")).await;
    create_test_transaction(&app, &client, account_id, "2025-06-02", "-20", Some("Two")).await;
    create_test_transaction(&app, &client, account_id, "2025-06-03", "-30", Some("Three")).await;

    let page1: serde_json::Value = client
        .get(format!("{}/api/transactions?page_size=2", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let transactions = page1["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["merchant_name"], "Three");
    assert_eq!(transactions[1]["merchant_name"], "Two");
    let token = page1["next_page_token"].as_str().expect("expected a page token");

    let page2: serde_json::Value = client
        .get(format!(
            "{}/api/transactions?page_size=2&page_token={}",
            app.address, token
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let transactions = page2["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["merchant_name"], "One");
    assert!(page2["next_page_token"].is_null());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn list_transactions_filters_by_date_range_and_search() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    create_test_transaction(&app, &client, account_id, "2025-04-10", "-15", Some("Corner Bakery")).await;
    create_test_transaction(&app, &client, account_id, "2025-05-10", "-25", Some("Hardware Store")).await;
    create_test_transaction(&app, &client, account_id, "2025-06-10", "-35", Some("Bakery Deluxe")).await;

    let body: serde_json::Value = client
        .get(format!(
            "{}/api/transactions?from_date=2025-05-01&to_date=2025-05-31",
            app.address
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["merchant_name"], "Hardware Store");

    // Search matches merchant name case-insensitively
    let body: serde_json::Value = client
        .get(format!("{}/api/transactions?search=bakery", app.address))
        .bearer_auth(app.token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn update_transaction_patches_only_given_fields() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    let created =
        create_test_transaction(&app, &client, account_id, "2025-06-01", "-18.00", Some("Cafe")).await;
    let transaction_id = created["transaction_id"].as_str().unwrap();

    let response = client
        .patch(format!(
            "{}/api/transactions/{}",
            app.address, transaction_id
        ))
        .bearer_auth(app.token())
        .json(&json!({ "category_primary": "Dining" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["category_primary"], "Dining");
    assert_eq!(body["merchant_name"], "Cafe");
    assert_eq!(d(&body["amount"]), Decimal::from_str("-18.00").unwrap());

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn delete_transaction_removes_it() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    let created =
        create_test_transaction(&app, &client, account_id, "2025-06-01", "-18.00", None).await;
    let transaction_id = created["transaction_id"].as_str().unwrap();

    let response = client
        .delete(format!(
            "{}/api/transactions/{}",
            app.address, transaction_id
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!(
            "{}/api/transactions/{}",
            app.address, transaction_id
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn labels_attach_and_detach_manually() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let account_id = create_test_account(&app, &client, "Checking", "checking", "1000").await;
    let created =
        create_test_transaction(&app, &client, account_id, "2025-06-01", "-60.00", Some("Airline")).await;
    let transaction_id = created["transaction_id"].as_str().unwrap();

    let response = client
        .post(format!("{}/api/labels", app.address))
        .bearer_auth(app.token())
        .json(&json!({ "name": "vacation", "color": "#00aaff" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 201);
    let label: serde_json::Value = response.json().await.unwrap();
    let label_id = label["label_id"].as_str().unwrap();

    // Attach, twice (idempotent)
    for _ in 0..2 {
        let response = client
            .put(format!(
                "{}/api/transactions/{}/labels/{}",
                app.address, transaction_id, label_id
            ))
            .bearer_auth(app.token())
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 204);
    }

    let body: serde_json::Value = client
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
    let labels = body["labels"].as_array().unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0]["name"], "vacation");

    // Detach
    let response = client
        .delete(format!(
            "{}/api/transactions/{}/labels/{}",
            app.address, transaction_id, label_id
        ))
        .bearer_auth(app.token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let body: serde_json::Value = client
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
    assert!(body["labels"].as_array().unwrap().is_empty());

    app.cleanup().await;
}
