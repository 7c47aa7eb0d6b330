//! HTTP API tests
//!
//! The router runs against the in-memory ledger; requests go through the
//! full middleware stack via `axum_test::TestServer`.

use std::str::FromStr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum_test::TestServer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use core_kernel::{Currency, UserId};
use domain_billing::ports::mock::MockLedgerPort;
use domain_billing::LedgerService;
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState};

const SECRET: &str = "api-test-secret";

fn app() -> TestServer {
    let ledger = LedgerService::new(Arc::new(MockLedgerPort::new()), Currency::IDR);
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    };
    TestServer::new(create_router(AppState::new(ledger, config))).unwrap()
}

fn token(roles: &[&str]) -> String {
    create_token(
        &UserId::new().to_string(),
        roles.iter().map(|r| r.to_string()).collect(),
        SECRET,
        300,
    )
    .unwrap()
}

fn admin() -> String {
    token(&["admin"])
}

async fn send(
    app: &TestServer,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = app.method(method, uri);
    if let Some(token) = token {
        request = request.authorization_bearer(token);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.await;
    let text = response.text();
    let value = serde_json::from_str(&text).unwrap_or(Value::Null);
    (response.status_code(), value)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {}", other),
    }
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

async fn create_bill(app: &TestServer, token: &str, amount: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/bills",
        Some(token),
        Some(json!({
            "student_id": Uuid::new_v4(),
            "category_id": Uuid::new_v4(),
            "academic_year_id": Uuid::new_v4(),
            "month": 1,
            "amount_due": amount,
            "due_date": "2025-01-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

async fn record_payment(app: &TestServer, token: &str, bill_id: &str, amount: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/payments",
        Some(token),
        Some(json!({
            "bill_id": bill_id,
            "amount": amount,
            "method": "bank_transfer",
            "paid_on": "2025-01-15"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

mod access {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_store() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"]["adapter_id"], "mock-ledger-port");
    }

    #[tokio::test]
    async fn test_ledger_requires_token() {
        let app = app();
        let (status, _) = send(&app, Method::GET, "/api/v1/bills/due", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected() {
        let app = app();
        let (status, _) = send(&app, Method::GET, "/api/v1/bills/due", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_clerk_cannot_verify() {
        let app = app();
        let clerk = token(&[permissions::BILL_WRITE, permissions::PAYMENT_WRITE]);
        let bill = create_bill(&app, &clerk, "300000").await;
        let payment = record_payment(&app, &clerk, &id(&bill), "300000").await;

        let uri = format!("/api/v1/payments/{}/verify", id(&payment));
        let (status, body) = send(&app, Method::POST, &uri, Some(&clerk), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }
}

mod bills_and_payments {
    use super::*;

    #[tokio::test]
    async fn test_payment_lifecycle_drives_bill_status() {
        let app = app();
        let token = admin();
        let bill = create_bill(&app, &token, "300000").await;
        assert_eq!(bill["status"], "unpaid");

        let payment = record_payment(&app, &token, &id(&bill), "100000").await;
        assert_eq!(payment["status"], "pending");
        assert!(payment["receipt_number"].as_str().unwrap().starts_with("KWT/2025/01/"));

        let uri = format!("/api/v1/payments/{}/verify", id(&payment));
        let (status, _) = send(&app, Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/v1/bills/{}", id(&bill));
        let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(body["status"], "partial");
        assert_eq!(decimal(&body["amount_paid"]), dec!(100000));
        assert_eq!(body["balance_due_display"], "Rp 200.000");

        let top_up = record_payment(&app, &token, &id(&bill), "200000").await;
        let uri = format!("/api/v1/payments/{}/verify", id(&top_up));
        send(&app, Method::POST, &uri, Some(&token), None).await;

        let uri = format!("/api/v1/bills/{}", id(&bill));
        let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(body["status"], "paid");
        assert_eq!(decimal(&body["amount_paid"]), dec!(300000));
    }

    #[tokio::test]
    async fn test_cancelling_twice_is_a_conflict() {
        let app = app();
        let token = admin();
        let bill = create_bill(&app, &token, "300000").await;
        let payment = record_payment(&app, &token, &id(&bill), "300000").await;

        let uri = format!("/api/v1/payments/{}/cancel", id(&payment));
        let reason = json!({ "reason": "Duplicate receipt" });
        let (status, _) = send(&app, Method::POST, &uri, Some(&token), Some(reason.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(reason)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_invalid_bill_input_is_unprocessable() {
        let app = app();
        let token = admin();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/bills",
            Some(&token),
            Some(json!({
                "student_id": Uuid::new_v4(),
                "category_id": Uuid::new_v4(),
                "academic_year_id": Uuid::new_v4(),
                "month": 13,
                "amount_due": "300000",
                "due_date": "2025-01-10"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/bills",
            Some(&token),
            Some(json!({
                "student_id": Uuid::new_v4(),
                "category_id": Uuid::new_v4(),
                "academic_year_id": Uuid::new_v4(),
                "amount_due": "0",
                "due_date": "2025-01-10"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_bill_is_not_found() {
        let app = app();
        let uri = format!("/api/v1/bills/{}", Uuid::new_v4());
        let (status, body) = send(&app, Method::GET, &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_due_bills_lists_outstanding_only() {
        let app = app();
        let token = admin();
        let open = create_bill(&app, &token, "150000").await;
        let settled = create_bill(&app, &token, "150000").await;
        let payment = record_payment(&app, &token, &id(&settled), "150000").await;
        let uri = format!("/api/v1/payments/{}/verify", id(&payment));
        send(&app, Method::POST, &uri, Some(&token), None).await;

        let uri = "/api/v1/bills/due?as_of=2025-02-01";
        let (status, body) = send(&app, Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> =
            body.as_array().unwrap().iter().map(|b| b["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![id(&open).as_str()]);
    }
}

mod transactions {
    use super::*;

    #[tokio::test]
    async fn test_multi_bill_transaction() {
        let app = app();
        let token = admin();
        let first = create_bill(&app, &token, "150000").await;
        let second = create_bill(&app, &token, "150000").await;

        let (status, trx) = send(
            &app,
            Method::POST,
            "/api/v1/transactions",
            Some(&token),
            Some(json!({
                "payer_id": Uuid::new_v4(),
                "method": "qris",
                "paid_on": "2025-01-20",
                "proof_reference": "proofs/2025/01/abc.jpg"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(trx["transaction_number"].as_str().unwrap().starts_with("TRX/2025/01/"));

        for bill in [&first, &second] {
            let uri = format!("/api/v1/transactions/{}/items", id(&trx));
            let (status, _) = send(
                &app,
                Method::POST,
                &uri,
                Some(&token),
                Some(json!({ "bill_id": id(bill), "amount": "150000" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let uri = format!("/api/v1/transactions/{}", id(&trx));
        let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(decimal(&body["total_amount"]), dec!(300000));
        assert_eq!(body["items"].as_array().unwrap().len(), 2);

        let uri = format!("/api/v1/transactions/{}/verify", id(&trx));
        let (status, _) = send(&app, Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        for bill in [&first, &second] {
            let uri = format!("/api/v1/bills/{}", id(bill));
            let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
            assert_eq!(body["status"], "paid");
        }

        let uri = format!("/api/v1/transactions/{}/cancel", id(&trx));
        let reason = json!({ "reason": "Bounced" });
        let (status, _) = send(&app, Method::POST, &uri, Some(&token), Some(reason)).await;
        assert_eq!(status, StatusCode::OK);

        for bill in [&first, &second] {
            let uri = format!("/api/v1/bills/{}", id(bill));
            let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await;
            assert_eq!(body["status"], "unpaid");
            assert_eq!(decimal(&body["amount_paid"]), Decimal::ZERO);
        }
    }
}

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn test_import_auto_match_and_verify() {
        let app = app();
        let token = admin();
        let bill = create_bill(&app, &token, "300000").await;
        let payment = record_payment(&app, &token, &id(&bill), "300000").await;
        let uri = format!("/api/v1/payments/{}/verify", id(&payment));
        send(&app, Method::POST, &uri, Some(&token), None).await;
        let receipt = payment["receipt_number"].as_str().unwrap();

        let (status, batch) = send(
            &app,
            Method::POST,
            "/api/v1/reconciliation/batches",
            Some(&token),
            Some(json!({
                "file_name": "bca-2025-01.csv",
                "period_start": "2025-01-01",
                "period_end": "2025-01-31",
                "lines": [
                    {
                        "transaction_date": "2025-01-15",
                        "description": format!("TRSF E-BANKING CR {}", receipt),
                        "amount": "300000",
                        "direction": "credit"
                    },
                    {
                        "transaction_date": "2025-01-16",
                        "description": "BIAYA ADM",
                        "amount": "15000",
                        "direction": "debit"
                    }
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", batch);
        assert_eq!(batch["total_transactions"], 2);
        assert_eq!(batch["unmatched_count"], 1);

        let uri = format!("/api/v1/reconciliation/batches/{}/auto-match", id(&batch));
        let (status, matched) = send(&app, Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(matched["matched_count"], 1);
        assert_eq!(matched["unmatched_count"], 0);
        assert_eq!(matched["status"], "completed");

        let uri = format!("/api/v1/reconciliation/batches/{}/verify", id(&batch));
        let (status, verified) = send(&app, Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["status"], "verified");

        let uri = format!("/api/v1/payments/{}/cancel", id(&payment));
        let reason = json!({ "reason": "Reversed by bank" });
        let (status, _) = send(&app, Method::POST, &uri, Some(&token), Some(reason)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let uri = format!("/api/v1/reconciliation/batches/{}", id(&batch));
        let (_, detail) = send(&app, Method::GET, &uri, Some(&token), None).await;
        let lines = detail["lines"].as_array().unwrap();
        assert_eq!(lines[0]["match_type"], "auto");
        assert_eq!(lines[0]["matched_payment_id"], payment["id"]);
        assert_eq!(lines[1]["match_type"], "unmatched");
    }

    #[tokio::test]
    async fn test_empty_statement_is_rejected() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/reconciliation/batches",
            Some(&admin()),
            Some(json!({
                "file_name": "empty.csv",
                "period_start": "2025-01-01",
                "period_end": "2025-01-31",
                "lines": []
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
