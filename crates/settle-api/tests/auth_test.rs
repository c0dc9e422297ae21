//! Webhook token authentication tests.
//!
//! A rejected call must not reach Asaas or the billing store, whatever its
//! body looks like.

#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use serde_json::json;
use settle_testing::{payment_event, BillingRecordBuilder, TestEnv, WebhookRequest, TEST_WEBHOOK_TOKEN};

fn invalid_token() -> serde_json::Value {
    json!({ "ok": false, "error": "invalid_token" })
}

async fn assert_untouched(env: &TestEnv) {
    assert_eq!(env.provider_calls().await, 0, "provider must not be called");
    assert_eq!(env.store.find_calls(), 0, "store must not be queried");
    assert_eq!(env.store.update_calls(), 0, "store must not be updated");
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let env = TestEnv::new().await;
    env.mock_payment("pay_1", "RECEIVED").await;
    env.insert_record(BillingRecordBuilder::new("pay_1").build()).await;

    let response = env
        .send(env.request().json(&payment_event("PAYMENT_RECEIVED", "pay_1")).build())
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, invalid_token());
    assert_untouched(&env).await;
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let env = TestEnv::new().await;
    env.mock_payment("pay_1", "RECEIVED").await;

    let response = env
        .send(
            env.request()
                .header_token("not-the-token")
                .json(&payment_event("PAYMENT_RECEIVED", "pay_1"))
                .build(),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, invalid_token());
    assert_untouched(&env).await;
}

#[tokio::test]
async fn token_is_checked_before_body() {
    let env = TestEnv::new().await;

    let response = env.send(env.request().header_token("nope").raw_body("{not json").build()).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_untouched(&env).await;
}

#[tokio::test]
async fn token_comparison_is_exact() {
    let env = TestEnv::new().await;

    for candidate in [
        TEST_WEBHOOK_TOKEN.to_uppercase(),
        format!("{TEST_WEBHOOK_TOKEN} "),
        TEST_WEBHOOK_TOKEN[..TEST_WEBHOOK_TOKEN.len() - 1].to_string(),
    ] {
        let response = env.send(env.request().query_token(candidate).json(&json!({})).build()).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    assert_untouched(&env).await;
}

#[tokio::test]
async fn query_token_is_accepted() {
    let env = TestEnv::new().await;

    let response = env.send(env.request().query_token(TEST_WEBHOOK_TOKEN).json(&json!({})).build()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "ok": true, "message": "no_payment_id" }));
}

#[tokio::test]
async fn header_token_is_accepted() {
    let env = TestEnv::new().await;

    let response = env.send(env.request().header_token(TEST_WEBHOOK_TOKEN).json(&json!({})).build()).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn query_token_takes_precedence_over_header() {
    let env = TestEnv::new().await;

    let wrong_query = env
        .send(env.request().both_tokens("wrong", TEST_WEBHOOK_TOKEN).json(&json!({})).build())
        .await;
    assert_eq!(wrong_query.status, StatusCode::UNAUTHORIZED);

    let right_query = env
        .send(env.request().both_tokens(TEST_WEBHOOK_TOKEN, "wrong").json(&json!({})).build())
        .await;
    assert_eq!(right_query.status, StatusCode::OK);
}

#[tokio::test]
async fn empty_query_token_falls_back_to_header() {
    let env = TestEnv::new().await;

    let response = env
        .send(env.request().both_tokens("", TEST_WEBHOOK_TOKEN).json(&json!({})).build())
        .await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn repeated_query_token_is_rejected_despite_valid_header() {
    let env = TestEnv::new().await;
    env.mock_payment("pay_1", "RECEIVED").await;

    let route = format!("{}?token=wrong&token=alsowrong", env.webhook_route());
    let response = env
        .send(
            WebhookRequest::new(route)
                .header_token(TEST_WEBHOOK_TOKEN)
                .json(&payment_event("PAYMENT_RECEIVED", "pay_1"))
                .build(),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, invalid_token());
    assert_untouched(&env).await;
}
