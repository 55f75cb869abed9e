use crate::helpers::{checkout_completed, spawn_app, subscription_event, TestApp};
use chrono::Utc;
use serde_json::{json, Value};

async fn subscription_of(app: &TestApp, owner: &reqwest::Client) -> Value {
    owner
        .get(app.url("/api/subscriptions/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn a_completed_checkout_activates_the_plan() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Haute", "Pau").await;

    // act
    let response = app
        .post_webhook(&checkout_completed(producer_id, "premium", "sub_haute"))
        .await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "received": true }));
    let subscription = subscription_of(&app, &owner).await;
    assert_eq!(subscription["status"], "active");
    assert_eq!(subscription["effective_plan"], "premium");
}

#[tokio::test]
async fn invoices_extend_the_period_and_failures_cancel() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Haute", "Pau").await;
    app.activate_subscription(producer_id, "standard", "sub_haute").await;

    // act
    let paid = app
        .post_webhook(&subscription_event(
            "invoice.paid",
            json!({
                "subscription": "sub_haute",
                "lines": { "data": [{ "period": { "start": 1767225600, "end": 1769904000 } }] }
            }),
        ))
        .await;
    let after_paid = subscription_of(&app, &owner).await;
    let failed = app
        .post_webhook(&subscription_event(
            "invoice.payment_failed",
            json!({ "subscription": "sub_haute" }),
        ))
        .await;
    let after_failed = subscription_of(&app, &owner).await;

    // assert
    assert_eq!(paid.status().as_u16(), 200);
    assert_eq!(after_paid["status"], "active");
    assert_eq!(after_paid["current_period_end"], "2026-02-01T00:00:00");
    assert_eq!(failed.status().as_u16(), 200);
    assert_eq!(after_failed["status"], "canceled");
    assert_eq!(after_failed["effective_plan"], "free");
}

#[tokio::test]
async fn provider_status_updates_and_deletions_are_applied() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Haute", "Pau").await;
    app.activate_subscription(producer_id, "standard", "sub_haute").await;

    // act
    app.post_webhook(&subscription_event(
        "customer.subscription.updated",
        json!({ "id": "sub_haute", "status": "past_due", "current_period_end": 1769904000 }),
    ))
    .await;
    let after_past_due = subscription_of(&app, &owner).await;
    app.post_webhook(&subscription_event(
        "customer.subscription.updated",
        json!({ "id": "sub_haute", "status": "active" }),
    ))
    .await;
    let after_recovery = subscription_of(&app, &owner).await;
    app.post_webhook(&subscription_event(
        "customer.subscription.deleted",
        json!({ "id": "sub_haute", "status": "canceled" }),
    ))
    .await;
    let after_deletion = subscription_of(&app, &owner).await;

    // assert
    assert_eq!(after_past_due["status"], "canceled");
    assert_eq!(after_recovery["status"], "active");
    assert_eq!(after_deletion["status"], "canceled");
}

#[tokio::test]
async fn unhandled_events_and_unknown_subscriptions_are_acknowledged() {
    // arrange
    let app = spawn_app().await;

    // act
    let unhandled = app
        .post_webhook(&subscription_event("customer.created", json!({ "id": "cus_1" })))
        .await;
    let unknown = app
        .post_webhook(&subscription_event(
            "customer.subscription.deleted",
            json!({ "id": "sub_nobody", "status": "canceled" }),
        ))
        .await;

    // assert
    assert_eq!(unhandled.status().as_u16(), 200);
    assert_eq!(unknown.status().as_u16(), 200);
}

#[tokio::test]
async fn unsigned_or_forged_webhooks_are_rejected_with_a_400() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Haute", "Pau").await;
    let payload = checkout_completed(producer_id, "premium", "sub_forged").to_string();
    let now = Utc::now().timestamp();
    let test_cases = vec![
        (None, "no signature"),
        (Some("t=yesterday,v1=deadbeef".to_string()), "a malformed signature"),
        (Some(format!("t={},v1={}", now, "00".repeat(32))), "a forged signature"),
        (Some(app.sign_webhook(&payload, now - 3600)), "an expired signature"),
    ];

    for (signature, description) in test_cases {
        // act
        let mut request = app
            .api_client
            .post(app.url("/api/stripe/webhook"))
            .header("Content-Type", "application/json")
            .body(payload.clone());
        if let Some(signature) = signature {
            request = request.header("Stripe-Signature", signature);
        }
        let response = request.send().await.unwrap();

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The webhook did not fail with 400 Bad Request for {}.",
            description
        );
    }
    let subscription = subscription_of(&app, &owner).await;
    assert_eq!(subscription["status"], "free");
}

#[tokio::test]
async fn large_events_are_accepted() {
    // arrange
    let app = spawn_app().await;
    let (owner, producer_id) = app.create_producer("Ferme Haute", "Pau").await;
    app.activate_subscription(producer_id, "standard", "sub_haute").await;
    let lines: Vec<Value> = (0..80)
        .map(|i| {
            json!({
                "id": format!("il_{:04}", i),
                "description": format!("Panier de saison, livraison n°{} {}", i, "x".repeat(120)),
                "period": { "start": 1767225600, "end": 1769904000 }
            })
        })
        .collect();
    let event = subscription_event(
        "invoice.payment_failed",
        json!({ "subscription": "sub_haute", "lines": { "data": lines } }),
    );
    assert!(event.to_string().len() > 16 * 1024);

    // act
    let response = app.post_webhook(&event).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let subscription = subscription_of(&app, &owner).await;
    assert_eq!(subscription["status"], "canceled");
}
