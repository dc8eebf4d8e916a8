use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use motordesk::models::{payment, work_order::WorkOrderDto, work_order_item::WorkOrderItemDto};
use motordesk::services::{invoice_service, work_order_service};
use motordesk::{api, db, stripe};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use serial_test::serial;
use tower::util::ServiceExt; // for `oneshot`

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

// Helper to build a work order with one labor line and its invoice
async fn invoice_fixture(db: &DatabaseConnection, amount: f64) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let customer = motordesk::models::customer::ActiveModel {
        first_name: Set("John".to_string()),
        last_name: Set("Doe".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create customer");

    let vehicle = motordesk::models::vehicle::ActiveModel {
        customer_id: Set(customer.id),
        plate_number: Set("ABC123".to_string()),
        make: Set("Toyota".to_string()),
        model: Set("Corolla".to_string()),
        year: Set(2018),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create vehicle");

    let wo = work_order_service::create_work_order(
        db,
        WorkOrderDto {
            id: None,
            vehicle_id: vehicle.id,
            problem_description: "Engine overhaul".to_string(),
            odometer: None,
        },
    )
    .await
    .expect("Failed to create work order");

    work_order_service::add_item(
        db,
        wo.id,
        WorkOrderItemDto {
            item_type: "Labor".to_string(),
            part_id: None,
            description: Some("Engine work".to_string()),
            quantity: 1.0,
            unit_price: Some(amount),
        },
    )
    .await
    .expect("Failed to add item");

    let (inv, _) = invoice_service::generate_for_work_order(db, wo.id)
        .await
        .expect("Failed to generate invoice");
    inv.id
}

fn completed_event(invoice_id: i32, payment_intent: &str, amount_cents: i64) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_session",
                "payment_intent": payment_intent,
                "amount_total": amount_cents,
                "metadata": { "invoice_id": invoice_id.to_string() }
            }
        }
    }))
    .unwrap()
}

fn webhook_request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/webhooks/stripe")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(sig) = signature {
        builder = builder.header("Stripe-Signature", sig);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
#[serial]
async fn signed_delivery_settles_the_invoice() {
    unsafe { std::env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test") };

    let db = setup_test_db().await;
    let invoice_id = invoice_fixture(&db, 125.50).await;
    let app = api::api_router(db.clone());

    let body = completed_event(invoice_id, "pi_settle", 12550);
    let signature = stripe::signature_header("whsec_test", chrono::Utc::now().timestamp(), &body);

    let response = app
        .oneshot(webhook_request(body, Some(signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "applied");
    assert_eq!(json["invoice"]["status"], "Paid");
    assert_eq!(json["payment"]["amount"], 125.50);
    assert_eq!(json["payment"]["provider_ref"], "pi_settle");

    let inv = motordesk::models::invoice::Entity::find_by_id(invoice_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inv.status, "Paid");

    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };
}

#[tokio::test]
#[serial]
async fn redelivery_credits_exactly_once() {
    unsafe { std::env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test") };

    let db = setup_test_db().await;
    let invoice_id = invoice_fixture(&db, 200.0).await;
    let app = api::api_router(db.clone());

    // Partial confirmation, delivered twice
    let body = completed_event(invoice_id, "pi_partial", 5000);
    let signature = stripe::signature_header("whsec_test", chrono::Utc::now().timestamp(), &body);

    let response = app
        .clone()
        .oneshot(webhook_request(body.clone(), Some(signature.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "applied");

    let response = app
        .oneshot(webhook_request(body, Some(signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "duplicate");

    let payments = payment::Entity::find().all(&db).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, 50.0);

    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };
}

#[tokio::test]
#[serial]
async fn tampered_delivery_is_rejected_without_side_effects() {
    unsafe { std::env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test") };

    let db = setup_test_db().await;
    let invoice_id = invoice_fixture(&db, 100.0).await;
    let app = api::api_router(db.clone());

    let body = completed_event(invoice_id, "pi_forged", 10000);
    // Signature computed over a different body
    let signature =
        stripe::signature_header("whsec_test", chrono::Utc::now().timestamp(), b"other body");

    let response = app
        .clone()
        .oneshot(webhook_request(body.clone(), Some(signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing header entirely is just as fatal
    let response = app.oneshot(webhook_request(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let count = payment::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 0);

    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };
}

#[tokio::test]
#[serial]
async fn unsigned_delivery_is_accepted_without_a_secret() {
    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };

    let db = setup_test_db().await;
    let invoice_id = invoice_fixture(&db, 80.0).await;
    let app = api::api_router(db.clone());

    let body = completed_event(invoice_id, "pi_dev_mode", 8000);
    let response = app.oneshot(webhook_request(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "applied");
}

#[tokio::test]
#[serial]
async fn unrelated_events_are_ignored() {
    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };

    let db = setup_test_db().await;
    let app = api::api_router(db.clone());

    let body = serde_json::to_vec(&serde_json::json!({
        "type": "invoice.payment_failed",
        "data": { "object": { "id": "cs_x" } }
    }))
    .unwrap();
    let response = app.oneshot(webhook_request(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ignored");
}

#[tokio::test]
#[serial]
async fn unknown_invoice_is_acknowledged_and_dropped() {
    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };

    let db = setup_test_db().await;
    let app = api::api_router(db.clone());

    // No such invoice; the gateway still gets a 200 so it stops retrying
    let body = completed_event(999, "pi_orphan", 5000);
    let response = app.oneshot(webhook_request(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ignored");

    let count = payment::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn settled_invoice_acknowledges_late_confirmations() {
    unsafe { std::env::remove_var("STRIPE_WEBHOOK_SECRET") };

    let db = setup_test_db().await;
    let invoice_id = invoice_fixture(&db, 60.0).await;

    invoice_service::record_payment(
        &db,
        invoice_id,
        payment::PaymentDto {
            amount: 60.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();

    let app = api::api_router(db.clone());
    let body = completed_event(invoice_id, "pi_late", 6000);
    let response = app.oneshot(webhook_request(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "already_settled");

    // Only the manual payment exists
    let count = payment::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 1);
}
