use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Days, Duration, TimeZone, Utc};
use motordesk::auth::{create_jwt, hash_password};
use motordesk::models::payment::PaymentDto;
use motordesk::models::work_order::WorkOrderDto;
use motordesk::models::work_order_item::WorkOrderItemDto;
use motordesk::services::{dashboard_service, invoice_service, work_order_service};
use motordesk::{api, db};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tower::util::ServiceExt; // for `oneshot`

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_test_customer(db: &DatabaseConnection) -> i32 {
    let now = Utc::now().to_rfc3339();
    let customer = motordesk::models::customer::ActiveModel {
        first_name: Set("John".to_string()),
        last_name: Set("Doe".to_string()),
        email: Set(Some("john.doe@test.com".to_string())),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    customer.insert(db).await.expect("Failed to create customer").id
}

async fn create_test_vehicle(db: &DatabaseConnection, customer_id: i32) -> i32 {
    let now = Utc::now().to_rfc3339();
    let vehicle = motordesk::models::vehicle::ActiveModel {
        customer_id: Set(customer_id),
        plate_number: Set(format!("TST{}", customer_id)),
        make: Set("Toyota".to_string()),
        model: Set("Corolla".to_string()),
        year: Set(2018),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    vehicle.insert(db).await.expect("Failed to create vehicle").id
}

async fn create_test_part(db: &DatabaseConnection, price: f64, stock: i32) -> i32 {
    let now = Utc::now().to_rfc3339();
    let part = motordesk::models::part::ActiveModel {
        name: Set("Oil Filter".to_string()),
        unit_price: Set(price),
        stock_quantity: Set(stock),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    part.insert(db).await.expect("Failed to create part").id
}

async fn create_work_order(db: &DatabaseConnection, vehicle_id: i32) -> i32 {
    work_order_service::create_work_order(
        db,
        WorkOrderDto {
            id: None,
            vehicle_id,
            problem_description: "Routine service".to_string(),
            odometer: None,
        },
    )
    .await
    .expect("Failed to create work order")
    .id
}

fn labor_item(description: &str, hours: f64, rate: f64) -> WorkOrderItemDto {
    WorkOrderItemDto {
        item_type: "Labor".to_string(),
        part_id: None,
        description: Some(description.to_string()),
        quantity: hours,
        unit_price: Some(rate),
    }
}

// Build a work order with one labor line and an invoice over it
async fn invoiced_work_order(db: &DatabaseConnection, vehicle_id: i32, amount: f64) -> i32 {
    let wo_id = create_work_order(db, vehicle_id).await;
    work_order_service::add_item(db, wo_id, labor_item("Labor", 1.0, amount))
        .await
        .expect("Failed to add item");
    let (invoice, _) = invoice_service::generate_for_work_order(db, wo_id)
        .await
        .expect("Failed to generate invoice");
    invoice.id
}

#[tokio::test]
async fn fresh_shop_reports_zeroes() {
    let db = setup_test_db().await;

    let stats = dashboard_service::stats(&db, None, None).await.unwrap();

    assert_eq!(stats.work_orders_created.today, 0);
    assert_eq!(stats.work_orders_created.this_month, 0);
    assert_eq!(stats.work_orders_closed.this_week, 0);
    assert_eq!(stats.payments_received.today, 0.0);
    assert_eq!(stats.revenue.parts, 0.0);
    assert_eq!(stats.revenue.labor, 0.0);
    assert_eq!(stats.outstanding_total, 0.0);
    assert!(stats.top_outstanding.is_empty());
    assert!(stats.todays_appointments.is_empty());

    // The labor series defaults to the trailing 30 days
    let today = Utc::now().date_naive();
    assert_eq!(stats.labor_revenue_range.to, today.to_string());
    assert_eq!(
        stats.labor_revenue_range.from,
        (today - Days::new(30)).to_string()
    );
}

#[tokio::test]
async fn counts_track_created_and_closed_orders() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;

    let first = create_work_order(&db, vehicle_id).await;
    let _second = create_work_order(&db, vehicle_id).await;
    work_order_service::set_status(&db, first, "Completed".to_string())
        .await
        .unwrap();

    let stats = dashboard_service::stats(&db, None, None).await.unwrap();

    // Orders created just now land in every period bucket
    assert_eq!(stats.work_orders_created.today, 2);
    assert_eq!(stats.work_orders_created.this_week, 2);
    assert_eq!(stats.work_orders_created.this_month, 2);
    assert_eq!(stats.work_orders_closed.today, 1);
    assert_eq!(stats.work_orders_closed.this_month, 1);
}

#[tokio::test]
async fn payments_roll_into_every_period_bucket() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let invoice_id = invoiced_work_order(&db, vehicle_id, 200.0).await;

    invoice_service::record_payment(
        &db,
        invoice_id,
        PaymentDto {
            amount: 60.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();

    // A stale payment from well before any period boundary stays out
    let old = (Utc::now() - Duration::days(40)).to_rfc3339();
    motordesk::models::payment::ActiveModel {
        invoice_id: Set(invoice_id),
        amount: Set(999.0),
        method: Set("Cash".to_string()),
        paid_at: Set(old.clone()),
        created_at: Set(old.clone()),
        updated_at: Set(old),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    let stats = dashboard_service::stats(&db, None, None).await.unwrap();
    assert_eq!(stats.payments_received.today, 60.0);
    assert_eq!(stats.payments_received.this_week, 60.0);
    assert_eq!(stats.payments_received.this_month, 60.0);
}

#[tokio::test]
async fn revenue_splits_parts_from_labor() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let part_id = create_test_part(&db, 25.0, 10).await;
    let wo_id = create_work_order(&db, vehicle_id).await;

    work_order_service::add_item(
        &db,
        wo_id,
        WorkOrderItemDto {
            item_type: "Part".to_string(),
            part_id: Some(part_id),
            description: None,
            quantity: 2.0,
            unit_price: None,
        },
    )
    .await
    .unwrap();
    work_order_service::add_item(&db, wo_id, labor_item("Oil change", 3.0, 80.0))
        .await
        .unwrap();

    let stats = dashboard_service::stats(&db, None, None).await.unwrap();
    assert_eq!(stats.revenue.parts, 50.0);
    assert_eq!(stats.revenue.labor, 240.0);
    // Items added today fall inside the default range
    assert_eq!(stats.labor_revenue_range.total, 240.0);
}

#[tokio::test]
async fn reversed_range_bounds_are_swapped() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_work_order(&db, vehicle_id).await;
    work_order_service::add_item(&db, wo_id, labor_item("Diagnosis", 1.0, 120.0))
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let earlier = today - Days::new(5);
    let stats = dashboard_service::stats(&db, Some(today), Some(earlier))
        .await
        .unwrap();

    assert_eq!(stats.labor_revenue_range.from, earlier.to_string());
    assert_eq!(stats.labor_revenue_range.to, today.to_string());
    assert_eq!(stats.labor_revenue_range.total, 120.0);
}

#[tokio::test]
async fn outstanding_invoices_rank_largest_first() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;

    let big = invoiced_work_order(&db, vehicle_id, 300.0).await;
    let partial = invoiced_work_order(&db, vehicle_id, 100.0).await;
    let settled = invoiced_work_order(&db, vehicle_id, 50.0).await;

    invoice_service::record_payment(
        &db,
        partial,
        PaymentDto {
            amount: 40.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();
    invoice_service::record_payment(
        &db,
        settled,
        PaymentDto {
            amount: 50.0,
            method: "Card".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();

    let stats = dashboard_service::stats(&db, None, None).await.unwrap();

    assert_eq!(stats.outstanding_total, 360.0);
    assert_eq!(stats.top_outstanding.len(), 2);
    assert_eq!(stats.top_outstanding[0].invoice_id, big);
    assert_eq!(stats.top_outstanding[0].outstanding, 300.0);
    assert_eq!(stats.top_outstanding[1].invoice_id, partial);
    assert_eq!(stats.top_outstanding[1].outstanding, 60.0);
    assert_eq!(
        stats.top_outstanding[0].customer_name.as_deref(),
        Some("John Doe")
    );
}

#[tokio::test]
async fn todays_appointments_exclude_other_days() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let now = Utc::now();
    let created = now.to_rfc3339();

    // Inserted directly; the booking rules only apply to new bookings
    let today_at_14 = now
        .date_naive()
        .and_hms_opt(14, 0, 0)
        .map(|n| Utc.from_utc_datetime(&n))
        .unwrap();
    let tomorrow_at_10 = (now.date_naive() + Days::new(1))
        .and_hms_opt(10, 0, 0)
        .map(|n| Utc.from_utc_datetime(&n))
        .unwrap();

    for (when, reason) in [
        (today_at_14, "Tire rotation"),
        (tomorrow_at_10, "Brake inspection"),
    ] {
        motordesk::models::appointment::ActiveModel {
            customer_id: Set(customer_id),
            scheduled_at: Set(when.to_rfc3339()),
            reason: Set(Some(reason.to_string())),
            status: Set("Pending".to_string()),
            created_at: Set(created.clone()),
            updated_at: Set(created.clone()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
    }

    let stats = dashboard_service::stats(&db, None, None).await.unwrap();
    assert_eq!(stats.todays_appointments.len(), 1);
    assert_eq!(
        stats.todays_appointments[0].reason.as_deref(),
        Some("Tire rotation")
    );
    assert_eq!(
        stats.todays_appointments[0].customer_name.as_deref(),
        Some("John Doe")
    );
}

#[tokio::test]
async fn dashboard_endpoint_wraps_stats_and_validates_dates() {
    let db = setup_test_db().await;
    let now = Utc::now().to_rfc3339();
    let admin = motordesk::models::user::ActiveModel {
        email: Set("admin@garage.local".to_string()),
        password_hash: Set(hash_password("Admin!12345").unwrap()),
        display_name: Set("Garage Admin".to_string()),
        role: Set("admin".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();
    let token = create_jwt(admin.id, &admin.email, &admin.role).unwrap();
    let app = api::api_router(db);

    let request = Request::builder()
        .uri("/dashboard")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["stats"]["work_orders_created"]["today"].is_number());
    assert!(body["stats"]["revenue"]["parts"].is_number());

    let request = Request::builder()
        .uri("/dashboard?from=22-08-2026")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
