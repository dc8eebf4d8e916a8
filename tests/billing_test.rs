use motordesk::db;
use motordesk::models::{part, payment, work_order::WorkOrderDto, work_order_item::WorkOrderItemDto};
use motordesk::services::{invoice_service, work_order_service, ServiceError};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_test_customer(db: &DatabaseConnection) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
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
    let now = chrono::Utc::now().to_rfc3339();
    let vehicle = motordesk::models::vehicle::ActiveModel {
        customer_id: Set(customer_id),
        plate_number: Set("ABC123".to_string()),
        make: Set("Toyota".to_string()),
        model: Set("Corolla".to_string()),
        year: Set(2018),
        odometer: Set(Some(65000)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    vehicle.insert(db).await.expect("Failed to create vehicle").id
}

async fn create_test_part(db: &DatabaseConnection, name: &str, price: f64, stock: i32) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let new_part = part::ActiveModel {
        name: Set(name.to_string()),
        unit_price: Set(price),
        stock_quantity: Set(stock),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    new_part.insert(db).await.expect("Failed to create part").id
}

async fn create_test_work_order(db: &DatabaseConnection, vehicle_id: i32) -> i32 {
    let wo = work_order_service::create_work_order(
        db,
        WorkOrderDto {
            id: None,
            vehicle_id,
            problem_description: "Grinding noise when braking".to_string(),
            odometer: Some(66000),
        },
    )
    .await
    .expect("Failed to create work order");
    wo.id
}

async fn stock_of(db: &DatabaseConnection, part_id: i32) -> i32 {
    part::Entity::find_by_id(part_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

fn part_item(part_id: i32, quantity: f64) -> WorkOrderItemDto {
    WorkOrderItemDto {
        item_type: "Part".to_string(),
        part_id: Some(part_id),
        description: None,
        quantity,
        unit_price: None,
    }
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

#[tokio::test]
async fn part_item_snapshots_price_and_decrements_stock() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let part_id = create_test_part(&db, "Front Brake Pads", 64.99, 10).await;

    let item = work_order_service::add_item(&db, wo_id, part_item(part_id, 2.0))
        .await
        .expect("Add item failed");

    // Description and price default from the part
    assert_eq!(item.description, "Front Brake Pads");
    assert_eq!(item.unit_price, 64.99);
    assert_eq!(item.quantity, 2.0);
    assert_eq!(stock_of(&db, part_id).await, 8);
}

#[tokio::test]
async fn insufficient_stock_rejects_and_leaves_no_trace() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let part_id = create_test_part(&db, "Oil Filter", 12.50, 3).await;

    let result = work_order_service::add_item(&db, wo_id, part_item(part_id, 5.0)).await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Not enough stock for Oil Filter. Available: 3.");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }

    // Stock untouched, no item row
    assert_eq!(stock_of(&db, part_id).await, 3);
    let items = work_order_service::items_for(&db, wo_id).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn fractional_part_quantity_is_rejected() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let part_id = create_test_part(&db, "Oil Filter", 12.50, 10).await;

    let result = work_order_service::add_item(&db, wo_id, part_item(part_id, 1.5)).await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Part quantity must be a whole number.");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert_eq!(stock_of(&db, part_id).await, 10);
}

#[tokio::test]
async fn labor_requires_a_description_and_parts_a_part() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    let result = work_order_service::add_item(&db, wo_id, labor_item("", 1.0, 80.0)).await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Description is required for labor.");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }

    let no_part = WorkOrderItemDto {
        item_type: "Part".to_string(),
        part_id: None,
        description: None,
        quantity: 1.0,
        unit_price: None,
    };
    let result = work_order_service::add_item(&db, wo_id, no_part).await;
    match result {
        Err(ServiceError::Validation(msg)) => assert_eq!(msg, "Select a part."),
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn violations_accumulate_in_one_message() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    // Zero quantity and no part selected at once
    let bad = WorkOrderItemDto {
        item_type: "Part".to_string(),
        part_id: None,
        description: None,
        quantity: 0.0,
        unit_price: None,
    };
    let result = work_order_service::add_item(&db, wo_id, bad).await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert!(msg.contains("Quantity must be greater than zero."));
            assert!(msg.contains("Select a part."));
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn deleting_an_item_restores_stock() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let part_id = create_test_part(&db, "Spark Plug", 8.0, 12).await;

    let item = work_order_service::add_item(&db, wo_id, part_item(part_id, 4.0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, part_id).await, 8);

    work_order_service::delete_item(&db, wo_id, item.id)
        .await
        .expect("Delete item failed");
    assert_eq!(stock_of(&db, part_id).await, 12);
}

#[tokio::test]
async fn invoice_generation_is_unique_per_work_order() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Diagnostics", 1.0, 80.0))
        .await
        .unwrap();

    let (first, created) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(first.status, "Unpaid");
    assert_eq!(first.subtotal, 80.0);
    assert_eq!(first.total, 80.0);
    assert_eq!(first.customer_id, customer_id);

    let (second, created) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);

    let count = motordesk::models::invoice::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn item_changes_flow_into_the_invoice() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let part_id = create_test_part(&db, "Alternator", 150.0, 5).await;

    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();
    assert_eq!(inv.total, 0.0);

    // Adding items after generation re-derives the totals
    work_order_service::add_item(&db, wo_id, part_item(part_id, 1.0))
        .await
        .unwrap();
    let item = work_order_service::add_item(&db, wo_id, labor_item("Replace alternator", 2.0, 80.0))
        .await
        .unwrap();

    let inv = invoice_service::reconcile_invoice(&db, inv.id).await.unwrap();
    assert_eq!(inv.subtotal, 310.0);
    assert_eq!(inv.total, 310.0);

    // Removing one flows back out
    work_order_service::delete_item(&db, wo_id, item.id)
        .await
        .unwrap();
    let inv = invoice_service::reconcile_invoice(&db, inv.id).await.unwrap();
    assert_eq!(inv.subtotal, 150.0);
}

#[tokio::test]
async fn reconcile_is_idempotent_over_unchanged_inputs() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Diagnostics", 1.5, 80.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();

    let first = invoice_service::reconcile_invoice(&db, inv.id).await.unwrap();
    let second = invoice_service::reconcile_invoice(&db, inv.id).await.unwrap();

    assert_eq!(first.subtotal, 120.0);
    assert_eq!(second.subtotal, first.subtotal);
    assert_eq!(second.total, first.total);
    assert_eq!(second.status, first.status);
    // Unchanged inputs must not touch the row
    assert_eq!(second.updated_at, first.updated_at);
}

#[tokio::test]
async fn explicit_unpaid_is_never_auto_advanced() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Diagnostics", 1.0, 100.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();
    assert_eq!(inv.status, "Unpaid");

    // A partial payment leaves an explicitly Unpaid invoice Unpaid
    let (_, inv) = invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 40.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(inv.status, "Unpaid");
}

#[tokio::test]
async fn partially_paid_settles_to_paid() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Engine work", 1.0, 100.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();

    // Admin moves the invoice out of Unpaid; reconciliation may advance it now
    let inv = invoice_service::update_invoice(
        &db,
        inv.id,
        invoice_service::InvoiceUpdate {
            status: Some("PartiallyPaid".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let (_, inv) = invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 60.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(inv.status, "PartiallyPaid");

    let (_, inv) = invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 40.0,
            method: "Card".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(inv.status, "Paid");

    let payments = invoice_service::payments_for_invoice(&db, inv.id)
        .await
        .unwrap();
    assert_eq!(invoice_service::outstanding(&inv, &payments), 0.0);
}

#[tokio::test]
async fn deleting_a_payment_reopens_the_invoice() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Engine work", 1.0, 100.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();
    invoice_service::update_invoice(
        &db,
        inv.id,
        invoice_service::InvoiceUpdate {
            status: Some("PartiallyPaid".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let (paid, inv) = invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 100.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(inv.status, "Paid");

    let inv = invoice_service::delete_payment(&db, paid.id).await.unwrap();
    assert_eq!(inv.status, "PartiallyPaid");
    assert_eq!(inv.total, 100.0);
}

#[tokio::test]
async fn invalid_payments_are_rejected() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();

    let result = invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 0.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Amount must be greater than zero.");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }

    let result = invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 10.0,
            method: "Barter".to_string(),
            notes: None,
        },
    )
    .await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Unknown payment method: Barter");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn checkout_caps_the_amount_at_outstanding() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Engine work", 1.0, 200.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();

    let session = invoice_service::begin_checkout(&db, inv.id, None).await.unwrap();
    assert_eq!(session.amount, 200.0);
    assert_eq!(session.invoice_id, inv.id);

    let session = invoice_service::begin_checkout(&db, inv.id, Some(500.0))
        .await
        .unwrap();
    assert_eq!(session.amount, 200.0);

    let session = invoice_service::begin_checkout(&db, inv.id, Some(50.0))
        .await
        .unwrap();
    assert_eq!(session.amount, 50.0);

    let result = invoice_service::begin_checkout(&db, inv.id, Some(-5.0)).await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Amount must be greater than zero.");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn checkout_refuses_a_settled_invoice() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Engine work", 1.0, 100.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();
    invoice_service::record_payment(
        &db,
        inv.id,
        payment::PaymentDto {
            amount: 100.0,
            method: "Cash".to_string(),
            notes: None,
        },
    )
    .await
    .unwrap();

    let result = invoice_service::begin_checkout(&db, inv.id, None).await;
    match result {
        Err(ServiceError::Validation(msg)) => {
            assert_eq!(msg, "Invoice is already fully paid.");
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn gateway_payment_applies_once_and_caps() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Engine work", 1.0, 100.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();

    // Confirmation exceeds the balance; the credit is capped
    let outcome = invoice_service::apply_gateway_payment(&db, inv.id, "pi_test_1", 0.0, 150.0)
        .await
        .unwrap();
    let (paid, inv) = match outcome {
        invoice_service::GatewayOutcome::Applied(p, i) => (p, i),
        other => panic!("Expected Applied, got {:?}", other),
    };
    assert_eq!(paid.amount, 100.0);
    assert_eq!(paid.method, "Card");
    assert_eq!(paid.provider_ref.as_deref(), Some("pi_test_1"));
    assert_eq!(inv.status, "Paid");

    // Redelivery of a settled invoice is a no-op
    let outcome = invoice_service::apply_gateway_payment(&db, inv.id, "pi_test_1", 0.0, 150.0)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        invoice_service::GatewayOutcome::AlreadySettled
    ));

    let count = payment::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn duplicate_gateway_token_credits_once() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;

    work_order_service::add_item(&db, wo_id, labor_item("Engine work", 1.0, 100.0))
        .await
        .unwrap();
    let (inv, _) = invoice_service::generate_for_work_order(&db, wo_id)
        .await
        .unwrap();

    let first = invoice_service::apply_gateway_payment(&db, inv.id, "pi_partial", 30.0, 30.0)
        .await
        .unwrap();
    assert!(matches!(first, invoice_service::GatewayOutcome::Applied(..)));

    // Same token again while the invoice still has a balance
    let second = invoice_service::apply_gateway_payment(&db, inv.id, "pi_partial", 30.0, 30.0)
        .await
        .unwrap();
    assert!(matches!(second, invoice_service::GatewayOutcome::Duplicate));

    let payments = invoice_service::payments_for_invoice(&db, inv.id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(invoice_service::paid_total(&payments), 30.0);
}

#[tokio::test]
async fn deleting_a_work_order_keeps_consumed_stock() {
    let db = setup_test_db().await;
    let customer_id = create_test_customer(&db).await;
    let vehicle_id = create_test_vehicle(&db, customer_id).await;
    let wo_id = create_test_work_order(&db, vehicle_id).await;
    let part_id = create_test_part(&db, "Timing Belt", 45.0, 6).await;

    work_order_service::add_item(&db, wo_id, part_item(part_id, 2.0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, part_id).await, 4);

    work_order_service::delete_work_order(&db, wo_id)
        .await
        .expect("Delete failed");

    // Parts are assumed used on the job; no restock on delete
    assert_eq!(stock_of(&db, part_id).await, 4);
    let items = motordesk::models::work_order_item::Entity::find()
        .count(&db)
        .await
        .unwrap();
    assert_eq!(items, 0);
}
