//! Invoice Service - derived totals and payment application
//!
//! Subtotal and total are derived from the work order's current items;
//! reconciliation re-derives them after every item or payment mutation and
//! skips the write entirely when nothing changed.

use chrono::Utc;
use sea_orm::*;

use super::ServiceError;
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::payment::{self, Entity as Payment, PaymentDto};
use crate::models::vehicle::Entity as Vehicle;
use crate::models::work_order::{self, Entity as WorkOrder};
use crate::models::work_order_item::{self, Entity as WorkOrderItem};

/// Line total is a pure function of the item snapshot, never a stored column
pub fn line_total(item: &work_order_item::Model) -> f64 {
    item.quantity * item.unit_price
}

pub fn items_subtotal(items: &[work_order_item::Model]) -> f64 {
    items.iter().map(line_total).sum()
}

pub fn paid_total(payments: &[payment::Model]) -> f64 {
    payments.iter().map(|p| p.amount).sum()
}

pub fn outstanding(inv: &invoice::Model, payments: &[payment::Model]) -> f64 {
    inv.total - paid_total(payments)
}

/// Capped partial payments can leave float residue; anything at or below
/// this counts as settled.
pub fn is_settled(outstanding: f64) -> bool {
    outstanding <= 1e-9
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub subtotal: f64,
    pub total: f64,
    pub status: String,
    pub changed: bool,
}

/// Re-derive an invoice's money fields from its work order's items and
/// recorded payments.
///
/// An explicit Unpaid status is never auto-advanced; any other status
/// becomes Paid when nothing is outstanding, PartiallyPaid otherwise.
pub fn reconcile(
    inv: &invoice::Model,
    items: &[work_order_item::Model],
    payments: &[payment::Model],
) -> ReconcileOutcome {
    let subtotal = items_subtotal(items);
    let total = subtotal + inv.tax_amount - inv.discount;
    let outstanding = total - paid_total(payments);

    let status = if inv.status == "Unpaid" {
        "Unpaid".to_string()
    } else if is_settled(outstanding) {
        "Paid".to_string()
    } else {
        "PartiallyPaid".to_string()
    };

    // Exact comparison: a re-run over unchanged inputs recomputes the
    // identical stored values and must detect no change
    let changed = subtotal != inv.subtotal || total != inv.total || status != inv.status;

    ReconcileOutcome {
        subtotal,
        total,
        status,
        changed,
    }
}

pub async fn payments_for_invoice(
    db: &DatabaseConnection,
    invoice_id: i32,
) -> Result<Vec<payment::Model>, ServiceError> {
    let payments = Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await?;
    Ok(payments)
}

/// Reconcile one invoice against the database, persisting only when a field
/// actually changed.
pub async fn reconcile_invoice(
    db: &DatabaseConnection,
    invoice_id: i32,
) -> Result<invoice::Model, ServiceError> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let items = WorkOrderItem::find()
        .filter(work_order_item::Column::WorkOrderId.eq(inv.work_order_id))
        .all(db)
        .await?;
    let payments = payments_for_invoice(db, inv.id).await?;

    let outcome = reconcile(&inv, &items, &payments);
    if !outcome.changed {
        return Ok(inv);
    }

    tracing::debug!(
        "Reconciling invoice {}: subtotal {} -> {}, total {} -> {}, status {} -> {}",
        inv.id,
        inv.subtotal,
        outcome.subtotal,
        inv.total,
        outcome.total,
        inv.status,
        outcome.status
    );

    let mut active: invoice::ActiveModel = inv.into();
    active.subtotal = Set(outcome.subtotal);
    active.total = Set(outcome.total);
    active.status = Set(outcome.status);
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

/// Reconcile the invoice attached to a work order, if one exists
pub async fn reconcile_for_work_order(
    db: &DatabaseConnection,
    work_order_id: i32,
) -> Result<Option<invoice::Model>, ServiceError> {
    let existing = Invoice::find()
        .filter(invoice::Column::WorkOrderId.eq(work_order_id))
        .one(db)
        .await?;

    match existing {
        Some(inv) => Ok(Some(reconcile_invoice(db, inv.id).await?)),
        None => Ok(None),
    }
}

/// Generate the invoice for a work order. Each work order has at most one
/// invoice; the existing one is returned untouched when present.
pub async fn generate_for_work_order(
    db: &DatabaseConnection,
    work_order_id: i32,
) -> Result<(invoice::Model, bool), ServiceError> {
    if let Some(existing) = Invoice::find()
        .filter(invoice::Column::WorkOrderId.eq(work_order_id))
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }

    let wo = WorkOrder::find_by_id(work_order_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let vehicle = Vehicle::find_by_id(wo.vehicle_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let now = Utc::now().to_rfc3339();
    let new_invoice = invoice::ActiveModel {
        work_order_id: Set(wo.id),
        customer_id: Set(vehicle.customer_id),
        issued_at: Set(now.clone()),
        subtotal: Set(0.0),
        tax_amount: Set(0.0),
        discount: Set(0.0),
        total: Set(0.0),
        status: Set("Unpaid".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let saved = new_invoice.insert(db).await?;

    let reconciled = reconcile_invoice(db, saved.id).await?;
    Ok((reconciled, true))
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct InvoiceUpdate {
    pub status: Option<String>,
    pub subtotal: Option<f64>,
    pub tax_amount: Option<f64>,
    pub discount: Option<f64>,
    pub total: Option<f64>,
}

/// Direct admin edits are authoritative overrides; no reconciliation runs
/// until the next item or payment mutation.
pub async fn update_invoice(
    db: &DatabaseConnection,
    id: i32,
    update: InvoiceUpdate,
) -> Result<invoice::Model, ServiceError> {
    let inv = Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if let Some(status) = &update.status {
        if !["Unpaid", "PartiallyPaid", "Paid"].contains(&status.as_str()) {
            return Err(ServiceError::Validation(format!(
                "Unknown invoice status: {}",
                status
            )));
        }
    }

    let mut active: invoice::ActiveModel = inv.into();
    if let Some(status) = update.status {
        active.status = Set(status);
    }
    if let Some(subtotal) = update.subtotal {
        active.subtotal = Set(subtotal);
    }
    if let Some(tax_amount) = update.tax_amount {
        active.tax_amount = Set(tax_amount);
    }
    if let Some(discount) = update.discount {
        active.discount = Set(discount);
    }
    if let Some(total) = update.total {
        active.total = Set(total);
    }
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

/// Record a manual payment and re-derive the invoice
pub async fn record_payment(
    db: &DatabaseConnection,
    invoice_id: i32,
    dto: PaymentDto,
) -> Result<(payment::Model, invoice::Model), ServiceError> {
    if dto.amount <= 0.0 {
        return Err(ServiceError::Validation(
            "Amount must be greater than zero.".to_string(),
        ));
    }
    if !["Cash", "Card", "Whish"].contains(&dto.method.as_str()) {
        return Err(ServiceError::Validation(format!(
            "Unknown payment method: {}",
            dto.method
        )));
    }

    Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let now = Utc::now().to_rfc3339();
    let new_payment = payment::ActiveModel {
        invoice_id: Set(invoice_id),
        amount: Set(dto.amount),
        paid_at: Set(now.clone()),
        method: Set(dto.method),
        notes: Set(dto.notes),
        provider_ref: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let saved = new_payment.insert(db).await?;

    let inv = reconcile_invoice(db, invoice_id).await?;
    Ok((saved, inv))
}

/// Remove a payment and re-derive its invoice
pub async fn delete_payment(
    db: &DatabaseConnection,
    payment_id: i32,
) -> Result<invoice::Model, ServiceError> {
    let pay = Payment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let invoice_id = pay.invoice_id;

    pay.delete(db).await?;

    reconcile_invoice(db, invoice_id).await
}

/// Shape a checkout session for an invoice. A caller-supplied amount is
/// capped at the outstanding balance; omitted means the full balance.
pub async fn begin_checkout(
    db: &DatabaseConnection,
    invoice_id: i32,
    amount: Option<f64>,
) -> Result<crate::stripe::CheckoutSession, ServiceError> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let payments = payments_for_invoice(db, inv.id).await?;
    let due = outstanding(&inv, &payments);

    if is_settled(due) {
        return Err(ServiceError::Validation(
            "Invoice is already fully paid.".to_string(),
        ));
    }

    let requested = match amount {
        Some(a) if a <= 0.0 => {
            return Err(ServiceError::Validation(
                "Amount must be greater than zero.".to_string(),
            ));
        }
        Some(a) => a.min(due),
        None => due,
    };

    Ok(crate::stripe::create_session(inv.id, requested))
}

#[derive(Debug)]
pub enum GatewayOutcome {
    Applied(payment::Model, invoice::Model),
    AlreadySettled,
    Duplicate,
}

/// Apply an asynchronous payment confirmation idempotently.
///
/// The reference check runs before anything is persisted, so redelivery of
/// the same confirmation never credits twice. The credited amount is capped
/// at the current outstanding balance.
pub async fn apply_gateway_payment(
    db: &DatabaseConnection,
    invoice_id: i32,
    provider_ref: &str,
    requested_amount: f64,
    settled_amount: f64,
) -> Result<GatewayOutcome, ServiceError> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let payments = payments_for_invoice(db, inv.id).await?;
    let outstanding = outstanding(&inv, &payments);

    if is_settled(outstanding) {
        tracing::info!(
            "Gateway confirmation for settled invoice {} ignored",
            inv.id
        );
        return Ok(GatewayOutcome::AlreadySettled);
    }

    if payments
        .iter()
        .any(|p| p.provider_ref.as_deref() == Some(provider_ref))
    {
        tracing::info!(
            "Duplicate gateway delivery {} for invoice {} ignored",
            provider_ref,
            inv.id
        );
        return Ok(GatewayOutcome::Duplicate);
    }

    let confirmed = if requested_amount > 0.0 {
        requested_amount
    } else {
        settled_amount
    };
    let pay_amount = confirmed.min(outstanding);

    let now = Utc::now().to_rfc3339();
    let new_payment = payment::ActiveModel {
        invoice_id: Set(inv.id),
        amount: Set(pay_amount),
        paid_at: Set(now.clone()),
        method: Set("Card".to_owned()),
        notes: Set(Some("Stripe Checkout payment".to_owned())),
        provider_ref: Set(Some(provider_ref.to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let saved = new_payment.insert(db).await?;

    let inv = if is_settled(outstanding - pay_amount) {
        let mut active: invoice::ActiveModel = inv.into();
        active.status = Set("Paid".to_owned());
        active.updated_at = Set(now);
        active.update(db).await?
    } else {
        inv
    };

    tracing::info!(
        "💳 Applied gateway payment {} of {} to invoice {}",
        provider_ref,
        pay_amount,
        inv.id
    );

    Ok(GatewayOutcome::Applied(saved, inv))
}
