use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::{err, own_customer_id};
use crate::auth::Actor;
use crate::models::customer::Entity as Customer;
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::payment::{self, Entity as Payment};
use crate::models::work_order::Entity as WorkOrder;
use crate::services::invoice_service::{self, InvoiceUpdate};

/// Generate the invoice for a work order; repeat calls return the existing one
pub async fn generate_invoice(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let (inv, created) = invoice_service::generate_for_work_order(&db, id)
        .await
        .map_err(err)?;

    let message = if created {
        "Invoice generated successfully"
    } else {
        "Invoice already exists for this work order"
    };

    Ok(Json(json!({ "invoice": inv, "created": created, "message": message })))
}

#[derive(Deserialize)]
pub struct InvoicesQuery {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
}

pub async fn list_invoices(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<InvoicesQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut condition = Condition::all();

    if actor.is_admin() {
        if let Some(customer_id) = query.customer_id {
            condition = condition.add(invoice::Column::CustomerId.eq(customer_id));
        }
    } else {
        let customer_id = own_customer_id(&db, &actor).await?;
        condition = condition.add(invoice::Column::CustomerId.eq(customer_id));
    }

    if let Some(status) = query.status {
        condition = condition.add(invoice::Column::Status.eq(status));
    }

    let invoices = Invoice::find()
        .filter(condition)
        .order_by_desc(invoice::Column::IssuedAt)
        .find_also_related(Customer)
        .all(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let invoice_ids: Vec<i32> = invoices.iter().map(|(i, _)| i.id).collect();
    let mut paid_by_invoice: HashMap<i32, f64> = HashMap::new();
    if !invoice_ids.is_empty() {
        let payments = Payment::find()
            .filter(payment::Column::InvoiceId.is_in(invoice_ids))
            .all(&db)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        for p in payments {
            *paid_by_invoice.entry(p.invoice_id).or_insert(0.0) += p.amount;
        }
    }

    let result: Vec<Value> = invoices
        .into_iter()
        .map(|(inv, customer)| {
            let paid = paid_by_invoice.get(&inv.id).copied().unwrap_or(0.0);
            json!({
                "id": inv.id,
                "work_order_id": inv.work_order_id,
                "customer_id": inv.customer_id,
                "customer_name": customer.as_ref().map(|c| c.full_name()),
                "issued_at": inv.issued_at,
                "subtotal": inv.subtotal,
                "tax_amount": inv.tax_amount,
                "discount": inv.discount,
                "total": inv.total,
                "paid": paid,
                "outstanding": inv.total - paid,
                "status": inv.status,
            })
        })
        .collect();

    Ok(Json(json!({ "invoices": result, "total": result.len() })))
}

/// Re-derives the invoice before returning it, so stale snapshots are
/// corrected on read
pub async fn get_invoice(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let inv = invoice_service::reconcile_invoice(&db, id)
        .await
        .map_err(err)?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        if inv.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your invoice".to_string()));
        }
    }

    let work_order = WorkOrder::find_by_id(inv.work_order_id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let items = crate::services::work_order_service::items_for(&db, inv.work_order_id)
        .await
        .map_err(err)?;
    let payments = invoice_service::payments_for_invoice(&db, inv.id)
        .await
        .map_err(err)?;
    let outstanding = invoice_service::outstanding(&inv, &payments);

    Ok(Json(json!({
        "invoice": inv,
        "work_order": work_order,
        "items": items,
        "payments": payments,
        "outstanding": outstanding,
    })))
}

pub async fn update_invoice(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<InvoiceUpdate>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let inv = invoice_service::update_invoice(&db, id, payload)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "invoice": inv,
        "message": "Invoice updated successfully"
    })))
}

pub async fn delete_invoice(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let inv = Invoice::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Invoice not found".to_string()))?;

    inv.delete(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "message": "Invoice deleted successfully" })))
}
