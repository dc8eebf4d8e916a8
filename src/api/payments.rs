use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{err, own_customer_id};
use crate::auth::Actor;
use crate::models::invoice::Entity as Invoice;
use crate::models::payment::PaymentDto;
use crate::services::invoice_service::{self, GatewayOutcome};
use crate::services::ServiceError;
use crate::stripe;

async fn load_scoped_invoice(
    db: &DatabaseConnection,
    actor: &Actor,
    invoice_id: i32,
) -> Result<crate::models::invoice::Model, (StatusCode, String)> {
    let inv = Invoice::find_by_id(invoice_id)
        .one(db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Invoice not found".to_string()))?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(db, actor).await?;
        if inv.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your invoice".to_string()));
        }
    }

    Ok(inv)
}

pub async fn list_payments(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let inv = load_scoped_invoice(&db, &actor, id).await?;

    let payments = invoice_service::payments_for_invoice(&db, inv.id)
        .await
        .map_err(err)?;
    let outstanding = invoice_service::outstanding(&inv, &payments);

    Ok(Json(json!({
        "payments": payments,
        "outstanding": outstanding,
    })))
}

/// Record a manual payment taken at the counter
pub async fn record_payment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<PaymentDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let (payment, inv) = invoice_service::record_payment(&db, id, payload)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "payment": payment,
        "invoice": inv,
        "message": "Payment recorded successfully"
    })))
}

pub async fn delete_payment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let inv = invoice_service::delete_payment(&db, id).await.map_err(err)?;

    Ok(Json(json!({
        "invoice": inv,
        "message": "Payment deleted successfully"
    })))
}

#[derive(Deserialize, Default)]
pub struct CheckoutRequest {
    pub amount: Option<f64>,
}

/// Start a gateway checkout for an invoice. Customers can only pay their own.
pub async fn begin_checkout(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    load_scoped_invoice(&db, &actor, id).await?;

    let session = invoice_service::begin_checkout(&db, id, payload.amount)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "session": session })))
}

/// Gateway callback. Unsigned deliveries are rejected when a webhook secret
/// is configured; deliveries for unknown invoices are acknowledged and
/// dropped so the gateway stops retrying them.
pub async fn stripe_webhook(
    State(db): State<DatabaseConnection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, String)> {
    let secret = std::env::var("STRIPE_WEBHOOK_SECRET").ok();
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok());

    stripe::verify_signature(secret.as_deref(), signature, &body)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let event: stripe::WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Malformed webhook payload: {}", e)))?;

    if event.event_type != "checkout.session.completed" {
        return Ok(Json(json!({ "status": "ignored" })));
    }

    let object = event.data.object;
    let invoice_id = match object
        .metadata
        .invoice_id
        .as_deref()
        .and_then(|v| v.parse::<i32>().ok())
    {
        Some(id) => id,
        None => {
            tracing::warn!("Webhook delivery without an invoice_id, ignoring");
            return Ok(Json(json!({ "status": "ignored" })));
        }
    };

    let requested_amount = object
        .metadata
        .requested_amount
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);
    let settled_amount = object
        .amount_total
        .map(|cents| cents as f64 / 100.0)
        .unwrap_or(0.0);
    let provider_ref = object
        .payment_intent
        .or(object.id)
        .unwrap_or_else(|| format!("evt_{}", uuid::Uuid::new_v4().simple()));

    match invoice_service::apply_gateway_payment(
        &db,
        invoice_id,
        &provider_ref,
        requested_amount,
        settled_amount,
    )
    .await
    {
        Ok(GatewayOutcome::Applied(payment, inv)) => Ok(Json(json!({
            "status": "applied",
            "payment": payment,
            "invoice": inv,
        }))),
        Ok(GatewayOutcome::AlreadySettled) => Ok(Json(json!({ "status": "already_settled" }))),
        Ok(GatewayOutcome::Duplicate) => Ok(Json(json!({ "status": "duplicate" }))),
        Err(ServiceError::NotFound) => {
            tracing::warn!("Webhook for unknown invoice {}, ignoring", invoice_id);
            Ok(Json(json!({ "status": "ignored" })))
        }
        Err(e) => Err(err(e)),
    }
}
