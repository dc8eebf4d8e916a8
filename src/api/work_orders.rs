use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{err, own_customer_id};
use crate::auth::Actor;
use crate::models::work_order::WorkOrderDto;
use crate::models::work_order_item::WorkOrderItemDto;
use crate::services::work_order_service::{self, WorkOrderDetails, WorkOrderFilter};

fn details_json(d: &WorkOrderDetails) -> Value {
    json!({
        "id": d.work_order.id,
        "vehicle_id": d.work_order.vehicle_id,
        "status": d.work_order.status,
        "problem_description": d.work_order.problem_description,
        "odometer": d.work_order.odometer,
        "created_at": d.work_order.created_at,
        "updated_at": d.work_order.updated_at,
        "vehicle": d.vehicle.as_ref().map(|v| json!({
            "id": v.id,
            "plate_number": v.plate_number,
            "make": v.make,
            "model": v.model,
            "year": v.year,
        })),
        "customer_name": d.customer.as_ref().map(|c| c.full_name()),
        "items": d.items,
        "total": d.total,
    })
}

#[derive(Deserialize)]
pub struct WorkOrdersQuery {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
}

pub async fn list_work_orders(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<WorkOrdersQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let filter = if actor.is_admin() {
        WorkOrderFilter {
            status: query.status,
            customer_id: query.customer_id,
        }
    } else {
        WorkOrderFilter {
            status: query.status,
            customer_id: Some(own_customer_id(&db, &actor).await?),
        }
    };

    let orders = work_order_service::list_work_orders(&db, filter)
        .await
        .map_err(err)?;
    let result: Vec<Value> = orders.iter().map(details_json).collect();

    Ok(Json(json!({ "work_orders": result, "total": result.len() })))
}

pub async fn create_work_order(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Json(payload): Json<WorkOrderDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let work_order = work_order_service::create_work_order(&db, payload)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "work_order": work_order,
        "message": "Work order created successfully"
    })))
}

pub async fn get_work_order(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let details = work_order_service::work_order_details(&db, id)
        .await
        .map_err(err)?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        let owner = details.vehicle.as_ref().map(|v| v.customer_id);
        if owner != Some(customer_id) {
            return Err((StatusCode::FORBIDDEN, "Not your work order".to_string()));
        }
    }

    Ok(Json(json!({ "work_order": details_json(&details) })))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_status(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let work_order = work_order_service::set_status(&db, id, payload.status)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "work_order": work_order,
        "message": "Status updated successfully"
    })))
}

pub async fn delete_work_order(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    work_order_service::delete_work_order(&db, id)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "message": "Work order deleted successfully" })))
}

pub async fn add_item(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<WorkOrderItemDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let item = work_order_service::add_item(&db, id, payload)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "item": item,
        "message": "Item added successfully"
    })))
}

pub async fn delete_item(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path((id, item_id)): Path<(i32, i32)>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    work_order_service::delete_item(&db, id, item_id)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "message": "Item removed successfully" })))
}
