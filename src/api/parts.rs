use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Actor;
use crate::models::part::{self, Entity as Part, PartDto};

#[derive(Deserialize)]
pub struct PartsQuery {
    pub q: Option<String>,
}

pub async fn list_parts(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<PartsQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let mut select = Part::find();
    if let Some(q) = query.q.filter(|q| !q.trim().is_empty()) {
        let q = q.trim().to_string();
        select = select.filter(
            Condition::any()
                .add(part::Column::Name.contains(&q))
                .add(part::Column::PartNumber.contains(&q)),
        );
    }

    let parts = select
        .order_by_asc(part::Column::Name)
        .all(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "parts": parts, "total": parts.len() })))
}

pub async fn get_part(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let found = Part::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Part not found".to_string()))?;

    Ok(Json(json!({ "part": found })))
}

fn validate_part(dto: &PartDto) -> Result<(), (StatusCode, String)> {
    if dto.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name is required.".to_string()));
    }
    if dto.unit_price < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Unit price cannot be negative.".to_string(),
        ));
    }
    if dto.stock_quantity < 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Stock quantity cannot be negative.".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_part(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Json(payload): Json<PartDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;
    validate_part(&payload)?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_part = part::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        part_number: Set(payload.part_number),
        unit_price: Set(payload.unit_price),
        stock_quantity: Set(payload.stock_quantity),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let saved = new_part
        .insert(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "part": saved,
        "message": "Part created successfully"
    })))
}

pub async fn update_part(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<PartDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;
    validate_part(&payload)?;

    let found = Part::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Part not found".to_string()))?;

    let mut active: part::ActiveModel = found.into();
    active.name = Set(payload.name.trim().to_string());
    active.part_number = Set(payload.part_number);
    active.unit_price = Set(payload.unit_price);
    active.stock_quantity = Set(payload.stock_quantity);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let saved = active
        .update(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "part": saved,
        "message": "Part updated successfully"
    })))
}

pub async fn delete_part(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let found = Part::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Part not found".to_string()))?;

    // Items referencing this part keep their snapshot and drop the reference
    found
        .delete(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "message": "Part deleted successfully" })))
}
