use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::own_customer_id;
use crate::auth::Actor;
use crate::models::customer::Entity as Customer;
use crate::models::vehicle::{self, Entity as Vehicle, VehicleDto};

#[derive(Deserialize)]
pub struct VehiclesQuery {
    pub customer_id: Option<i32>,
    pub q: Option<String>,
}

/// Admins see every vehicle, customers only their own
pub async fn list_vehicles(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut condition = Condition::all();

    if actor.is_admin() {
        if let Some(customer_id) = query.customer_id {
            condition = condition.add(vehicle::Column::CustomerId.eq(customer_id));
        }
    } else {
        let customer_id = own_customer_id(&db, &actor).await?;
        condition = condition.add(vehicle::Column::CustomerId.eq(customer_id));
    }

    if let Some(q) = query.q.filter(|q| !q.trim().is_empty()) {
        let q = q.trim().to_string();
        condition = condition.add(
            Condition::any()
                .add(vehicle::Column::PlateNumber.contains(&q))
                .add(vehicle::Column::Make.contains(&q))
                .add(vehicle::Column::Model.contains(&q)),
        );
    }

    let vehicles = Vehicle::find()
        .filter(condition)
        .order_by_asc(vehicle::Column::PlateNumber)
        .find_also_related(Customer)
        .all(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let result: Vec<Value> = vehicles
        .into_iter()
        .map(|(v, customer)| {
            let owner = customer.as_ref().map(|c| c.full_name());
            json!({
                "id": v.id,
                "customer_id": v.customer_id,
                "plate_number": v.plate_number,
                "make": v.make,
                "model": v.model,
                "year": v.year,
                "odometer": v.odometer,
                "owner_name": owner,
            })
        })
        .collect();

    Ok(Json(json!({ "vehicles": result, "total": result.len() })))
}

pub async fn get_vehicle(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let found = Vehicle::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Vehicle not found".to_string()))?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        if found.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your vehicle".to_string()));
        }
    }

    Ok(Json(json!({ "vehicle": found })))
}

async fn plate_taken(
    db: &DatabaseConnection,
    plate: &str,
    exclude_id: Option<i32>,
) -> Result<bool, (StatusCode, String)> {
    let mut select = Vehicle::find().filter(vehicle::Column::PlateNumber.eq(plate));
    if let Some(id) = exclude_id {
        select = select.filter(vehicle::Column::Id.ne(id));
    }
    let found = select
        .one(db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(found.is_some())
}

pub async fn create_vehicle(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Json(payload): Json<VehicleDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    // Admins pick the owner; customers always register against themselves
    let customer_id = if actor.is_admin() {
        payload
            .customer_id
            .ok_or((StatusCode::BAD_REQUEST, "Select an owner.".to_string()))?
    } else {
        own_customer_id(&db, &actor).await?
    };

    Customer::find_by_id(customer_id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Customer not found".to_string()))?;

    let plate = payload.plate_number.trim().to_uppercase();
    if plate.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Plate number is required.".to_string(),
        ));
    }
    if plate_taken(&db, &plate, None).await? {
        return Err((
            StatusCode::BAD_REQUEST,
            "Plate number is already registered.".to_string(),
        ));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let new_vehicle = vehicle::ActiveModel {
        customer_id: Set(customer_id),
        plate_number: Set(plate),
        make: Set(payload.make),
        model: Set(payload.model),
        year: Set(payload.year),
        odometer: Set(payload.odometer),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let saved = new_vehicle
        .insert(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "vehicle": saved,
        "message": "Vehicle created successfully"
    })))
}

pub async fn update_vehicle(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<VehicleDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let found = Vehicle::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Vehicle not found".to_string()))?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        if found.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your vehicle".to_string()));
        }
    }

    let plate = payload.plate_number.trim().to_uppercase();
    if plate.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Plate number is required.".to_string(),
        ));
    }
    if plate_taken(&db, &plate, Some(id)).await? {
        return Err((
            StatusCode::BAD_REQUEST,
            "Plate number is already registered.".to_string(),
        ));
    }

    let mut active: vehicle::ActiveModel = found.into();
    // Only admins may move a vehicle to another owner
    if actor.is_admin() {
        if let Some(customer_id) = payload.customer_id {
            active.customer_id = Set(customer_id);
        }
    }
    active.plate_number = Set(plate);
    active.make = Set(payload.make);
    active.model = Set(payload.model);
    active.year = Set(payload.year);
    active.odometer = Set(payload.odometer);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let saved = active
        .update(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({
        "vehicle": saved,
        "message": "Vehicle updated successfully"
    })))
}

pub async fn delete_vehicle(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let found = Vehicle::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Vehicle not found".to_string()))?;

    found
        .delete(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "message": "Vehicle deleted successfully" })))
}
