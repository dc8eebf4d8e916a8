use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{err, own_customer_id};
use crate::auth::Actor;
use crate::models::appointment::{self, AppointmentDto, Entity as Appointment};
use crate::models::customer::Entity as Customer;
use crate::models::vehicle::Entity as Vehicle;
use crate::services::appointment_service;

#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
}

pub async fn list_appointments(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut condition = Condition::all();

    if actor.is_admin() {
        if let Some(customer_id) = query.customer_id {
            condition = condition.add(appointment::Column::CustomerId.eq(customer_id));
        }
    } else {
        let customer_id = own_customer_id(&db, &actor).await?;
        condition = condition.add(appointment::Column::CustomerId.eq(customer_id));
    }

    if let Some(status) = query.status {
        condition = condition.add(appointment::Column::Status.eq(status));
    }

    let appointments = Appointment::find()
        .filter(condition)
        .order_by_asc(appointment::Column::ScheduledAt)
        .find_also_related(Customer)
        .all(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let result: Vec<Value> = appointments
        .into_iter()
        .map(|(a, customer)| {
            let customer_name = customer.as_ref().map(|c| c.full_name());
            json!({
                "id": a.id,
                "customer_id": a.customer_id,
                "vehicle_id": a.vehicle_id,
                "scheduled_at": a.scheduled_at,
                "reason": a.reason,
                "status": a.status,
                "customer_name": customer_name,
            })
        })
        .collect();

    Ok(Json(json!({ "appointments": result, "total": result.len() })))
}

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

/// Free hourly slots for a date, as "HH:00" strings
pub async fn available_slots(
    State(db): State<DatabaseConnection>,
    _actor: Actor,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid date format. Use YYYY-MM-DD.".to_string(),
        )
    })?;

    let slots = appointment_service::list_available_slots(&db, date)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "date": query.date, "slots": slots })))
}

async fn check_vehicle_owner(
    db: &DatabaseConnection,
    vehicle_id: Option<i32>,
    customer_id: i32,
) -> Result<(), (StatusCode, String)> {
    if let Some(vehicle_id) = vehicle_id {
        let vehicle = Vehicle::find_by_id(vehicle_id)
            .one(db)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .ok_or((StatusCode::NOT_FOUND, "Vehicle not found".to_string()))?;
        if vehicle.customer_id != customer_id {
            return Err((
                StatusCode::BAD_REQUEST,
                "Vehicle does not belong to this customer.".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn create_appointment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Json(payload): Json<AppointmentDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let customer_id = if actor.is_admin() {
        payload
            .customer_id
            .ok_or((StatusCode::BAD_REQUEST, "Select a customer.".to_string()))?
    } else {
        own_customer_id(&db, &actor).await?
    };

    check_vehicle_owner(&db, payload.vehicle_id, customer_id).await?;

    let scheduled_at = appointment_service::parse_timestamp(&payload.scheduled_at)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let appointment = appointment_service::create_appointment(
        &db,
        customer_id,
        payload.vehicle_id,
        scheduled_at,
        payload.reason,
    )
    .await
    .map_err(err)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

pub async fn get_appointment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let found = Appointment::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Appointment not found".to_string()))?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        if found.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your appointment".to_string()));
        }
    }

    Ok(Json(json!({ "appointment": found })))
}

pub async fn update_appointment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<AppointmentDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let found = Appointment::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Appointment not found".to_string()))?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        if found.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your appointment".to_string()));
        }
    }

    check_vehicle_owner(&db, payload.vehicle_id, found.customer_id).await?;

    let scheduled_at = appointment_service::parse_timestamp(&payload.scheduled_at)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    // Only admins move appointments through the status workflow
    let status = if actor.is_admin() {
        payload.status
    } else {
        None
    };

    let appointment = appointment_service::update_appointment(
        &db,
        id,
        payload.vehicle_id,
        scheduled_at,
        payload.reason,
        status,
    )
    .await
    .map_err(err)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

pub async fn cancel_appointment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let found = Appointment::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Appointment not found".to_string()))?;

    if !actor.is_admin() {
        let customer_id = own_customer_id(&db, &actor).await?;
        if found.customer_id != customer_id {
            return Err((StatusCode::FORBIDDEN, "Not your appointment".to_string()));
        }
    }

    let appointment = appointment_service::cancel_appointment(&db, id)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

pub async fn delete_appointment(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let found = Appointment::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Appointment not found".to_string()))?;

    found
        .delete(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "message": "Appointment deleted successfully" })))
}
