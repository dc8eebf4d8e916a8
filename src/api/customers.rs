use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::err;
use crate::auth::Actor;
use crate::models::customer::{CustomerDto, Entity as Customer};
use crate::models::vehicle::{self, Entity as Vehicle};
use crate::services::customer_service;

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomersQuery {
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/customers",
    responses(
        (status = 200, description = "List customers, optionally filtered by q")
    )
)]
pub async fn list_customers(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<CustomersQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let customers = customer_service::list_customers(&db, query.q)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "customers": customers,
        "total": customers.len()
    })))
}

pub async fn get_customer(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let customer = Customer::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Customer not found".to_string()))?;

    let vehicles = Vehicle::find()
        .filter(vehicle::Column::CustomerId.eq(id))
        .all(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let has_login = customer.user_id.is_some();
    Ok(Json(json!({
        "customer": customer,
        "vehicles": vehicles,
        "has_login": has_login,
    })))
}

#[utoipa::path(
    post,
    path = "/api/customers",
    responses(
        (status = 200, description = "Customer created")
    )
)]
pub async fn create_customer(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Json(payload): Json<CustomerDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let customer = customer_service::create_customer(&db, payload)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "customer": customer,
        "message": "Customer created successfully"
    })))
}

#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    responses(
        (status = 200, description = "Customer updated"),
        (status = 404, description = "Customer not found")
    )
)]
pub async fn update_customer(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<CustomerDto>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let customer = customer_service::update_customer(&db, id, payload)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "customer": customer,
        "message": "Customer updated successfully"
    })))
}

#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    responses(
        (status = 200, description = "Customer deleted"),
        (status = 409, description = "Customer still has vehicles")
    )
)]
pub async fn delete_customer(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    customer_service::delete_customer(&db, id)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "message": "Customer deleted successfully" })))
}

/// Create a login for a customer. The temporary password appears in this
/// response only; it is not stored anywhere in clear.
pub async fn provision_login(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let (user, temp_password) = customer_service::provision_login(&db, id)
        .await
        .map_err(err)?;

    tracing::info!("Provisioned login {} for customer {}", user.email, id);

    Ok(Json(json!({
        "user": {
            "id": user.id,
            "email": user.email,
            "role": user.role,
        },
        "temp_password": temp_password,
        "message": "Login created successfully"
    })))
}

pub async fn revoke_login(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    customer_service::revoke_login(&db, id).await.map_err(err)?;

    Ok(Json(json!({ "message": "Login revoked successfully" })))
}
