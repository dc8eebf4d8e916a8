use crate::auth::{create_jwt, verify_password, Actor};
use crate::models::user::{self, Entity as User};
use crate::services::customer_service;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    display_name: String,
}

/// Self-registration. Creates a customer account plus its customer record.
pub async fn register(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    match customer_service::register_account(
        &db,
        &payload.email,
        &payload.password,
        &payload.display_name,
    )
    .await
    {
        Ok((user, customer)) => {
            tracing::info!("Registered customer account {}", user.email);
            match create_jwt(user.id, &user.email, &user.role) {
                Ok(token) => (
                    StatusCode::CREATED,
                    Json(json!({
                        "token": token,
                        "user": {
                            "id": user.id,
                            "email": user.email,
                            "display_name": user.display_name,
                            "role": user.role,
                        },
                        "customer": customer,
                        "message": "Account created successfully"
                    })),
                )
                    .into_response(),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response(),
            }
        }
        Err(e) => {
            let (status, message) = super::err(e);
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}

pub async fn login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    tracing::info!("Login attempt for {}", payload.email);

    let email = payload.email.trim().to_lowercase();
    let user = match User::find()
        .filter(user::Column::Email.eq(&email))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        _ => {
            tracing::warn!("User not found: {}", email);
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response();
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => match create_jwt(user.id, &user.email, &user.role) {
            Ok(token) => (
                StatusCode::OK,
                Json(json!({
                    "token": token,
                    "user": {
                        "id": user.id,
                        "email": user.email,
                        "display_name": user.display_name,
                        "role": user.role,
                    }
                })),
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        },
        _ => {
            tracing::warn!("Password verification failed for {}", user.email);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response()
        }
    }
}

/// The logged-in user plus their customer record, when one is linked
pub async fn get_me(State(db): State<DatabaseConnection>, actor: Actor) -> impl IntoResponse {
    let user = match User::find_by_id(actor.user_id).one(&db).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "User not found" })),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let customer = customer_service::customer_for_user(&db, user.id)
        .await
        .unwrap_or(None);

    Json(json!({
        "user": {
            "id": user.id,
            "email": user.email,
            "display_name": user.display_name,
            "role": user.role,
        },
        "customer": customer,
    }))
    .into_response()
}
