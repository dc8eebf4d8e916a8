use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Actor;
use crate::models::user::{self, Entity as User};

#[derive(Deserialize)]
pub struct UsersQuery {
    pub q: Option<String>,
}

pub async fn list_users(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let mut select = User::find();
    if let Some(q) = query.q.filter(|q| !q.trim().is_empty()) {
        let q = q.trim().to_string();
        select = select.filter(
            Condition::any()
                .add(user::Column::Email.contains(&q))
                .add(user::Column::DisplayName.contains(&q)),
        );
    }

    let users = select
        .order_by_asc(user::Column::Email)
        .all(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(json!({ "users": users, "total": users.len() })))
}

async fn set_role(
    db: &DatabaseConnection,
    id: i32,
    role: &str,
) -> Result<user::Model, (StatusCode, String)> {
    let found = User::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    let mut active: user::ActiveModel = found.into();
    active.role = Set(role.to_string());
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    active
        .update(db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn promote_user(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let updated = set_role(&db, id, "admin").await?;
    tracing::info!("User {} promoted to admin by {}", updated.email, actor.email);

    Ok(Json(json!({
        "user": updated,
        "message": "User promoted to admin"
    })))
}

pub async fn demote_user(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    // Admins cannot strip their own role; another admin must do it
    if id == actor.user_id {
        return Err((
            StatusCode::BAD_REQUEST,
            "You cannot remove your own admin role.".to_string(),
        ));
    }

    let found = User::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    if found.role != "admin" {
        return Err((
            StatusCode::BAD_REQUEST,
            "User is not an admin.".to_string(),
        ));
    }

    let updated = set_role(&db, id, "customer").await?;
    tracing::info!("User {} demoted by {}", updated.email, actor.email);

    Ok(Json(json!({
        "user": updated,
        "message": "Admin role removed"
    })))
}
