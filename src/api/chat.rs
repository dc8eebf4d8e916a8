use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::err;
use crate::auth::Actor;
use crate::services::assistant_service;

pub async fn list_conversations(
    State(db): State<DatabaseConnection>,
    actor: Actor,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let conversations = assistant_service::list_conversations(&db)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "conversations": conversations,
        "total": conversations.len()
    })))
}

#[derive(Deserialize)]
pub struct NewConversation {
    pub title: String,
    pub issue_context: Option<String>,
    pub work_order_id: Option<i32>,
}

pub async fn create_conversation(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Json(payload): Json<NewConversation>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let conversation = assistant_service::create_conversation(
        &db,
        payload.title,
        payload.issue_context,
        payload.work_order_id,
    )
    .await
    .map_err(err)?;

    Ok(Json(json!({
        "conversation": conversation,
        "message": "Conversation created successfully"
    })))
}

pub async fn get_conversation(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let (conversation, messages) = assistant_service::conversation_with_messages(&db, id)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "conversation": conversation,
        "messages": messages,
    })))
}

pub async fn delete_conversation(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    assistant_service::delete_conversation(&db, id)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "message": "Conversation deleted successfully" })))
}

#[derive(Deserialize)]
pub struct NewMessage {
    pub content: String,
}

pub async fn send_message(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
    Json(payload): Json<NewMessage>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let (user_message, assistant_message) =
        assistant_service::send_message(&db, id, payload.content)
            .await
            .map_err(err)?;

    Ok(Json(json!({
        "user_message": user_message,
        "assistant_message": assistant_message,
    })))
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    pub problem_description: String,
}

/// One-shot diagnosis suggestion for a problem description
pub async fn suggest(
    _actor: Actor,
    Json(payload): Json<SuggestRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let suggestion = assistant_service::suggest(&payload.problem_description)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "suggestion": suggestion })))
}

/// Open an assistant conversation seeded with a work order's full context
pub async fn start_work_order_chat(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let (conversation, messages) = assistant_service::start_work_order_chat(&db, id)
        .await
        .map_err(err)?;

    Ok(Json(json!({
        "conversation": conversation,
        "messages": messages,
    })))
}
