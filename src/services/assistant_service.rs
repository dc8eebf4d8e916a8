//! Assistant Service - AI-backed chat and diagnosis suggestions
//!
//! Conversations and their messages are persisted before the relay is called,
//! so a failed AI round keeps the user's message and the conversation usable.

use chrono::Utc;
use sea_orm::*;
use serde_json::json;

use super::{work_order_service, ServiceError};
use crate::ai_client::{self, ChatTurn};
use crate::models::chat_message::{self, Entity as ChatMessage};
use crate::models::conversation::{self, Entity as Conversation};
use crate::models::work_order::{self, Entity as WorkOrder};

const SYSTEM_PROMPT: &str = "You are the built-in assistant of a garage management system. \
You help service advisors and mechanics reason about repair jobs, estimates and parts. \
Answer briefly and practically. When work order context is provided, ground your answers in it.";

const SUGGEST_PROMPT: &str = "You are an experienced automotive technician assistant. \
Given a vehicle problem description, suggest the most likely causes, the checks to run, \
and the parts or labor typically needed. Keep the answer short and practical.";

pub async fn list_conversations(
    db: &DatabaseConnection,
) -> Result<Vec<conversation::Model>, ServiceError> {
    let conversations = Conversation::find()
        .order_by_desc(conversation::Column::UpdatedAt)
        .all(db)
        .await?;
    Ok(conversations)
}

pub async fn conversation_with_messages(
    db: &DatabaseConnection,
    id: i32,
) -> Result<(conversation::Model, Vec<chat_message::Model>), ServiceError> {
    let conv = Conversation::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    let messages = ChatMessage::find()
        .filter(chat_message::Column::ConversationId.eq(id))
        .order_by_asc(chat_message::Column::Id)
        .all(db)
        .await?;
    Ok((conv, messages))
}

pub async fn create_conversation(
    db: &DatabaseConnection,
    title: String,
    issue_context: Option<String>,
    work_order_id: Option<i32>,
) -> Result<conversation::Model, ServiceError> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::Validation("Title is required.".to_string()));
    }

    let now = Utc::now().to_rfc3339();
    let new_conv = conversation::ActiveModel {
        title: Set(title),
        issue_context: Set(issue_context),
        work_order_id: Set(work_order_id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_conv.insert(db).await?)
}

pub async fn delete_conversation(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let conv = Conversation::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    conv.delete(db).await?;
    Ok(())
}

/// Append a user message, run the full history through the relay and append
/// the reply. A failed relay round still stores a fallback reply so the
/// conversation never loses the user's message.
pub async fn send_message(
    db: &DatabaseConnection,
    conversation_id: i32,
    content: String,
) -> Result<(chat_message::Model, chat_message::Model), ServiceError> {
    let conv = Conversation::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(ServiceError::Validation(
            "Message content is required.".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();
    let user_message = chat_message::ActiveModel {
        conversation_id: Set(conversation_id),
        role: Set("user".to_owned()),
        content: Set(content),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let history = ChatMessage::find()
        .filter(chat_message::Column::ConversationId.eq(conversation_id))
        .order_by_asc(chat_message::Column::Id)
        .all(db)
        .await?;

    let mut system = SYSTEM_PROMPT.to_string();
    if let Some(context) = conv.issue_context.as_deref().filter(|c| !c.is_empty()) {
        system.push_str("\n\nWork order context:\n");
        system.push_str(context);
    }

    let mut turns = vec![ChatTurn::new("system", system)];
    turns.extend(
        history
            .iter()
            .map(|m| ChatTurn::new(&m.role, m.content.clone())),
    );

    let reply = match ai_client::chat(&turns).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => "No reply generated.".to_string(),
        Err(e) => {
            tracing::warn!("AI relay failed for conversation {}: {}", conversation_id, e);
            "No reply generated.".to_string()
        }
    };

    let now = Utc::now().to_rfc3339();
    let assistant_message = chat_message::ActiveModel {
        conversation_id: Set(conversation_id),
        role: Set("assistant".to_owned()),
        content: Set(reply),
        created_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut conv_active: conversation::ActiveModel = conv.into();
    conv_active.updated_at = Set(now);
    conv_active.update(db).await?;

    Ok((user_message, assistant_message))
}

/// One-shot diagnosis suggestion from a problem description
pub async fn suggest(problem_description: &str) -> Result<String, ServiceError> {
    let problem = problem_description.trim();
    if problem.is_empty() {
        return Err(ServiceError::Validation(
            "Problem description is required.".to_string(),
        ));
    }

    let turns = [
        ChatTurn::new("system", SUGGEST_PROMPT),
        ChatTurn::new("user", problem),
    ];

    let text = ai_client::chat(&turns)
        .await
        .map_err(ServiceError::External)?;

    if text.trim().is_empty() {
        return Ok("No suggestion generated from AI.".to_string());
    }
    Ok(text)
}

/// Open a conversation pre-loaded with a work order's context and run one
/// assistant round over it.
pub async fn start_work_order_chat(
    db: &DatabaseConnection,
    work_order_id: i32,
) -> Result<(conversation::Model, Vec<chat_message::Model>), ServiceError> {
    let details = work_order_service::work_order_details(db, work_order_id).await?;

    let plate = details
        .vehicle
        .as_ref()
        .map(|v| v.plate_number.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let history: Vec<serde_json::Value> = match &details.vehicle {
        Some(v) => WorkOrder::find()
            .filter(work_order::Column::VehicleId.eq(v.id))
            .filter(work_order::Column::Id.ne(work_order_id))
            .order_by_desc(work_order::Column::CreatedAt)
            .all(db)
            .await?
            .iter()
            .map(|wo| {
                json!({
                    "date": wo.created_at,
                    "status": wo.status,
                    "problem": wo.problem_description,
                })
            })
            .collect(),
        None => Vec::new(),
    };

    let context = json!({
        "vehicle": details.vehicle.as_ref().map(|v| json!({
            "plate": v.plate_number,
            "make": v.make,
            "model": v.model,
            "year": v.year,
            "odometer": v.odometer,
        })),
        "customer": details.customer.as_ref().map(|c| c.full_name()),
        "current_issue": details.work_order.problem_description,
        "items": details.items.iter().map(|i| json!({
            "type": i.item_type,
            "description": i.description,
            "quantity": i.quantity,
            "unit_price": i.unit_price,
        })).collect::<Vec<_>>(),
        "vehicle_history": history,
    });

    let title = format!("Work Order #{} - {}", work_order_id, plate);
    let conv =
        create_conversation(db, title, Some(context.to_string()), Some(work_order_id)).await?;

    send_message(
        db,
        conv.id,
        "Review this work order context and assist.".to_string(),
    )
    .await?;

    conversation_with_messages(db, conv.id).await
}
