use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{json, Value};

use super::err;
use crate::auth::Actor;
use crate::services::dashboard_service;

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_date(raw: &Option<String>) -> Result<Option<NaiveDate>, (StatusCode, String)> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Some).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                "Invalid date format. Use YYYY-MM-DD.".to_string(),
            )
        }),
        None => Ok(None),
    }
}

pub async fn stats(
    State(db): State<DatabaseConnection>,
    actor: Actor,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    actor.require_admin()?;

    let from = parse_date(&query.from)?;
    let to = parse_date(&query.to)?;

    let stats = dashboard_service::stats(&db, from, to)
        .await
        .map_err(err)?;

    Ok(Json(json!({ "stats": stats })))
}
