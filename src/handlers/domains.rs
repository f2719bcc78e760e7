use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::db::AppState;
use crate::error::AppError;
use crate::models::domains::{self, Domain};

pub async fn list_domains(State(state): State<AppState>) -> Result<Json<Vec<Domain>>, AppError> {
    let dd = state.db.call(|conn| domains::list_domains(conn)).await?;
    Ok(Json(dd))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
