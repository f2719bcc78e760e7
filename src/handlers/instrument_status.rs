use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::empty;
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::JsonCollection;
use crate::models::instrument_status::{self, InstrumentStatus};
use crate::models::profiles::Profile;

pub async fn list_instrument_status(
    State(state): State<AppState>,
    Path(instrument_id): Path<Uuid>,
) -> Result<Json<Vec<InstrumentStatus>>, AppError> {
    let ss = state
        .db
        .call(move |conn| instrument_status::list_instrument_status(conn, &instrument_id))
        .await?;
    Ok(Json(ss))
}

pub async fn get_instrument_status(
    State(state): State<AppState>,
    Path((instrument_id, status_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<InstrumentStatus>, AppError> {
    let s = state
        .db
        .call(move |conn| instrument_status::get_instrument_status(conn, &instrument_id, &status_id))
        .await?;
    Ok(Json(s))
}

pub async fn create_or_update_instrument_status(
    State(state): State<AppState>,
    _profile: Profile,
    Path(instrument_id): Path<Uuid>,
    JsonCollection(mut ss): JsonCollection<InstrumentStatus>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    for s in ss.iter_mut() {
        s.id = Uuid::new_v4();
    }
    state
        .db
        .call(move |conn| instrument_status::create_or_update_instrument_status(conn, &instrument_id, &ss))
        .await?;
    Ok((StatusCode::CREATED, empty()))
}

pub async fn delete_instrument_status(
    State(state): State<AppState>,
    _profile: Profile,
    Path((instrument_id, status_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| instrument_status::delete_instrument_status(conn, &instrument_id, &status_id))
        .await?;
    Ok(empty())
}
