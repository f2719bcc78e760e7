use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{check_body_id, empty};
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::{JsonCollection, Payload};
use crate::models::instrument_notes::{self, InstrumentNote};
use crate::models::profiles::Profile;
use crate::models::AuditInfo;

pub async fn list_instrument_notes(State(state): State<AppState>) -> Result<Json<Vec<InstrumentNote>>, AppError> {
    let nn = state.db.call(|conn| instrument_notes::list_instrument_notes(conn)).await?;
    Ok(Json(nn))
}

pub async fn list_instrument_instrument_notes(
    State(state): State<AppState>,
    Path(instrument_id): Path<Uuid>,
) -> Result<Json<Vec<InstrumentNote>>, AppError> {
    let nn = state
        .db
        .call(move |conn| instrument_notes::list_instrument_instrument_notes(conn, &instrument_id))
        .await?;
    Ok(Json(nn))
}

pub async fn get_instrument_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> Result<Json<InstrumentNote>, AppError> {
    let n = state
        .db
        .call(move |conn| instrument_notes::get_instrument_note(conn, &note_id))
        .await?;
    Ok(Json(n))
}

pub async fn create_instrument_notes(
    State(state): State<AppState>,
    profile: Profile,
    JsonCollection(mut nn): JsonCollection<InstrumentNote>,
) -> Result<(StatusCode, Json<Vec<InstrumentNote>>), AppError> {
    let now = Utc::now();
    for n in nn.iter_mut() {
        n.audit = AuditInfo::created_by(profile.id, now);
    }
    let created = state
        .db
        .call(move |conn| instrument_notes::create_instrument_notes(conn, &nn))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_instrument_note(
    State(state): State<AppState>,
    profile: Profile,
    Path(note_id): Path<Uuid>,
    Payload(mut n): Payload<InstrumentNote>,
) -> Result<Json<InstrumentNote>, AppError> {
    check_body_id(note_id, &mut n.id, "note id")?;
    n.audit.stamp_update(profile.id, Utc::now());
    let updated = state
        .db
        .call(move |conn| instrument_notes::update_instrument_note(conn, &n))
        .await?;
    Ok(Json(updated))
}

pub async fn delete_instrument_note(
    State(state): State<AppState>,
    _profile: Profile,
    Path(note_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| instrument_notes::delete_instrument_note(conn, &note_id))
        .await?;
    Ok(empty())
}
