use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use super::{check_body_id, empty, require_names};
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::{JsonCollection, Payload};
use crate::models::instrument_groups::{self, InstrumentGroup};
use crate::models::instruments::Instrument;
use crate::models::profiles::Profile;
use crate::models::AuditInfo;
use crate::utils::next_unique_slug;

pub async fn list_instrument_groups(
    State(state): State<AppState>,
) -> Result<Json<Vec<InstrumentGroup>>, AppError> {
    let gg = state.db.call(|conn| instrument_groups::list_instrument_groups(conn)).await?;
    Ok(Json(gg))
}

pub async fn get_instrument_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<InstrumentGroup>, AppError> {
    let g = state
        .db
        .call(move |conn| instrument_groups::get_instrument_group(conn, &group_id))
        .await?;
    Ok(Json(g))
}

pub async fn create_instrument_groups(
    State(state): State<AppState>,
    profile: Profile,
    JsonCollection(mut gg): JsonCollection<InstrumentGroup>,
) -> Result<(StatusCode, Json<Vec<InstrumentGroup>>), AppError> {
    require_names(gg.iter().map(|g| g.name.as_str()))?;
    let now = Utc::now();
    let created = state
        .db
        .call(move |conn| -> rusqlite::Result<Vec<InstrumentGroup>> {
            let mut taken: HashSet<String> =
                instrument_groups::list_instrument_group_slugs(conn)?.into_iter().collect();
            for g in gg.iter_mut() {
                g.slug = next_unique_slug(&g.name, &mut taken);
                g.audit = AuditInfo::created_by(profile.id, now);
            }
            instrument_groups::create_instrument_groups(conn, &gg)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_instrument_group(
    State(state): State<AppState>,
    profile: Profile,
    Path(group_id): Path<Uuid>,
    Payload(mut g): Payload<InstrumentGroup>,
) -> Result<Json<InstrumentGroup>, AppError> {
    check_body_id(group_id, &mut g.id, "instrument group id")?;
    require_names([g.name.as_str()])?;
    g.audit.stamp_update(profile.id, Utc::now());
    let updated = state
        .db
        .call(move |conn| instrument_groups::update_instrument_group(conn, &g))
        .await?;
    Ok(Json(updated))
}

pub async fn delete_flag_instrument_group(
    State(state): State<AppState>,
    _profile: Profile,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| instrument_groups::delete_flag_instrument_group(conn, &group_id))
        .await?;
    Ok(empty())
}

pub async fn list_instrument_group_instruments(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<Instrument>>, AppError> {
    let ii = state
        .db
        .call(move |conn| instrument_groups::list_instrument_group_instruments(conn, &group_id))
        .await?;
    Ok(Json(ii))
}

pub async fn create_instrument_group_instrument(
    State(state): State<AppState>,
    _profile: Profile,
    Path((group_id, instrument_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state
        .db
        .call(move |conn| instrument_groups::create_instrument_group_instrument(conn, &group_id, &instrument_id))
        .await?;
    Ok((StatusCode::CREATED, empty()))
}

pub async fn delete_instrument_group_instrument(
    State(state): State<AppState>,
    _profile: Profile,
    Path((group_id, instrument_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| instrument_groups::delete_instrument_group_instrument(conn, &group_id, &instrument_id))
        .await?;
    Ok(empty())
}
