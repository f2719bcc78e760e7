use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use super::{check_body_id, empty, require_names};
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::{JsonCollection, Payload};
use crate::models::profiles::Profile;
use crate::models::timeseries::{self, Timeseries};
use crate::utils::next_unique_slug;

pub async fn list_timeseries(State(state): State<AppState>) -> Result<Json<Vec<Timeseries>>, AppError> {
    let tt = state.db.call(|conn| timeseries::list_timeseries(conn)).await?;
    Ok(Json(tt))
}

pub async fn list_instrument_timeseries(
    State(state): State<AppState>,
    Path(instrument_id): Path<Uuid>,
) -> Result<Json<Vec<Timeseries>>, AppError> {
    let tt = state
        .db
        .call(move |conn| timeseries::list_instrument_timeseries(conn, &instrument_id))
        .await?;
    Ok(Json(tt))
}

pub async fn get_timeseries(
    State(state): State<AppState>,
    Path(timeseries_id): Path<Uuid>,
) -> Result<Json<Timeseries>, AppError> {
    let t = state
        .db
        .call(move |conn| timeseries::get_timeseries(conn, &timeseries_id))
        .await?;
    Ok(Json(t))
}

pub async fn create_timeseries(
    State(state): State<AppState>,
    _profile: Profile,
    JsonCollection(mut tt): JsonCollection<Timeseries>,
) -> Result<(StatusCode, Json<Vec<Timeseries>>), AppError> {
    require_names(tt.iter().map(|t| t.name.as_str()))?;
    let created = state
        .db
        .call(move |conn| -> rusqlite::Result<Vec<Timeseries>> {
            let mut taken: HashSet<String> = timeseries::list_timeseries_slugs(conn)?.into_iter().collect();
            for t in tt.iter_mut() {
                t.slug = next_unique_slug(&t.name, &mut taken);
            }
            timeseries::create_timeseries(conn, &tt)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_timeseries(
    State(state): State<AppState>,
    _profile: Profile,
    Path(timeseries_id): Path<Uuid>,
    Payload(mut t): Payload<Timeseries>,
) -> Result<Json<Timeseries>, AppError> {
    check_body_id(timeseries_id, &mut t.id, "timeseries id")?;
    require_names([t.name.as_str()])?;
    let updated = state.db.call(move |conn| timeseries::update_timeseries(conn, &t)).await?;
    Ok(Json(updated))
}

pub async fn delete_timeseries(
    State(state): State<AppState>,
    _profile: Profile,
    Path(timeseries_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| timeseries::delete_timeseries(conn, &timeseries_id))
        .await?;
    Ok(empty())
}
