use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use log::{debug, info};
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

use super::{check_body_id, empty, require_names};
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::{JsonCollection, Payload};
use crate::models::instrument_groups::{self, InstrumentGroup};
use crate::models::instruments::{self, Instrument};
use crate::models::profiles::Profile;
use crate::models::projects::{self, Project};
use crate::models::timeseries::{self, Timeseries};
use crate::models::{AuditInfo, IdAndSlug};
use crate::utils::next_unique_slug;

pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, AppError> {
    let pp = state.db.call(|conn| projects::list_projects(conn)).await?;
    Ok(Json(pp))
}

/// Projects the caller holds any role on.
pub async fn list_my_projects(
    State(state): State<AppState>,
    profile: Profile,
) -> Result<Json<Vec<Project>>, AppError> {
    let pp = state
        .db
        .call(move |conn| projects::list_my_projects(conn, &profile.id))
        .await?;
    Ok(Json(pp))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let p = state.db.call(move |conn| projects::get_project(conn, &project_id)).await?;
    Ok(Json(p))
}

pub async fn get_project_count(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let count = state.db.call(|conn| projects::project_count(conn)).await?;
    Ok(Json(json!({ "project_count": count })))
}

pub async fn create_projects(
    State(state): State<AppState>,
    profile: Profile,
    JsonCollection(mut pp): JsonCollection<Project>,
) -> Result<(StatusCode, Json<Vec<IdAndSlug>>), AppError> {
    require_names(pp.iter().map(|p| p.name.as_str()))?;
    let now = Utc::now();
    let created = state
        .db
        .call(move |conn| -> rusqlite::Result<Vec<IdAndSlug>> {
            let mut taken: HashSet<String> = projects::list_project_slugs(conn)?.into_iter().collect();
            for p in pp.iter_mut() {
                p.slug = next_unique_slug(&p.name, &mut taken);
                p.audit = AuditInfo::created_by(profile.id, now);
            }
            projects::create_projects(conn, &pp)
        })
        .await?;
    info!("created {} project(s)", created.len());
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_project(
    State(state): State<AppState>,
    profile: Profile,
    Path(project_id): Path<Uuid>,
    Payload(mut p): Payload<Project>,
) -> Result<Json<Project>, AppError> {
    check_body_id(project_id, &mut p.id, "project id")?;
    require_names([p.name.as_str()])?;
    p.audit.stamp_update(profile.id, Utc::now());
    let updated = state.db.call(move |conn| projects::update_project(conn, &p)).await?;
    Ok(Json(updated))
}

pub async fn delete_flag_project(
    State(state): State<AppState>,
    _profile: Profile,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| projects::delete_flag_project(conn, &project_id))
        .await?;
    debug!("flagged project {} as deleted", project_id);
    Ok(empty())
}

pub async fn list_project_instruments(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Instrument>>, AppError> {
    let ii = state
        .db
        .call(move |conn| instruments::list_project_instruments(conn, &project_id))
        .await?;
    Ok(Json(ii))
}

pub async fn list_project_instrument_groups(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<InstrumentGroup>>, AppError> {
    let gg = state
        .db
        .call(move |conn| instrument_groups::list_project_instrument_groups(conn, &project_id))
        .await?;
    Ok(Json(gg))
}

pub async fn list_project_timeseries(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Timeseries>>, AppError> {
    let tt = state
        .db
        .call(move |conn| timeseries::list_project_timeseries(conn, &project_id))
        .await?;
    Ok(Json(tt))
}

pub async fn create_project_timeseries(
    State(state): State<AppState>,
    _profile: Profile,
    Path((project_id, timeseries_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| projects::create_project_timeseries(conn, &project_id, &timeseries_id))
        .await?;
    Ok(empty())
}

pub async fn delete_project_timeseries(
    State(state): State<AppState>,
    _profile: Profile,
    Path((project_id, timeseries_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| projects::delete_project_timeseries(conn, &project_id, &timeseries_id))
        .await?;
    Ok(empty())
}
