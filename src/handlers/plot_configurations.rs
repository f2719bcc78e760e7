use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use super::{check_body_id, empty, require_names};
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::Payload;
use crate::models::plot_configurations::{self, PlotConfiguration};
use crate::models::profiles::Profile;
use crate::models::AuditInfo;
use crate::utils::next_unique_slug;

pub async fn list_plot_configurations(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<PlotConfiguration>>, AppError> {
    let pp = state
        .db
        .call(move |conn| plot_configurations::list_plot_configurations(conn, &project_id))
        .await?;
    Ok(Json(pp))
}

pub async fn get_plot_configuration(
    State(state): State<AppState>,
    Path((project_id, plot_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PlotConfiguration>, AppError> {
    let pc = state
        .db
        .call(move |conn| plot_configurations::get_plot_configuration(conn, &project_id, &plot_id))
        .await?;
    Ok(Json(pc))
}

pub async fn create_plot_configuration(
    State(state): State<AppState>,
    profile: Profile,
    Path(project_id): Path<Uuid>,
    Payload(mut pc): Payload<PlotConfiguration>,
) -> Result<(StatusCode, Json<PlotConfiguration>), AppError> {
    require_names([pc.name.as_str()])?;
    pc.project_id = project_id;
    pc.audit = AuditInfo::created_by(profile.id, Utc::now());
    let created = state
        .db
        .call(move |conn| -> rusqlite::Result<PlotConfiguration> {
            let mut taken: HashSet<String> =
                plot_configurations::list_plot_configuration_slugs(conn)?.into_iter().collect();
            pc.slug = next_unique_slug(&pc.name, &mut taken);
            plot_configurations::create_plot_configuration(conn, &pc)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Renames a plot and replaces its timeseries with the set in the body.
pub async fn update_plot_configuration(
    State(state): State<AppState>,
    profile: Profile,
    Path((project_id, plot_id)): Path<(Uuid, Uuid)>,
    Payload(mut pc): Payload<PlotConfiguration>,
) -> Result<Json<PlotConfiguration>, AppError> {
    check_body_id(plot_id, &mut pc.id, "plot configuration id")?;
    check_body_id(project_id, &mut pc.project_id, "project id")?;
    require_names([pc.name.as_str()])?;
    pc.audit.stamp_update(profile.id, Utc::now());
    debug!("plot {} now holds {} timeseries", plot_id, pc.timeseries_id.len());
    let updated = state
        .db
        .call(move |conn| plot_configurations::update_plot_configuration(conn, &pc))
        .await?;
    Ok(Json(updated))
}

pub async fn delete_plot_configuration(
    State(state): State<AppState>,
    _profile: Profile,
    Path((project_id, plot_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| plot_configurations::delete_plot_configuration(conn, &project_id, &plot_id))
        .await?;
    Ok(empty())
}
