use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Duration, Utc};
use log::info;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::measurements::time_window;
use super::{check_body_id, empty, require_names};
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::{JsonCollection, Payload};
use crate::models::instruments::{self, Instrument};
use crate::models::measurements::{self, MeasurementCollection};
use crate::models::profiles::Profile;
use crate::models::{AuditInfo, IdAndSlug};
use crate::utils::next_unique_slug;

const DEFAULT_INTERVAL_SECONDS: i64 = 3600;

pub async fn list_instruments(State(state): State<AppState>) -> Result<Json<Vec<Instrument>>, AppError> {
    let ii = state.db.call(|conn| instruments::list_instruments(conn)).await?;
    Ok(Json(ii))
}

pub async fn get_instrument(
    State(state): State<AppState>,
    Path(instrument_id): Path<Uuid>,
) -> Result<Json<Instrument>, AppError> {
    let i = state
        .db
        .call(move |conn| instruments::get_instrument(conn, &instrument_id))
        .await?;
    Ok(Json(i))
}

pub async fn get_instrument_count(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let count = state.db.call(|conn| instruments::instrument_count(conn)).await?;
    Ok(Json(json!({ "instrument_count": count })))
}

/// Rejects a batch containing a name already used in the same project,
/// either by a stored instrument or earlier in the batch. Names compare
/// case-insensitively.
fn validate_instrument_names(conn: &Connection, ii: &[Instrument]) -> Result<(), AppError> {
    let mut seen: HashMap<Option<Uuid>, HashSet<String>> = HashMap::new();
    for i in ii {
        let names = match seen.entry(i.project_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let stored = match &i.project_id {
                    Some(project_id) => instruments::project_instrument_names(conn, project_id)?,
                    None => HashSet::new(),
                };
                e.insert(stored)
            }
        };
        if !names.insert(i.name.to_uppercase()) {
            return Err(AppError::BadRequest(format!(
                "instrument name '{}' is already taken",
                i.name
            )));
        }
    }
    Ok(())
}

pub async fn create_instruments(
    State(state): State<AppState>,
    profile: Profile,
    JsonCollection(mut ii): JsonCollection<Instrument>,
) -> Result<(StatusCode, Json<Vec<IdAndSlug>>), AppError> {
    require_names(ii.iter().map(|i| i.name.as_str()))?;
    let now = Utc::now();
    let created = state
        .db
        .call(move |conn| -> Result<Vec<IdAndSlug>, AppError> {
            validate_instrument_names(conn, &ii)?;
            let mut taken: HashSet<String> = instruments::list_instrument_slugs(conn)?.into_iter().collect();
            for i in ii.iter_mut() {
                i.slug = next_unique_slug(&i.name, &mut taken);
                i.audit = AuditInfo::created_by(profile.id, now);
            }
            Ok(instruments::create_instruments(conn, &ii)?)
        })
        .await?;
    info!("created {} instrument(s)", created.len());
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_instrument(
    State(state): State<AppState>,
    profile: Profile,
    Path(instrument_id): Path<Uuid>,
    Payload(mut i): Payload<Instrument>,
) -> Result<Json<Instrument>, AppError> {
    check_body_id(instrument_id, &mut i.id, "instrument id")?;
    require_names([i.name.as_str()])?;
    i.audit.stamp_update(profile.id, Utc::now());
    let updated = state.db.call(move |conn| instruments::update_instrument(conn, &i)).await?;
    Ok(Json(updated))
}

pub async fn delete_flag_instrument(
    State(state): State<AppState>,
    _profile: Profile,
    Path(instrument_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .db
        .call(move |conn| instruments::delete_flag_instrument(conn, &instrument_id))
        .await?;
    Ok(empty())
}

#[derive(Deserialize, Debug)]
pub struct ComputedParams {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    interval: Option<i64>,
}

/// Every timeseries of the instrument averaged over `interval`-second buckets.
pub async fn list_computed_timeseries(
    State(state): State<AppState>,
    Path(instrument_id): Path<Uuid>,
    Query(params): Query<ComputedParams>,
) -> Result<Json<Vec<MeasurementCollection>>, AppError> {
    let window = time_window(
        params.after.as_deref(),
        params.before.as_deref(),
        state.config.default_window_days,
    )?;
    let seconds = params.interval.unwrap_or(DEFAULT_INTERVAL_SECONDS);
    if seconds <= 0 {
        return Err(AppError::BadRequest("interval must be a positive number of seconds".to_string()));
    }
    let interval = Duration::try_seconds(seconds)
        .ok_or_else(|| AppError::BadRequest(format!("interval of {} seconds is out of range", seconds)))?;
    let cc = state
        .db
        .call(move |conn| measurements::computed_timeseries(conn, &[instrument_id], &window, interval))
        .await?;
    Ok(Json(cc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::INSTRUMENT_TYPE_PIEZOMETER;
    use crate::models::fixtures;

    fn instrument(name: &str, project_id: Option<Uuid>) -> Instrument {
        Instrument {
            name: name.into(),
            type_id: INSTRUMENT_TYPE_PIEZOMETER,
            project_id,
            ..Default::default()
        }
    }

    #[test]
    fn names_must_be_unique_within_a_project() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let p = fixtures::project(&mut conn, creator, "Names");
        fixtures::instrument(&mut conn, creator, Some(p), "Well 1");

        let clash = validate_instrument_names(&conn, &[instrument("WELL 1", Some(p))]);
        assert!(matches!(clash, Err(AppError::BadRequest(_))));

        let batch = validate_instrument_names(&conn, &[instrument("Well 2", Some(p)), instrument("well 2", Some(p))]);
        assert!(matches!(batch, Err(AppError::BadRequest(_))));

        let other_project = validate_instrument_names(&conn, &[instrument("Well 1", None)]);
        assert!(other_project.is_ok());
    }
}
