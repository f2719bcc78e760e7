use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::AppState;
use crate::error::AppError;
use crate::extract::JsonCollection;
use crate::models::measurements::{self, MeasurementCollection, MeasurementCollectionCollection};
use crate::models::profiles::Profile;
use crate::models::TimeWindow;

#[derive(Deserialize, Debug)]
pub struct WindowParams {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    before: Option<String>,
}

fn parse_time(name: &str, raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::BadRequest(format!("invalid {} '{}': {}", name, raw, e)))
}

/// Builds the exclusive window from optional RFC 3339 bounds. A missing
/// `before` is now; a missing `after` is `default_days` before that.
pub(crate) fn time_window(
    after: Option<&str>,
    before: Option<&str>,
    default_days: i64,
) -> Result<TimeWindow, AppError> {
    let before = match before {
        Some(raw) => parse_time("before", raw)?,
        None => Utc::now(),
    };
    let after = match after {
        Some(raw) => parse_time("after", raw)?,
        None => before - Duration::days(default_days),
    };
    if after >= before {
        return Err(AppError::BadRequest("after must be earlier than before".to_string()));
    }
    Ok(TimeWindow { after, before })
}

pub async fn list_timeseries_measurements(
    State(state): State<AppState>,
    Path(timeseries_id): Path<Uuid>,
    Query(params): Query<WindowParams>,
) -> Result<Json<MeasurementCollection>, AppError> {
    let window = time_window(
        params.after.as_deref(),
        params.before.as_deref(),
        state.config.default_window_days,
    )?;
    debug!("measurements for {} in ({}, {})", timeseries_id, window.after, window.before);
    let mc = state
        .db
        .call(move |conn| measurements::list_timeseries_measurements(conn, &timeseries_id, &window))
        .await?;
    Ok(Json(mc))
}

/// Upserts one collection or an array of them and echoes the input.
pub async fn create_or_update_timeseries_measurements(
    State(state): State<AppState>,
    _profile: Profile,
    JsonCollection(cc): JsonCollection<MeasurementCollection>,
) -> Result<(StatusCode, Json<MeasurementCollectionCollection>), AppError> {
    let mcc = MeasurementCollectionCollection::from(cc);
    debug!(
        "writing {} point(s) across timeseries {:?}",
        mcc.point_count(),
        mcc.timeseries_ids()
    );
    let stored = state
        .db
        .call(move |conn| measurements::create_or_update_timeseries_measurements(conn, mcc))
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_bounds_are_parsed() {
        let w = time_window(Some("2024-01-01T00:00:00Z"), Some("2024-01-02T00:00:00+01:00"), 7).unwrap();
        assert_eq!(w.after, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(w.before, Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap());
    }

    #[test]
    fn missing_after_defaults_to_window_before_before() {
        let w = time_window(None, Some("2024-03-10T12:00:00Z"), 7).unwrap();
        assert_eq!(w.after, Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn bad_or_inverted_bounds_are_rejected() {
        assert!(matches!(time_window(Some("yesterday"), None, 7), Err(AppError::BadRequest(_))));
        assert!(matches!(
            time_window(Some("2024-01-02T00:00:00Z"), Some("2024-01-01T00:00:00Z"), 7),
            Err(AppError::BadRequest(_))
        ));
    }
}
