use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::AppState;
use crate::error::AppError;
use crate::extract::Payload;
use crate::models::aware::{self, AwareParameter, AwarePlatformParameterConfig};
use crate::models::profiles::Profile;

pub async fn list_aware_parameters(State(state): State<AppState>) -> Result<Json<Vec<AwareParameter>>, AppError> {
    let pp = state.db.call(|conn| aware::list_aware_parameters(conn)).await?;
    Ok(Json(pp))
}

/// Per-platform routing of AWARE parameter keys onto timeseries.
pub async fn list_aware_platform_parameter_config(
    State(state): State<AppState>,
) -> Result<Json<Vec<AwarePlatformParameterConfig>>, AppError> {
    let cc = state
        .db
        .call(|conn| aware::list_aware_platform_parameter_config(conn))
        .await?;
    Ok(Json(cc))
}

#[derive(Deserialize, Debug)]
pub struct NewAwarePlatform {
    aware_id: Uuid,
    instrument_id: Uuid,
}

pub async fn create_aware_platform(
    State(state): State<AppState>,
    _profile: Profile,
    Payload(p): Payload<NewAwarePlatform>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let id = state
        .db
        .call(move |conn| aware::create_aware_platform(conn, &p.aware_id, &p.instrument_id))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
