use axum::{extract::State, http::StatusCode, response::Json};
use log::info;

use super::require_names;
use crate::db::AppState;
use crate::error::AppError;
use crate::extract::Payload;
use crate::models::profiles::{self, NewProfile, Profile};

pub async fn create_profile(
    State(state): State<AppState>,
    Payload(p): Payload<NewProfile>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    require_names([p.username.as_str()])?;
    let created = state.db.call(move |conn| profiles::create_profile(conn, &p)).await?;
    info!("created profile {} ({})", created.username, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// The profile the request was authenticated as.
pub async fn get_my_profile(profile: Profile) -> Json<Profile> {
    Json(profile)
}
