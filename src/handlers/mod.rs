pub mod aware;
pub mod domains;
pub mod instrument_groups;
pub mod instrument_notes;
pub mod instrument_status;
pub mod instruments;
pub mod measurements;
pub mod plot_configurations;
pub mod profiles;
pub mod projects;
pub mod timeseries;


use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;

/// Reconciles the id in the URL with the id in a request body. A body
/// without an id adopts the URL's.
fn check_body_id(path_id: Uuid, body_id: &mut Uuid, what: &str) -> Result<(), AppError> {
    if body_id.is_nil() {
        *body_id = path_id;
    }
    if *body_id != path_id {
        return Err(AppError::BadRequest(format!(
            "url {} does not match object id in body",
            what
        )));
    }
    Ok(())
}

fn require_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<(), AppError> {
    if names.into_iter().any(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    Ok(())
}

fn empty() -> Json<Value> {
    Json(json!({}))
}
