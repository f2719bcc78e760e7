use axum::{
    body::Body,
    extract::State,
    middleware::Next,
    response::{IntoResponse, Response},
    http::{HeaderMap, Request},
};
use std::time::Instant;
use log::{debug, info};
use uuid::Uuid;

use crate::db::AppState;
use crate::error::AppError;
use crate::models::profiles;

/// Header carrying the profile id asserted by the authenticating gateway.
pub const PROFILE_HEADER: &str = "x-profile-id";

pub async fn logging(
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    let response = next.run(req).await;

    let duration = start.elapsed();
    info!("{} {} -> {} in {:?}", method, path, response.status().as_u16(), duration);

    response
}

/// Resolves the caller's profile and stores it in the request extensions.
///
/// Requests without the header pass through anonymously; handlers that
/// need a profile reject them. A header naming no known profile is refused.
pub async fn attach_profile(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let profile_id = if state.config.auth_disabled {
        Some(state.config.mock_profile_id)
    } else {
        match profile_id_from_headers(req.headers()) {
            Ok(id) => id,
            Err(e) => return e.into_response(),
        }
    };

    if let Some(id) = profile_id {
        let found = state
            .db
            .call(move |conn| profiles::find_profile(conn, &id))
            .await;
        match found {
            Ok(Some(profile)) => {
                debug!("request authenticated as {}", profile.username);
                req.extensions_mut().insert(profile);
            }
            Ok(None) => return AppError::Unauthorized.into_response(),
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}

fn profile_id_from_headers(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    let Some(value) = headers.get(PROFILE_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or(AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(profile_id_from_headers(&headers), Ok(None)));

        let id = Uuid::new_v4();
        headers.insert(PROFILE_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(profile_id_from_headers(&headers).unwrap(), Some(id));

        headers.insert(PROFILE_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(profile_id_from_headers(&headers), Err(AppError::Unauthorized)));
    }
}
