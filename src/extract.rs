use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::profiles::Profile;
use crate::utils::decode_collection;

/// Request body holding either one `T` or an array of them.
#[derive(Debug)]
pub struct JsonCollection<T>(pub Vec<T>);

#[async_trait]
impl<T, S> FromRequest<S> for JsonCollection<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(Self(decode_collection(&body)?))
    }
}

/// JSON request body whose decode failures surface as `400 Bad Request`.
#[derive(Debug)]
pub struct Payload<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(Self(serde_json::from_slice(&body)?))
    }
}

/// The authenticated profile placed in the request by `middleware::attach_profile`.
#[async_trait]
impl<S> FromRequestParts<S> for Profile
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Profile>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
