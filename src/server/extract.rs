//! Extractors that turn rejections into [`ServiceError`]s, so malformed input
//! gets the same 400 body as a failed validation.

use crate::error::ServiceError;
use crate::server::AppState;
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub struct ApiPath<T>(pub T);

/// A caller that presented a valid bearer token.
///
/// Must come before any body extractor so unauthenticated writes are refused
/// without reading the body.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub client: String,
}

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let client = state.auth.verify(header)?;
        debug!("{} {} authorized for {}", parts.method, parts.uri.path(), client);
        Ok(Self { client })
    }
}
