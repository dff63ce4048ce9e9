use crate::error::ServiceError;
use crate::view_models::BadRequestResultVm;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, error};

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation(errors) => {
                debug!("Rejected request: {}", errors);
                (
                    StatusCode::BAD_REQUEST,
                    Json(BadRequestResultVm::from(&errors)),
                )
                    .into_response()
            }
            ServiceError::Unauthorized(reason) => {
                debug!("Unauthorized request: {}", reason);
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    "Unauthorized",
                )
                    .into_response()
            }
            not_found @ ServiceError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, not_found.to_string()).into_response()
            }
            ServiceError::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred",
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::invalid("body", rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::invalid("path", rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrors;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (ServiceError::invalid("name", "must not be empty"), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("missing".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::not_found("vehicle", 3), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                ServiceError::Database {
                    message: "disk full".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Validation(ValidationErrors::new()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = ServiceError::Unauthorized("invalid token".into()).into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
