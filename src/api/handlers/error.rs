use crate::auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error: boundary validation failures or a classified domain error.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::Auth(AuthError::InvalidCredentials | AuthError::AppNotFound) => {
                StatusCode::BAD_REQUEST
            }
            Self::Auth(AuthError::NotRights) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::UserExists | AuthError::AppExists | AuthError::AdminExists) => {
                StatusCode::CONFLICT
            }
            Self::Auth(AuthError::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
            Self::Auth(AuthError::Cancelled) => StatusCode::REQUEST_TIMEOUT,
            Self::Auth(AuthError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(reason) => (*reason).to_string(),
            // Detail stays in the logs.
            Self::Auth(AuthError::Internal(_)) => "internal error".to_string(),
            Self::Auth(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Auth(AuthError::Internal(detail)) => error!("Request failed: {detail}"),
            Self::Auth(err) if !err.is_client_fault() => warn!("Request aborted: {err}"),
            _ => {}
        }
        (status, Json(ErrorBody { error: self.message() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_error_has_a_status() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::BAD_REQUEST),
            (AuthError::AppNotFound, StatusCode::BAD_REQUEST),
            (AuthError::NotRights, StatusCode::FORBIDDEN),
            (AuthError::UserExists, StatusCode::CONFLICT),
            (AuthError::AppExists, StatusCode::CONFLICT),
            (AuthError::AdminExists, StatusCode::CONFLICT),
            (AuthError::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT),
            (AuthError::Cancelled, StatusCode::REQUEST_TIMEOUT),
            (
                AuthError::Internal("db down".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::BadRequest("Missing payload").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ApiError::from(AuthError::Internal("store: disk I/O error".to_string()));
        assert_eq!(err.message(), "internal error");
        assert_eq!(
            ApiError::from(AuthError::NotRights).message(),
            "not enough rights"
        );
    }
}
