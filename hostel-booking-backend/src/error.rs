use axum::extract::rejection::{FormRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hostel_booking_config::ConfigError;
use hostel_booking_core::error::{BookingError, StoreError};
use hostel_booking_database::error::DatabaseError;
use hostel_booking_openidconnect::error::OpenIdConnectError;
use serde::Serialize;
use tracing::{debug, error};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("form submission error: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("invalid path: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("invalid query: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("openid connect error: {0}")]
    OpenIdConnect(#[from] OpenIdConnectError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wrong csrf token")]
    WrongCsrfToken,
    #[error("You need to log in first.")]
    NotLoggedIn,
    #[error("Please register with your name and gender first.")]
    NotRegistered,
    #[error(
        "Your login session has most likely expired, please try again. If this keeps happening, \
         report the problem to a server administrator."
    )]
    OpenIdTokenNotFound,
    #[error("The server administrator has not configured OpenID.")]
    OpenIdNotConfigured,
}

/// What the client should offer the user next.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    CompleteProfile,
    ConfirmSwitch,
    Retry,
    Login,
    Register,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

const fn rejection(error: &BookingError) -> (StatusCode, Option<Action>) {
    match error {
        BookingError::ProfileIncomplete => (StatusCode::FORBIDDEN, Some(Action::CompleteProfile)),
        BookingError::AccessDenied { .. } => (StatusCode::FORBIDDEN, None),
        BookingError::AlreadyBooked { .. } => (StatusCode::CONFLICT, Some(Action::ConfirmSwitch)),
        BookingError::RoomFull(_) | BookingError::NotBooked(_) => (StatusCode::CONFLICT, None),
        BookingError::ConcurrencyConflict => (StatusCode::CONFLICT, Some(Action::Retry)),
    }
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, Option<Action>) {
        match self {
            Self::Store(StoreError::Rejected(booking)) => {
                let (status, action) = rejection(booking);
                (status, booking.kind(), action)
            }
            Self::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not-found", None),
            Self::Store(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict", None),
            Self::Store(StoreError::Invalid(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid", None)
            }
            Self::FormRejection(_) | Self::PathRejection(_) | Self::QueryRejection(_) => {
                (StatusCode::BAD_REQUEST, "bad-request", None)
            }
            Self::WrongCsrfToken => (StatusCode::BAD_REQUEST, "wrong-csrf-token", None),
            Self::NotLoggedIn => (StatusCode::UNAUTHORIZED, "not-logged-in", Some(Action::Login)),
            Self::NotRegistered => (StatusCode::FORBIDDEN, "not-registered", Some(Action::Register)),
            Self::OpenIdTokenNotFound
            | Self::OpenIdConnect(
                OpenIdConnectError::WrongCsrfToken | OpenIdConnectError::Provider { .. },
            ) => (StatusCode::BAD_REQUEST, "login-failed", Some(Action::Login)),
            Self::OpenIdNotConfigured => {
                (StatusCode::SERVICE_UNAVAILABLE, "login-unavailable", None)
            }
            Self::Store(StoreError::Backend(_))
            | Self::Json(_)
            | Self::Database(_)
            | Self::OpenIdConnect(_)
            | Self::Config(_)
            | Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, action) = self.classify();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error, please try again later.".to_owned()
        } else {
            debug!(error = %self, kind, "request rejected");
            self.to_string()
        };
        (
            status,
            Json(ErrorBody {
                error: kind,
                message,
                action,
            }),
        )
            .into_response()
    }
}
