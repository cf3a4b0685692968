use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use hostel_booking_core::HostelService;
use serde::Serialize;

use crate::csrf_protection::{CsrfOnly, CsrfSafeForm};
use crate::error::AppError;
use crate::session::Session;

/// What a client needs to render its navigation and forms.
#[derive(Serialize)]
pub struct SessionInfo {
    pub csrf_token: String,
    pub logged_in: bool,
    pub subject: Option<String>,
    pub registered: bool,
    pub profile_complete: bool,
}

pub async fn current(
    State(service): State<HostelService>,
    session: Session,
) -> Result<(Session, Json<SessionInfo>), AppError> {
    let account = match session.subject() {
        Some(subject) => service.account(subject).await?,
        None => None,
    };
    let info = SessionInfo {
        csrf_token: session.csrf_token().to_owned(),
        logged_in: session.subject().is_some(),
        subject: session.subject().map(ToOwned::to_owned),
        registered: account.is_some(),
        profile_complete: account.is_some_and(|account| account.profile.gender.is_some()),
    };
    Ok((session, Json(info)))
}

pub async fn logout(
    mut session: Session,
    _form: CsrfSafeForm<CsrfOnly>,
) -> (Session, StatusCode) {
    session.logout();
    (session, StatusCode::NO_CONTENT)
}
