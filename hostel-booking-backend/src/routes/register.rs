use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use hostel_booking_core::error::StoreError;
use hostel_booking_core::model::{Gender, Profile};
use hostel_booking_core::service::Account;
use hostel_booking_core::store::Registration;
use hostel_booking_core::HostelService;
use serde::Deserialize;

use crate::csrf_protection::{CsrfSafeForm, CsrfToken};
use crate::error::AppError;
use crate::session::{CurrentUser, LoggedIn, Session};

#[derive(Deserialize)]
pub struct RegisterPayload {
    csrf_token: String,
    display_name: String,
    gender: Gender,
}

impl CsrfToken for RegisterPayload {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

pub async fn register(
    State(service): State<HostelService>,
    LoggedIn { session, subject }: LoggedIn,
    form: CsrfSafeForm<RegisterPayload>,
) -> Result<(StatusCode, Session, Json<Account>), AppError> {
    let display_name = form.value.display_name.trim();
    if display_name.is_empty() {
        return Err(StoreError::Invalid("display name must not be empty".to_owned()).into());
    }
    let account = service
        .register(Registration {
            subject,
            display_name: display_name.to_owned(),
            gender: form.value.gender,
        })
        .await?;
    Ok((StatusCode::CREATED, session, Json(account)))
}

#[derive(Deserialize)]
pub struct ProfilePayload {
    csrf_token: String,
    gender: Gender,
}

impl CsrfToken for ProfilePayload {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

pub async fn complete_profile(
    State(service): State<HostelService>,
    CurrentUser { session, account }: CurrentUser,
    form: CsrfSafeForm<ProfilePayload>,
) -> Result<(Session, Json<Profile>), AppError> {
    let profile = service
        .complete_profile(&account.profile, form.value.gender)
        .await?;
    Ok((session, Json(profile)))
}
