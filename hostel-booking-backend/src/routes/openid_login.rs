use std::sync::Arc;

use axum::extract::State;
use axum::response::Redirect;
use hostel_booking_openidconnect::OpenIdConnect;

use crate::csrf_protection::{CsrfOnly, CsrfSafeForm};
use crate::error::AppError;
use crate::session::Session;

pub async fn openid_login(
    State(openid): State<Option<Arc<OpenIdConnect>>>,
    mut session: Session,
    _form: CsrfSafeForm<CsrfOnly>,
) -> Result<(Session, Redirect), AppError> {
    let openid = openid.ok_or(AppError::OpenIdNotConfigured)?;
    let (auth_url, openid_session) = openid.begin_authentication().await?;
    session.set_openidconnect(&openid_session)?;
    Ok((session, Redirect::to(&auth_url)))
}
