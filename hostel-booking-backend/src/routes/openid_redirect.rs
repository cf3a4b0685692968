use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use hostel_booking_openidconnect::{OpenIdRedirect, OpenIdRedirectInner};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::session::Session;
use crate::AppState;

#[derive(Serialize)]
pub struct LoginResult {
    pub subject: String,
    pub registered: bool,
    pub profile_complete: bool,
    /// Name offered as default when the user still has to register.
    pub suggested_display_name: String,
    pub csrf_token: String,
}

pub async fn openid_redirect(
    State(state): State<AppState>,
    mut session: Session,
    query: Result<Query<OpenIdRedirect<OpenIdRedirectInner>>, QueryRejection>,
) -> Result<(Session, Json<LoginResult>), AppError> {
    let Query(input) = query?;
    let openid = state.openid.ok_or(AppError::OpenIdNotConfigured)?;
    let openid_session = session.get_and_remove_openidconnect()?;
    let identity = openid.finish_authentication(openid_session, input).await?;

    session.login(identity.subject.clone());

    // the profile is created once per session start, not on every request
    let profile = match state.service.account(&identity.subject).await? {
        Some(account) => Some(state.service.ensure_profile(account.user.id).await?),
        None => None,
    };
    info!(subject = %identity.subject, registered = profile.is_some(), "logged in");

    let result = LoginResult {
        registered: profile.is_some(),
        profile_complete: profile.is_some_and(|profile| profile.gender.is_some()),
        suggested_display_name: identity.display_name().to_owned(),
        csrf_token: session.csrf_token().to_owned(),
        subject: identity.subject,
    };
    Ok((session, Json(result)))
}
