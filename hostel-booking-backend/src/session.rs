use core::convert::Infallible;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::PrivateCookieJar;
use hostel_booking_core::service::Account;
use hostel_booking_openidconnect::OpenIdSession;
use rand::{thread_rng, Rng as _};

use crate::error::AppError;
use crate::AppState;

fn random_token() -> String {
    thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// Encrypted cookie state of one browser.
///
/// Holds the csrf token that every form has to echo back and, once the
/// user logged in, the subject the identity provider vouched for.
#[derive(Clone)]
#[must_use]
pub struct Session {
    private_cookies: PrivateCookieJar,
    csrf_token: String,
    subject: Option<String>,
}

impl Session {
    const COOKIE_NAME_OPENIDCONNECT: &'static str = "__Host-openidconnect";
    const COOKIE_NAME_SESSION: &'static str = "__Host-session";

    pub fn from_jar(private_cookies: PrivateCookieJar) -> Self {
        // the csrf token is alphanumeric, so the first colon separates it
        let stored = private_cookies
            .get(Self::COOKIE_NAME_SESSION)
            .map(|cookie| match cookie.value().split_once(':') {
                Some((csrf_token, subject)) => (csrf_token.to_owned(), Some(subject.to_owned())),
                None => (cookie.value().to_owned(), None),
            })
            .filter(|(csrf_token, _)| !csrf_token.is_empty());

        let mut session = Self {
            private_cookies,
            csrf_token: String::new(),
            subject: None,
        };
        match stored {
            Some((csrf_token, subject)) => {
                session.csrf_token = csrf_token;
                session.subject = subject;
            }
            None => session.store(random_token(), None),
        }
        session
    }

    fn store(&mut self, csrf_token: String, subject: Option<String>) {
        let value = match &subject {
            Some(subject) => format!("{csrf_token}:{subject}"),
            None => csrf_token.clone(),
        };
        let cookie = Cookie::build((Self::COOKIE_NAME_SESSION, value))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/");
        self.private_cookies = self.private_cookies.clone().add(cookie);
        self.csrf_token = csrf_token;
        self.subject = subject;
    }

    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Starts an authenticated session. The csrf token is rotated.
    pub fn login(&mut self, subject: String) {
        self.store(random_token(), Some(subject));
    }

    pub fn logout(&mut self) {
        self.store(random_token(), None);
    }

    pub fn set_openidconnect(&mut self, input: &OpenIdSession) -> Result<(), AppError> {
        let cookie = Cookie::build((
            Self::COOKIE_NAME_OPENIDCONNECT,
            serde_json::to_string(input)?,
        ))
        .http_only(true)
        .same_site(SameSite::Lax) // the provider redirects back cross-site
        .secure(true)
        .path("/");
        self.private_cookies = self.private_cookies.clone().add(cookie);
        Ok(())
    }

    pub fn get_and_remove_openidconnect(&mut self) -> Result<OpenIdSession, AppError> {
        let value = self
            .private_cookies
            .get(Self::COOKIE_NAME_OPENIDCONNECT)
            .ok_or(AppError::OpenIdTokenNotFound)?;
        let openid_session = serde_json::from_str(value.value())?;
        self.private_cookies = self
            .private_cookies
            .clone()
            .remove(Cookie::build(Self::COOKIE_NAME_OPENIDCONNECT).path("/"));
        Ok(openid_session)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let private_cookies = PrivateCookieJar::<Key>::from_request_parts(parts, state).await?;
        Ok(Self::from_jar(private_cookies))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.private_cookies.into_response_parts(res)
    }
}

/// A logged in user that may not have registered yet.
pub struct LoggedIn {
    pub session: Session,
    pub subject: String,
}

#[async_trait]
impl FromRequestParts<AppState> for LoggedIn {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = match Session::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(infallible) => match infallible {},
        };
        let subject = session.subject().ok_or(AppError::NotLoggedIn)?.to_owned();
        Ok(Self { session, subject })
    }
}

/// The registered user behind the request, passed explicitly into every
/// booking operation.
pub struct CurrentUser {
    pub session: Session,
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let LoggedIn { session, subject } = LoggedIn::from_request_parts(parts, state).await?;
        let account = state
            .service
            .account(&subject)
            .await?
            .ok_or(AppError::NotRegistered)?;
        Ok(Self { session, account })
    }
}
