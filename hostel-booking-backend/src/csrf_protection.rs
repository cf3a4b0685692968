use axum::extract::{FromRequest, Request};
use axum::http::Method;
use axum::{async_trait, Form, RequestExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::AppError;
use crate::session::Session;
use crate::AppState;

pub trait CsrfToken {
    fn csrf_token(&self) -> &str;
}

/// Form body that is only accepted when it echoes the csrf token of the
/// session.
pub struct CsrfSafeForm<T: CsrfToken> {
    pub value: T,
}

#[async_trait]
impl<T> FromRequest<AppState> for CsrfSafeForm<T>
where
    T: DeserializeOwned + CsrfToken + Send,
{
    type Rejection = AppError;

    async fn from_request(mut req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let not_get_or_head = !(req.method() == Method::GET || req.method() == Method::HEAD);
        let session = match req
            .extract_parts_with_state::<Session, AppState>(state)
            .await
        {
            Ok(session) => session,
            Err(infallible) => match infallible {},
        };

        let Form(value) = Form::<T>::from_request(req, state).await?;
        if not_get_or_head && value.csrf_token() != session.csrf_token() {
            return Err(AppError::WrongCsrfToken);
        }
        Ok(Self { value })
    }
}

/// Form that carries nothing but the csrf token.
#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

impl CsrfToken for CsrfOnly {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}
