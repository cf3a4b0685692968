use openidconnect::{ClaimsVerificationError, SigningError};

#[derive(thiserror::Error, Debug)]
pub enum OpenIdConnectError {
    #[error("request token error: {0}")]
    RequestToken(String),
    #[error("claims verification error: {0}")]
    ClaimsVerification(#[from] ClaimsVerificationError),
    #[error("openid signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("invalid url: {0}")]
    Url(#[from] openidconnect::url::ParseError),
    #[error("discovery error: {0}")]
    Discovery(String),
    #[error("wrong csrf token")]
    WrongCsrfToken,
    #[error("server did not return id token")]
    NoIdTokenReturned,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("login provider reported {error}: {description}")]
    Provider { error: String, description: String },
}
