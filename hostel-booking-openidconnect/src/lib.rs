pub mod error;

use hostel_booking_config::OpenIdConnectConfig;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::reqwest::async_http_client;
use openidconnect::{
    AccessTokenHash, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::OpenIdConnectError;

pub const REDIRECT_PATH: &str = "/openidconnect-redirect";

#[derive(Deserialize, Debug)]
pub struct OpenIdRedirect<T> {
    pub state: String,
    #[serde(flatten)]
    pub inner: T,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum OpenIdRedirectInner {
    Success(OpenIdRedirectSuccess),
    Error(OpenIdRedirectError),
}

#[derive(Deserialize, Serialize, Debug)]
pub struct OpenIdRedirectError {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct OpenIdRedirectSuccess {
    pub session_state: Option<String>,
    pub code: String,
}

/// State that has to survive the round trip through the provider.
#[derive(Serialize, Deserialize)]
pub struct OpenIdSession {
    pub verifier: PkceCodeVerifier,
    pub nonce: Nonce,
    pub csrf_token: CsrfToken,
}

/// Who logged in, as vouched for by the provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl AuthenticatedIdentity {
    /// Best guess for a display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.subject)
    }
}

/// Authorization code flow with PKCE against one provider. Provider metadata
/// is discovered on first use.
pub struct OpenIdConnect {
    config: OpenIdConnectConfig,
    redirect_url: String,
    client: OnceCell<CoreClient>,
}

impl OpenIdConnect {
    #[must_use]
    pub fn new(config: OpenIdConnectConfig, base_url: &str) -> Self {
        Self {
            config,
            redirect_url: format!("{}{REDIRECT_PATH}", base_url.trim_end_matches('/')),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&CoreClient, OpenIdConnectError> {
        self.client
            .get_or_try_init(|| async {
                let provider_metadata = CoreProviderMetadata::discover_async(
                    IssuerUrl::new(self.config.issuer_url.clone())?,
                    async_http_client,
                )
                .await
                .map_err(|error| OpenIdConnectError::Discovery(error.to_string()))?;
                info!(issuer = %self.config.issuer_url, "discovered openid provider");

                Ok(CoreClient::from_provider_metadata(
                    provider_metadata,
                    ClientId::new(self.config.client_id.clone()),
                    Some(ClientSecret::new(self.config.client_secret.clone())),
                )
                .set_redirect_uri(RedirectUrl::new(self.redirect_url.clone())?))
            })
            .await
    }

    pub async fn begin_authentication(
        &self,
    ) -> Result<(String, OpenIdSession), OpenIdConnectError> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token, nonce) = self
            .client()
            .await?
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .add_scope(Scope::new("email".to_owned()))
            .add_scope(Scope::new("profile".to_owned()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok((
            auth_url.to_string(),
            OpenIdSession {
                verifier: pkce_verifier,
                nonce,
                csrf_token,
            },
        ))
    }

    pub async fn finish_authentication(
        &self,
        session: OpenIdSession,
        input: OpenIdRedirect<OpenIdRedirectInner>,
    ) -> Result<AuthenticatedIdentity, OpenIdConnectError> {
        if &input.state != session.csrf_token.secret() {
            return Err(OpenIdConnectError::WrongCsrfToken);
        }
        let success = match input.inner {
            OpenIdRedirectInner::Success(success) => success,
            OpenIdRedirectInner::Error(error) => {
                return Err(OpenIdConnectError::Provider {
                    error: error.error,
                    description: error.error_description,
                })
            }
        };

        let client = self.client().await?;
        let token_response = client
            .exchange_code(AuthorizationCode::new(success.code))
            .set_pkce_verifier(session.verifier)
            .request_async(async_http_client)
            .await
            .map_err(|error| OpenIdConnectError::RequestToken(error.to_string()))?;

        let id_token = token_response
            .id_token()
            .ok_or(OpenIdConnectError::NoIdTokenReturned)?;
        let claims = id_token.claims(&client.id_token_verifier(), &session.nonce)?;

        // the access token must belong to this id token
        if let Some(expected_access_token_hash) = claims.access_token_hash() {
            let actual_access_token_hash = AccessTokenHash::from_token(
                token_response.access_token(),
                &id_token.signing_alg()?,
            )?;
            if actual_access_token_hash != *expected_access_token_hash {
                return Err(OpenIdConnectError::InvalidAccessToken);
            }
        }

        let identity = AuthenticatedIdentity {
            subject: claims.subject().as_str().to_owned(),
            email: claims.email().map(|email| email.as_str().to_owned()),
            name: claims
                .name()
                .and_then(|name| name.get(None))
                .map(|name| name.as_str().to_owned())
                .or_else(|| {
                    claims
                        .preferred_username()
                        .map(|username| username.as_str().to_owned())
                }),
        };
        debug!(subject = %identity.subject, "authenticated");
        Ok(identity)
    }
}
