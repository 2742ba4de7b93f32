//! OAuth 2.0 authorization with PKCE, and token refresh.
//!
//! Authorization runs once per installation, started from the property
//! inspector:
//!
//! 1. A code verifier, its challenge and an anti-CSRF state are generated
//! 2. A listener is bound on the loopback redirect port
//! 3. The authorization page is opened in the system browser
//! 4. The redirect delivers an authorization code to the listener
//! 5. The code is exchanged for an access and refresh token
//! 6. The tokens are persisted in the global settings of the host
//!
//! The whole flow is bounded by [`Config::auth_timeout`]. Afterwards,
//! [`Authenticator::access_token`] transparently refreshes the access token
//! when it is within five minutes of expiring. Failed refreshes are not
//! retried: the next user action tries again.

pub mod callback;
pub mod pkce;

use std::{io, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    host::Host,
    http::Client as HttpClient,
    protocol::{
        self,
        auth::{ErrorResponse, TokenResponse},
    },
    tokens::{TokenSet, TokenStore},
};

use callback::Listener;
use pkce::Pkce;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("authorization timed out")]
    Timeout,
    #[error("authorization state mismatch")]
    StateMismatch,
    #[error("authorization denied: {0}")]
    AccessDenied(String),
    #[error("token exchange failed: {status}")]
    TokenExchangeFailed { status: StatusCode },
    #[error("token refresh failed: {status}")]
    RefreshFailed { status: StatusCode },
}

/// Source of bearer tokens for the Web API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid access token, refreshing it if needed.
    async fn access_token(&self, client_id: &str) -> Result<String>;

    /// Re-reads persisted tokens and reports whether any are present.
    async fn is_authenticated(&self) -> Result<bool>;

    /// Runs the interactive authorization flow.
    async fn authorize(&self, client_id: &str) -> Result<()>;
}

/// Opens the authorization page for the user.
pub type Launcher = Box<dyn Fn(&str) -> io::Result<()> + Send + Sync>;

pub struct Authenticator {
    http: Arc<HttpClient>,
    config: Config,
    store: Arc<TokenStore>,
    host: Arc<dyn Host>,
    launcher: Launcher,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        http: Arc<HttpClient>,
        config: Config,
        store: Arc<TokenStore>,
        host: Arc<dyn Host>,
    ) -> Self {
        Self {
            http,
            config,
            store,
            host,
            launcher: Box::new(|url: &str| open::that(url)),
        }
    }

    /// Replaces the system browser, for example to drive the flow headless.
    #[must_use]
    pub fn with_launcher<F>(mut self, launcher: F) -> Self
    where
        F: Fn(&str) -> io::Result<()> + Send + Sync + 'static,
    {
        self.launcher = Box::new(launcher);
        self
    }

    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// * `AuthError::NotAuthenticated` if no tokens are stored
    /// * `AuthError::RefreshFailed` if the accounts service rejects the
    ///   refresh
    pub async fn refresh(&self, client_id: &str) -> Result<TokenSet> {
        let current = self
            .store
            .load(self.host.as_ref())
            .await?
            .ok_or_else(|| Error::unauthenticated(AuthError::NotAuthenticated))?;

        debug!("refreshing access token");
        let tokens = self
            .request_tokens(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", current.refresh_token.as_str()),
                    ("client_id", client_id),
                ],
                |status| AuthError::RefreshFailed { status },
                Some(current.refresh_token.clone()),
            )
            .await?;

        self.store.replace(Some(tokens.clone()));
        self.persist(client_id, &tokens).await?;
        debug!(
            "access token refreshed, valid for {}s",
            tokens.time_to_live().as_secs()
        );

        Ok(tokens)
    }

    /// The authorization page URL for one attempt.
    pub fn authorize_url(&self, client_id: &str, pkce: &Pkce, redirect_uri: &str) -> Result<Url> {
        let mut url = self.config.accounts_url.join("authorize")?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &Config::scope())
            .append_pair("state", &pkce.state)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &pkce.challenge);
        Ok(url)
    }

    async fn run_authorization(&self, client_id: &str, listener: &Listener) -> Result<TokenSet> {
        let pkce = Pkce::generate();
        let redirect_uri = self.config.redirect_uri(listener.port()?);
        let url = self.authorize_url(client_id, &pkce, &redirect_uri)?;

        info!("opening authorization page");
        if let Err(e) = (self.launcher)(url.as_str()) {
            warn!("could not open browser ({e}); visit {url} to authorize");
        }

        let callback = listener.accept(&pkce.state).await?;
        debug!("received authorization code");

        let exchange = self
            .request_tokens(
                &[
                    ("grant_type", "authorization_code"),
                    ("code", callback.code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("client_id", client_id),
                    ("code_verifier", pkce.verifier.as_str()),
                ],
                |status| AuthError::TokenExchangeFailed { status },
                None,
            )
            .await;

        match exchange {
            Ok(tokens) => {
                callback.succeed().await;
                Ok(tokens)
            }
            Err(e) => {
                callback.fail().await;
                Err(e)
            }
        }
    }

    /// Posts a token request and builds the resulting token set.
    async fn request_tokens(
        &self,
        form: &[(&str, &str)],
        failure: fn(StatusCode) -> AuthError,
        previous_refresh: Option<String>,
    ) -> Result<TokenSet> {
        let url = self.config.accounts_url.join("api/token")?;
        let request = self.http.post(url).form(form);
        let response = self.http.execute(request).await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(reason) => warn!(
                    "token endpoint returned {status}: {} {}",
                    reason.error,
                    reason.error_description.unwrap_or_default()
                ),
                Err(_) => warn!("token endpoint returned {status}"),
            }
            return Err(Error::new(ErrorKind::from_status(status), failure(status)));
        }

        let response: TokenResponse = protocol::json(&body, "token")?;
        response
            .into_token_set(previous_refresh, SystemTime::now())
            .ok_or_else(|| Error::data_loss(failure(status)))
    }

    /// Writes the client id and tokens to the global settings, keeping
    /// whatever else is stored there.
    async fn persist(&self, client_id: &str, tokens: &TokenSet) -> Result<()> {
        let mut settings = self.host.global_settings().await?;
        settings.client_id = Some(client_id.to_owned());
        settings.tokens = Some(tokens.clone());
        self.host.set_global_settings(&settings).await
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn access_token(&self, client_id: &str) -> Result<String> {
        let tokens = self
            .store
            .load(self.host.as_ref())
            .await?
            .ok_or_else(|| Error::unauthenticated(AuthError::NotAuthenticated))?;

        if tokens.needs_refresh() {
            return Ok(self.refresh(client_id).await?.access_token);
        }

        Ok(tokens.access_token)
    }

    async fn is_authenticated(&self) -> Result<bool> {
        self.store.reload(self.host.as_ref()).await?;
        Ok(self.store.is_authenticated())
    }

    /// # Errors
    ///
    /// * `AuthError::Timeout` if no redirect arrived in time
    /// * `AuthError::StateMismatch` if the redirect carried a foreign state
    /// * `AuthError::AccessDenied` if the user declined
    /// * `AuthError::TokenExchangeFailed` if the code was rejected
    async fn authorize(&self, client_id: &str) -> Result<()> {
        let listener = Listener::bind(self.config.redirect_port).await?;

        let tokens = tokio::time::timeout(
            self.config.auth_timeout,
            self.run_authorization(client_id, &listener),
        )
        .await
        .map_err(|_| Error::deadline_exceeded(AuthError::Timeout))??;
        drop(listener);

        self.store.replace(Some(tokens.clone()));
        self.persist(client_id, &tokens).await?;
        info!("authorized");

        Ok(())
    }
}
