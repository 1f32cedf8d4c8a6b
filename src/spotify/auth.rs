use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    config::OAuthSettings,
    error::{AuthError, EndpointError},
    management::CredentialStore,
    server::RedirectListener,
    types::{
        AuthorizationRequest, ClientCredentials, CredentialRecord, PendingAuthorization,
        PendingCode, TokenResponse,
    },
    utils,
};

/// Transport to the identity provider's token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges an authorization code (`grant_type=authorization_code`).
    async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenResponse, EndpointError>;

    /// Obtains a new access token (`grant_type=refresh_token`).
    async fn refresh(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenResponse, EndpointError>;
}

/// Shows the authorize URL to the user. How (browser, terminal) is up to the
/// implementation; the broker only requires that it does not block.
pub trait AuthorizationPrompt: Send + Sync {
    fn present(&self, pending: &PendingAuthorization);
}

/// Spotify's `POST /api/token`, authenticated with HTTP Basic client credentials.
pub struct SpotifyTokenEndpoint {
    client: Client,
    token_url: String,
}

impl SpotifyTokenEndpoint {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token_url: token_url.into(),
        }
    }

    async fn request_token(
        &self,
        client: &ClientCredentials,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, EndpointError> {
        let res = self
            .client
            .post(&self.token_url)
            .basic_auth(&client.client_id, Some(client.client_secret.expose_secret()))
            .form(form)
            .send()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error_response(status.as_u16(), &body));
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| EndpointError::Malformed(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(EndpointError::Malformed("empty access_token".into()));
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyTokenEndpoint {
    async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenResponse, EndpointError> {
        self.request_token(
            &request.client,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &request.redirect_uri),
            ],
        )
        .await
    }

    async fn refresh(
        &self,
        client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenResponse, EndpointError> {
        self.request_token(
            client,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Maps a non-success token endpoint response onto [`EndpointError`].
pub fn classify_error_response(status: u16, body: &str) -> EndpointError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if err.error == "invalid_grant" => {
            EndpointError::InvalidGrant(err.error_description.unwrap_or(err.error))
        }
        Ok(err) => EndpointError::Provider {
            status,
            message: err.error_description.unwrap_or(err.error),
        },
        Err(_) => EndpointError::Provider {
            status,
            message: body.trim().to_string(),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    NoCredential,
    AwaitingAuthorization,
    ExchangingCode,
    Authorized,
    Expired,
    Refreshing,
    Failed,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::NoCredential => "no credential",
            FlowState::AwaitingAuthorization => "awaiting authorization",
            FlowState::ExchangingCode => "exchanging code",
            FlowState::Authorized => "authorized",
            FlowState::Expired => "expired",
            FlowState::Refreshing => "refreshing",
            FlowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where a flow invocation starts from.
enum Step {
    NoCredential(Option<ClientCredentials>),
    Authorized(CredentialRecord),
    Expired(CredentialRecord),
}

/// Drives the authorization-code and refresh flows for one identity at a time.
///
/// The broker never touches the stored record in place: it receives a copy,
/// builds the next version and hands it to the [`CredentialStore`].
pub struct TokenBroker {
    settings: OAuthSettings,
    endpoint: Arc<dyn TokenEndpoint>,
    prompt: Arc<dyn AuthorizationPrompt>,
    store: Arc<CredentialStore>,
    // The callback port is exclusive; authorization flows queue here.
    listener_slot: tokio::sync::Mutex<()>,
}

impl TokenBroker {
    pub fn new(
        settings: OAuthSettings,
        endpoint: Arc<dyn TokenEndpoint>,
        prompt: Arc<dyn AuthorizationPrompt>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            settings,
            endpoint,
            prompt,
            store,
            listener_slot: tokio::sync::Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    fn margin_secs(&self) -> i64 {
        i64::try_from(self.settings.refresh_margin.as_secs()).unwrap_or(i64::MAX)
    }

    /// State a cached record is in, before any transition is attempted.
    pub fn classify(&self, record: Option<&CredentialRecord>, now: i64) -> FlowState {
        match record {
            None => FlowState::NoCredential,
            Some(r) if r.expires_within(now, self.margin_secs()) => FlowState::Expired,
            Some(_) => FlowState::Authorized,
        }
    }

    /// Runs whatever transitions `cached` needs to end in `Authorized`.
    pub async fn ensure(
        &self,
        identity: &str,
        cached: Option<CredentialRecord>,
    ) -> Result<CredentialRecord, AuthError> {
        let mut step = match cached {
            Some(record) => Step::Authorized(record),
            None => Step::NoCredential(None),
        };

        loop {
            step = match step {
                Step::Authorized(record) => {
                    if !record.expires_within(Utc::now().timestamp(), self.margin_secs()) {
                        return Ok(record);
                    }
                    transition(identity, FlowState::Authorized, FlowState::Expired);
                    Step::Expired(record)
                }
                Step::Expired(record) => {
                    if record.refresh_token.is_some() {
                        return self.refresh(identity, record).await;
                    }
                    transition(identity, FlowState::Expired, FlowState::NoCredential);
                    Step::NoCredential(Some(record.client()))
                }
                Step::NoCredential(known_client) => {
                    return self.authorize(identity, known_client).await;
                }
            };
        }
    }

    /// Builds the authorization request for a new flow. Configured client
    /// credentials win over `known_client` (taken from a stale record).
    pub fn authorization_request(
        &self,
        known_client: Option<ClientCredentials>,
    ) -> Result<AuthorizationRequest, AuthError> {
        let client = self.settings.client.clone().or(known_client).ok_or_else(|| {
            AuthError::InvalidConfiguration(
                "client id and client secret are required to authorize".into(),
            )
        })?;
        if client.client_id.trim().is_empty() || client.client_secret.expose_secret().trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "client id and client secret must not be empty".into(),
            ));
        }

        Ok(AuthorizationRequest {
            client,
            redirect_uri: self.settings.redirect_uri.clone(),
            requested_scopes: self.settings.scopes.clone(),
        })
    }

    /// Full authorization-code flow: listener, prompt, code, exchange, persist.
    pub async fn authorize(
        &self,
        identity: &str,
        known_client: Option<ClientCredentials>,
    ) -> Result<CredentialRecord, AuthError> {
        let request = self
            .authorization_request(known_client)
            .map_err(|e| fail(identity, FlowState::NoCredential, e))?;
        let authorize_url = utils::authorize_url(&self.settings.authorize_url, &request)
            .map_err(|e| {
                fail(
                    identity,
                    FlowState::NoCredential,
                    AuthError::InvalidConfiguration(format!("authorize url: {e}")),
                )
            })?;

        let code = {
            let _slot = self.listener_slot.lock().await;
            let mut listener =
                RedirectListener::start(self.settings.bind_addr, &self.settings.callback_path)
                    .await
                    .map_err(|e| fail(identity, FlowState::NoCredential, e))?;
            transition(identity, FlowState::NoCredential, FlowState::AwaitingAuthorization);

            self.prompt.present(&PendingAuthorization {
                identity: identity.to_string(),
                authorize_url,
                callback_addr: listener.local_addr(),
                callback_path: listener.path().to_string(),
            });

            let outcome = listener.await_result(self.settings.auth_timeout).await;
            listener.stop().await;

            match outcome {
                PendingCode::Code(code) => code,
                PendingCode::Denied(reason) => {
                    return Err(fail(
                        identity,
                        FlowState::AwaitingAuthorization,
                        AuthError::AuthorizationDenied(reason),
                    ));
                }
                PendingCode::TimedOut => {
                    return Err(fail(
                        identity,
                        FlowState::AwaitingAuthorization,
                        AuthError::AuthorizationTimeout(self.settings.auth_timeout),
                    ));
                }
                PendingCode::ListenerClosed => {
                    return Err(fail(
                        identity,
                        FlowState::AwaitingAuthorization,
                        AuthError::ListenerUnavailable(
                            "listener closed before a callback arrived".into(),
                        ),
                    ));
                }
            }
        };

        transition(identity, FlowState::AwaitingAuthorization, FlowState::ExchangingCode);
        let token = self
            .endpoint
            .exchange_code(&request, &code)
            .await
            .map_err(|e| fail(identity, FlowState::ExchangingCode, AuthError::CodeExchangeFailed(e)))?;

        let expires_at = token
            .expires_at_from(Utc::now().timestamp())
            .map_err(|e| fail(identity, FlowState::ExchangingCode, AuthError::CodeExchangeFailed(e)))?;
        let record = CredentialRecord {
            client_id: request.client.client_id.clone(),
            client_secret: request.client.client_secret.clone(),
            expires_at,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        };
        self.store
            .save(identity, &record)
            .await
            .map_err(|e| fail(identity, FlowState::ExchangingCode, e))?;

        transition(identity, FlowState::ExchangingCode, FlowState::Authorized);
        Ok(record)
    }

    /// Refresh flow. Never involves the redirect listener.
    ///
    /// A rotated refresh token replaces the stored one. When the provider rejects
    /// the grant, the refresh token is dropped from the stored record so the next
    /// attempt goes straight to a full authorization. If that write fails the
    /// storage error is returned instead of the rejection.
    pub async fn refresh(
        &self,
        identity: &str,
        record: CredentialRecord,
    ) -> Result<CredentialRecord, AuthError> {
        transition(identity, FlowState::Expired, FlowState::Refreshing);

        let Some(refresh_token) = record.refresh_token.clone() else {
            return Err(fail(
                identity,
                FlowState::Refreshing,
                AuthError::RefreshFailed(EndpointError::InvalidGrant("no refresh token stored".into())),
            ));
        };

        match self.endpoint.refresh(&record.client(), &refresh_token).await {
            Ok(token) => {
                let expires_at = token
                    .expires_at_from(Utc::now().timestamp())
                    .map_err(|e| fail(identity, FlowState::Refreshing, AuthError::RefreshFailed(e)))?;
                let mut updated = record;
                updated.expires_at = expires_at;
                updated.access_token = token.access_token;
                if let Some(rotated) = token.refresh_token {
                    updated.refresh_token = Some(rotated);
                }

                self.store
                    .save(identity, &updated)
                    .await
                    .map_err(|e| fail(identity, FlowState::Refreshing, e))?;
                transition(identity, FlowState::Refreshing, FlowState::Authorized);
                Ok(updated)
            }
            Err(EndpointError::InvalidGrant(reason)) => {
                let mut revoked = record;
                revoked.refresh_token = None;
                // The rejected token stays on disk if this fails, so report it.
                self.store.save(identity, &revoked).await.map_err(|e| {
                    warn!(identity, reason = %reason, "provider rejected the refresh token");
                    fail(identity, FlowState::Refreshing, e)
                })?;
                Err(fail(
                    identity,
                    FlowState::Refreshing,
                    AuthError::RefreshFailed(EndpointError::InvalidGrant(reason)),
                ))
            }
            Err(e) => Err(fail(identity, FlowState::Refreshing, AuthError::RefreshFailed(e))),
        }
    }
}

fn transition(identity: &str, from: FlowState, to: FlowState) {
    debug!(identity, %from, %to, "token flow transition");
}

fn fail(identity: &str, from: FlowState, err: AuthError) -> AuthError {
    debug!(identity, %from, to = %FlowState::Failed, error = %err, "token flow transition");
    err
}
