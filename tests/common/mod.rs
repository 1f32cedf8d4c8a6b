#![allow(dead_code)]

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use spotmood::{
    config::OAuthSettings,
    error::EndpointError,
    management::{CredentialStore, SessionProvider},
    spotify::auth::{AuthorizationPrompt, TokenBroker, TokenEndpoint},
    types::{AuthorizationRequest, ClientCredentials, CredentialRecord, PendingAuthorization, TokenResponse},
};
use tempfile::TempDir;

pub fn token(access: &str, refresh: Option<&str>, expires_in: Option<i64>) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_in,
        expires_at: None,
        scope: Some("user-read-recently-played".to_string()),
        token_type: Some("Bearer".to_string()),
    }
}

pub fn record(access: &str, refresh: Option<&str>, expires_at: Option<i64>) -> CredentialRecord {
    let client = ClientCredentials::new("client-id", "client-secret");
    CredentialRecord {
        client_id: client.client_id,
        client_secret: client.client_secret,
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at,
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Token endpoint answering from scripted queues.
#[derive(Default)]
pub struct FakeEndpoint {
    exchange_responses: Mutex<VecDeque<Result<TokenResponse, EndpointError>>>,
    refresh_responses: Mutex<VecDeque<Result<TokenResponse, EndpointError>>>,
    pub exchanged_codes: Mutex<Vec<String>>,
    pub refreshed_with: Mutex<Vec<String>>,
    pub delay: Duration,
}

impl FakeEndpoint {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn on_exchange(&self, response: Result<TokenResponse, EndpointError>) {
        self.exchange_responses.lock().unwrap().push_back(response);
    }

    pub fn on_refresh(&self, response: Result<TokenResponse, EndpointError>) {
        self.refresh_responses.lock().unwrap().push_back(response);
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanged_codes.lock().unwrap().len()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshed_with.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenEndpoint for FakeEndpoint {
    async fn exchange_code(
        &self,
        _request: &AuthorizationRequest,
        code: &str,
    ) -> Result<TokenResponse, EndpointError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        tokio::time::sleep(self.delay).await;
        self.exchange_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EndpointError::Network("no scripted exchange".into())))
    }

    async fn refresh(
        &self,
        _client: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenResponse, EndpointError> {
        self.refreshed_with.lock().unwrap().push(refresh_token.to_string());
        tokio::time::sleep(self.delay).await;
        self.refresh_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EndpointError::Network("no scripted refresh".into())))
    }
}

/// Plays the user's browser: follows the redirect with a fixed query string,
/// or never shows up when `query` is `None`.
pub struct FakeBrowser {
    query: Option<String>,
    presented: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
}

impl FakeBrowser {
    pub fn redirecting_with(query: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            presented: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn absent() -> Self {
        Self {
            query: None,
            presented: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }
}

impl AuthorizationPrompt for FakeBrowser {
    fn present(&self, pending: &PendingAuthorization) {
        self.presented.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(pending.authorize_url.clone());

        if let Some(query) = &self.query {
            let url = callback_url(pending.callback_addr, &pending.callback_path, query);
            tokio::spawn(async move {
                let _ = http_client().get(url).send().await;
            });
        }
    }
}

pub fn callback_url(addr: SocketAddr, path: &str, query: &str) -> String {
    format!("http://{addr}{path}?{query}")
}

/// Client without pooled keep-alive connections, so listeners shut down fast.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

pub fn test_settings(with_client: bool) -> OAuthSettings {
    let mut settings = OAuthSettings::new("http://127.0.0.1:8888/callback").unwrap();
    settings.bind_addr = "127.0.0.1:0".parse().unwrap();
    settings.auth_timeout = Duration::from_secs(5);
    if with_client {
        settings = settings.with_client(ClientCredentials::new("client-id", "client-secret"));
    }
    settings
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<CredentialStore>,
    pub endpoint: Arc<FakeEndpoint>,
    pub browser: Arc<FakeBrowser>,
    pub session: SessionProvider,
}

impl Harness {
    pub fn new(settings: OAuthSettings, endpoint: FakeEndpoint, browser: FakeBrowser) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CredentialStore::with_dir(dir.path().join("credentials")));
        let endpoint = Arc::new(endpoint);
        let browser = Arc::new(browser);
        let broker = TokenBroker::new(
            settings,
            endpoint.clone(),
            browser.clone(),
            store.clone(),
        );
        Self {
            dir,
            store,
            endpoint,
            browser,
            session: SessionProvider::new(Arc::new(broker)),
        }
    }
}
