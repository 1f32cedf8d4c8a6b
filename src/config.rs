//! Configuration management for spotmood.
//!
//! This module handles loading and accessing configuration values from environment
//! variables and `.env` files. It provides a centralized way to manage application
//! configuration including Spotify API credentials, the local redirect listener and
//! the token lifecycle tunables.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Command-line flags (client credentials only)
//! 2. Environment variables
//! 3. `.env` file in the local data directory
//! 4. Application defaults

use std::{collections::BTreeSet, env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::{error::AuthError, types::ClientCredentials, utils};

pub const APP_NAME: &str = "spotmood";

const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";
const DEFAULT_SCOPE: &str = "user-read-recently-played user-read-playback-state";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

/// Returns the application's directory inside the platform data directory.
///
/// - Linux: `~/.local/share/spotmood`
/// - macOS: `~/Library/Application Support/spotmood`
/// - Windows: `%LOCALAPPDATA%/spotmood`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_NAME);
    path
}

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the directory if it doesn't exist. A missing `.env` file is not an
/// error, since every setting has a default or can come from the process
/// environment. Variables already present in the environment are not overridden.
///
/// # Errors
///
/// This function will return an error if:
/// - The data directory cannot be created
/// - The `.env` file exists but cannot be read or parsed
///
/// # Example
///
/// ```
/// use spotmood::config;
///
/// #[tokio::main]
/// async fn main() {
///     if let Err(e) = config::load_env().await {
///         eprintln!("Configuration error: {}", e);
///     }
/// }
/// ```
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Returns the address the local redirect listener binds to.
///
/// Reads `SERVER_ADDRESS`, defaulting to `127.0.0.1:8888`. It must match the
/// host and port of the registered redirect URI.
pub fn server_addr() -> String {
    env_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS)
}

/// Returns the Spotify API client ID, if configured.
pub fn spotify_client_id() -> Option<String> {
    env_opt("SPOTIFY_API_AUTH_CLIENT_ID")
}

/// Returns the Spotify API client secret, if configured.
///
/// # Security Note
///
/// The client secret should be kept confidential and never exposed in logs
/// or version control.
pub fn spotify_client_secret() -> Option<String> {
    env_opt("SPOTIFY_API_AUTH_CLIENT_SECRET")
}

/// Returns the OAuth redirect URI registered with Spotify.
///
/// Reads `SPOTIFY_API_REDIRECT_URI`, defaulting to `http://localhost:8888/callback`.
pub fn spotify_redirect_uri() -> String {
    env_or("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI)
}

/// Returns the space separated scopes requested during authorization.
pub fn spotify_scope() -> String {
    env_or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE)
}

/// Returns the Spotify OAuth authorization URL.
pub fn spotify_apiauth_url() -> String {
    env_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL)
}

/// Returns the Spotify OAuth token exchange URL.
pub fn spotify_apitoken_url() -> String {
    env_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL)
}

/// Returns the Spotify Web API base URL.
pub fn spotify_apiurl() -> String {
    env_or("SPOTIFY_API_URL", DEFAULT_API_URL)
}

/// Everything the token broker needs to run the authorization-code flow.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    /// Client credentials for new authorizations. When `None`, the ones stored
    /// with a cached record are reused.
    pub client: Option<ClientCredentials>,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub bind_addr: SocketAddr,
    pub callback_path: String,
    pub auth_timeout: Duration,
    pub refresh_margin: Duration,
}

impl OAuthSettings {
    /// Settings with defaults for everything but the redirect URI.
    pub fn new(redirect_uri: &str) -> Result<Self, AuthError> {
        let bind_addr = parse_bind_addr(DEFAULT_SERVER_ADDRESS)?;
        Ok(Self {
            client: None,
            redirect_uri: redirect_uri.to_string(),
            scopes: parse_scopes(DEFAULT_SCOPE),
            authorize_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            bind_addr,
            callback_path: callback_path(redirect_uri)?,
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            refresh_margin: Duration::from_secs(DEFAULT_REFRESH_MARGIN_SECS),
        })
    }

    /// Assembles settings from the environment (see the module docs).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] when only one of client id and
    /// secret is set, when the redirect URI or bind address cannot be parsed, or
    /// when a duration is not a whole number of seconds.
    pub fn from_env() -> Result<Self, AuthError> {
        let client = match (spotify_client_id(), spotify_client_secret()) {
            (Some(id), Some(secret)) => Some(ClientCredentials::new(id, secret)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(AuthError::InvalidConfiguration(
                    "SPOTIFY_API_AUTH_CLIENT_SECRET must be set together with the client id".into(),
                ));
            }
            (None, Some(_)) => {
                return Err(AuthError::InvalidConfiguration(
                    "SPOTIFY_API_AUTH_CLIENT_ID must be set together with the client secret".into(),
                ));
            }
        };

        let redirect_uri = spotify_redirect_uri();
        Ok(Self {
            client,
            callback_path: callback_path(&redirect_uri)?,
            redirect_uri,
            scopes: parse_scopes(&spotify_scope()),
            authorize_url: spotify_apiauth_url(),
            token_url: spotify_apitoken_url(),
            bind_addr: parse_bind_addr(&server_addr())?,
            auth_timeout: env_secs("SPOTIFY_AUTH_TIMEOUT", DEFAULT_AUTH_TIMEOUT_SECS)?,
            refresh_margin: env_secs("SPOTIFY_TOKEN_REFRESH_MARGIN", DEFAULT_REFRESH_MARGIN_SECS)?,
        })
    }

    pub fn with_client(mut self, client: ClientCredentials) -> Self {
        self.client = Some(client);
        self
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_secs(key: &str, default: u64) -> Result<Duration, AuthError> {
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| AuthError::InvalidConfiguration(format!("{key}={raw}: {e}"))),
        None => Ok(Duration::from_secs(default)),
    }
}

fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, AuthError> {
    SocketAddr::from_str(raw)
        .map_err(|e| AuthError::InvalidConfiguration(format!("server address {raw}: {e}")))
}

/// Path component of the redirect URI; the listener serves exactly this path.
fn callback_path(redirect_uri: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirect_uri)
        .map_err(|e| AuthError::InvalidConfiguration(format!("redirect uri {redirect_uri}: {e}")))?;
    utils::check_callback_path(url.path())?;
    Ok(url.path().to_string())
}
