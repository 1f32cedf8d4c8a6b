use std::{collections::BTreeSet, fmt, net::SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use tabled::Tabled;

use crate::error::EndpointError;

/// Serializes a secret by exposing it. Only used when writing credential files.
pub fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Client id and secret registered with the identity provider.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

/// Token record persisted per identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: SecretString,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl CredentialRecord {
    pub fn client(&self) -> ClientCredentials {
        ClientCredentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    /// True iff `expires_at` is present and strictly earlier than `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    /// True when the token is expired or expires within `margin_secs` of `now`.
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at.saturating_sub(margin_secs) <= now)
    }
}

impl PartialEq for CredentialRecord {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.client_secret.expose_secret() == other.client_secret.expose_secret()
            && self.access_token == other.access_token
            && self.refresh_token == other.refresh_token
            && self.expires_at == other.expires_at
    }
}

/// Parameters of one authorization-code flow. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub client: ClientCredentials,
    pub redirect_uri: String,
    pub requested_scopes: BTreeSet<String>,
}

impl AuthorizationRequest {
    pub fn scope(&self) -> String {
        self.requested_scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the redirect listener delivered for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCode {
    Code(String),
    Denied(String),
    TimedOut,
    ListenerClosed,
}

/// Handed to the prompt so the user can be sent to the provider.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub identity: String,
    pub authorize_url: String,
    pub callback_addr: SocketAddr,
    pub callback_path: String,
}

/// Body returned by the token endpoint for both grant types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry, preferring an explicit `expires_at`.
    ///
    /// An `expires_in` that does not fit a timestamp is rejected rather than
    /// wrapped into the past.
    pub fn expires_at_from(&self, now: i64) -> Result<Option<i64>, EndpointError> {
        match (self.expires_at, self.expires_in) {
            (Some(at), _) => Ok(Some(at)),
            (None, Some(secs)) => now.checked_add(secs).map(Some).ok_or_else(|| {
                EndpointError::Malformed(format!("expires_in out of range: {secs}"))
            }),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<SimpleArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    pub valence: f64,
    pub energy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    Happy,
    Calm,
    Angry,
    Sad,
    Neutral,
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Happy => "happy",
            Mood::Calm => "calm",
            Mood::Angry => "angry",
            Mood::Sad => "sad",
            Mood::Neutral => "neutral",
        };
        f.write_str(name)
    }
}

#[derive(Tabled)]
pub struct MoodTableRow {
    pub track: String,
    pub artists: String,
    pub valence: String,
    pub energy: String,
    pub mood: String,
}

#[derive(Tabled)]
pub struct StatusTableRow {
    pub identity: String,
    pub state: String,
    pub expires: String,
    pub refreshable: String,
}
