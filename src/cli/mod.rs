//! # CLI Module
//!
//! The command-line layer of spotmood. Each command wires the authorization
//! core together, talks to the user and turns failures into readable messages.
//!
//! ## Commands
//!
//! ### Authentication
//!
//! - [`auth`] - Ensures an identity holds a usable token. Reuses the cached
//!   credential, refreshes it when it is about to expire, and only opens the
//!   browser for a full authorization when nothing else works
//! - [`logout`] - Forgets the cached credential of an identity
//! - [`status`] - Shows the cached state of one or more identities offline
//!
//! ### Listening Mood
//!
//! - [`mood`] - Fetches recently played tracks, classifies each by valence and
//!   energy and prints the overall mood
//!
//! ## Architecture Design
//!
//! ```text
//! CLI Layer (User Interface)
//!     ↓
//! SessionProvider (coalesces token requests per identity)
//!     ↓
//! TokenBroker (authorization / refresh state machine)
//!     ↓
//! RedirectListener + TokenEndpoint + CredentialStore
//! ```
//!
//! ## Error Handling Philosophy
//!
//! Library code returns typed [`crate::error::AuthError`] values. Only this
//! layer turns them into the `error!` macro, which prints and exits with status 1.
//!
//! ## Usage Patterns
//!
//! ```bash
//! spotmood auth --user alice --client-id ... --client-secret ...
//! spotmood mood --user alice --limit 20
//! spotmood status --user alice --user bob
//! spotmood logout --user alice
//! ```

mod auth;
mod mood;
mod status;

use std::sync::Arc;

pub use auth::BrowserPrompt;
pub use auth::auth;
pub use auth::logout;
pub use mood::mood;
pub use status::status;

use crate::{
    config::OAuthSettings,
    error::AuthError,
    management::{CredentialStore, SessionProvider},
    spotify::auth::{AuthorizationPrompt, SpotifyTokenEndpoint, TokenBroker},
    types::ClientCredentials,
};

/// Wires a [`SessionProvider`] from the environment.
///
/// `client` overrides the client credentials from the environment.
pub fn session_provider(
    client: Option<ClientCredentials>,
    prompt: Arc<dyn AuthorizationPrompt>,
) -> Result<SessionProvider, AuthError> {
    let mut settings = OAuthSettings::from_env()?;
    if let Some(client) = client {
        settings = settings.with_client(client);
    }

    let endpoint = Arc::new(SpotifyTokenEndpoint::new(settings.token_url.clone()));
    let store = Arc::new(CredentialStore::new());
    let broker = TokenBroker::new(settings, endpoint, prompt, store);
    Ok(SessionProvider::new(Arc::new(broker)))
}
