//! # Spotify Integration Module
//!
//! This module is the integration layer between spotmood and Spotify's services:
//! the accounts service (authorization and token endpoints) and the Web API
//! (listening history and audio features).
//!
//! ## Architecture
//!
//! ```text
//! CLI Layer (auth, mood, status)
//!          ↓
//! SessionProvider (management)
//!          ↓
//! TokenBroker ── RedirectListener (server)
//!     │
//!     ├── TokenEndpoint ──→ accounts.spotify.com/api/token
//!     └── CredentialStore (management)
//!
//! History client ──→ api.spotify.com/v1
//! ```
//!
//! ## Core Modules
//!
//! ### Authentication Module
//!
//! [`auth`] - OAuth 2.0 authorization-code grant with client secret:
//! - **State Machine**: [`auth::TokenBroker`] moves a credential through
//!   `NoCredential → AwaitingAuthorization → ExchangingCode → Authorized`, and
//!   through `Expired → Refreshing → Authorized` once the access token ages
//! - **Token Endpoint**: [`auth::SpotifyTokenEndpoint`] implements the
//!   [`auth::TokenEndpoint`] seam over `reqwest`; tests swap in a fake
//! - **Presentation**: [`auth::AuthorizationPrompt`] decides how the user gets to
//!   the authorize URL (browser, terminal)
//! - **Rotation**: a refresh token returned by a refresh replaces the stored one;
//!   otherwise the previous one is kept
//!
//! ### History Module
//!
//! [`history`] - Read-only Web API calls feeding the mood classification:
//! - `GET /me/player/recently-played`
//! - `GET /audio-features`
//!
//! ## Error Handling Philosophy
//!
//! ### Authentication Errors
//! - **Denied or abandoned authorization**: surfaced as
//!   `AuthorizationDenied` / `AuthorizationTimeout`, nothing persisted
//! - **Rejected refresh token**: `RefreshFailed(InvalidGrant)`; the refresh token
//!   is forgotten so the next request re-authorizes
//! - **Network trouble**: `RefreshFailed(Network)`, left to the caller to retry
//!
//! ### Rate Limiting
//! - **Retry-After**: 429 responses are retried after the advertised delay
//! - **Bad Gateway**: 502 responses are retried after a fixed delay

pub mod auth;
pub mod history;
