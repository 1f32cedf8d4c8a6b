//! # API Module
//!
//! HTTP endpoints served by the short-lived redirect listener while an
//! authorization-code flow is waiting for the browser.
//!
//! ## Endpoints
//!
//! - [`callback`] - Receives the redirect from Spotify's authorization server,
//!   extracts the `code` (or `error`) query parameter and resolves the mailbox of
//!   the flow that started the listener. Answers `200` for a code, `400` when the
//!   code is missing and `410` for any later request.
//! - [`health`] - Returns application status and version, handy to check that
//!   the listener is up while debugging a redirect URI.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use spotmood::api::{callback, health};
//!
//! let app = Router::new()
//!     .route("/callback", get(callback))
//!     .route("/health", get(health));
//! ```
//!
//! The router itself is assembled in [`crate::server::RedirectListener::start`],
//! which layers the per-flow [`crate::server::CallbackMailbox`] onto the callback
//! route.

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
