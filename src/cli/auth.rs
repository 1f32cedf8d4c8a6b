use std::sync::Arc;

use crate::{
    cli::session_provider,
    error, info,
    spotify::auth::AuthorizationPrompt,
    success,
    types::{ClientCredentials, PendingAuthorization},
    warning,
};

/// Sends the user to Spotify in the default browser, printing the URL when no
/// browser can be opened.
pub struct BrowserPrompt;

impl AuthorizationPrompt for BrowserPrompt {
    fn present(&self, pending: &PendingAuthorization) {
        info!(
            "Authorizing '{}'. Waiting for the redirect on http://{}{}",
            pending.identity, pending.callback_addr, pending.callback_path
        );

        if webbrowser::open(&pending.authorize_url).is_err() {
            warning!(
                "Failed to open browser. Please navigate to the following URL manually:\n{}",
                pending.authorize_url
            )
        }
    }
}

/// Makes sure `identity` holds a usable token, authorizing in the browser when
/// there is no cached credential or it can no longer be refreshed.
pub async fn auth(identity: String, client: Option<ClientCredentials>) {
    let session = match session_provider(client, Arc::new(BrowserPrompt)) {
        Ok(session) => session,
        Err(e) => error!("Cannot set up authorization. Err: {}", e),
    };

    match session.get_valid_token(&identity).await {
        Ok(_) => success!("Authentication successful for '{}'!", identity),
        Err(e) if e.is_transient() => error!(
            "Authentication for '{}' failed on a network error, please retry. Err: {}",
            identity, e
        ),
        Err(e) => error!("Authentication for '{}' failed. Err: {}", identity, e),
    }
}

/// Forgets the cached credential of `identity`.
pub async fn logout(identity: String) {
    let session = match session_provider(None, Arc::new(BrowserPrompt)) {
        Ok(session) => session,
        Err(e) => error!("Cannot load configuration. Err: {}", e),
    };

    match session.logout(&identity).await {
        Ok(()) => success!("Removed cached credential for '{}'.", identity),
        Err(e) => error!("Failed to remove credential for '{}'. Err: {}", identity, e),
    }
}
