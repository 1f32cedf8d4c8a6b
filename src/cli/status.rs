use std::sync::Arc;

use tabled::Table;

use crate::{
    cli::{BrowserPrompt, session_provider},
    error, info,
    types::StatusTableRow,
    utils,
};

/// Prints the cached credential state of each identity without touching the
/// network.
pub async fn status(identities: Vec<String>) {
    let session = match session_provider(None, Arc::new(BrowserPrompt)) {
        Ok(session) => session,
        Err(e) => error!("Cannot load configuration. Err: {}", e),
    };

    let mut rows = Vec::with_capacity(identities.len());
    for identity in identities {
        let (state, record) = session.status(&identity).await;
        rows.push(StatusTableRow {
            identity,
            state: state.to_string(),
            expires: utils::format_timestamp(record.as_ref().and_then(|r| r.expires_at)),
            refreshable: match record.as_ref().map(|r| r.refresh_token.is_some()) {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => "-".to_string(),
            },
        });
    }

    println!("{}", Table::new(rows));
    info!("Credentials are stored in {}", session.store().dir().display());
}
