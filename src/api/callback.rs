use std::sync::Arc;

use axum::{Extension, extract::RawQuery, http::StatusCode, response::Html};
use tracing::debug;

use crate::{server::CallbackMailbox, types::PendingCode, utils};

/// Receives the provider's redirect and resolves the flow's mailbox.
///
/// Only the first request decides the outcome. Browser retries or reloads of the
/// callback page get `410 Gone` and leave the resolved value alone.
pub async fn callback(
    RawQuery(query): RawQuery,
    Extension(mailbox): Extension<Arc<CallbackMailbox>>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = utils::parse_callback_query(query.as_deref());
    let granted = matches!(outcome, PendingCode::Code(_));

    if !mailbox.resolve(outcome) {
        debug!("callback hit after the flow was already resolved");
        return (
            StatusCode::GONE,
            Html("<h4>This authorization request was already handled.</h4><p>Close browser window.</p>"),
        );
    }

    if granted {
        (
            StatusCode::OK,
            Html("<h2>Authorization successful.</h2><p>Close browser window.</p>"),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Html("<h4>Invalid request. No authorization code found.</h4>"),
        )
    }
}
