use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use axum::{Extension, Router, routing::get};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

use crate::{api, error::AuthError, types::PendingCode, utils};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// One-shot slot shared between a single flow and its listener.
///
/// Created per flow and passed to the handler, so two flows never share a
/// mailbox.
pub struct CallbackMailbox {
    sender: Mutex<Option<oneshot::Sender<PendingCode>>>,
}

impl CallbackMailbox {
    fn new(sender: oneshot::Sender<PendingCode>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Delivers `outcome` if nothing was delivered yet. Returns whether this
    /// call resolved the mailbox.
    pub fn resolve(&self, outcome: PendingCode) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            // A closed receiver still counts: the flow already gave up.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Short-lived local HTTP server capturing the authorization redirect.
pub struct RedirectListener;

impl RedirectListener {
    /// Binds `bind_addr` and serves `path` in the background.
    ///
    /// Returns as soon as the socket is bound, so the caller can send the user to
    /// the provider while the listener waits.
    pub async fn start(bind_addr: SocketAddr, path: &str) -> Result<ListenerHandle, AuthError> {
        utils::check_callback_path(path)?;

        let (result_tx, result_rx) = oneshot::channel();
        let mailbox = Arc::new(CallbackMailbox::new(result_tx));

        let app = Router::new()
            .route("/health", get(api::health))
            .route(path, get(api::callback).layer(Extension(mailbox)));

        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| AuthError::ListenerUnavailable(format!("{bind_addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::ListenerUnavailable(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "redirect listener stopped with an error");
            }
        });

        debug!(%local_addr, path, "redirect listener started");
        Ok(ListenerHandle {
            local_addr,
            path: path.to_string(),
            result: Some(result_rx),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Owns a running listener. Stopped on [`ListenerHandle::stop`] or on drop.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    path: String,
    result: Option<oneshot::Receiver<PendingCode>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Suspends until the callback resolves the mailbox or `timeout` elapses.
    ///
    /// The mailbox is read once; later calls report [`PendingCode::ListenerClosed`].
    pub async fn await_result(&mut self, timeout: Duration) -> PendingCode {
        let Some(rx) = self.result.take() else {
            return PendingCode::ListenerClosed;
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => PendingCode::ListenerClosed,
            Err(_) => PendingCode::TimedOut,
        }
    }

    /// Releases the socket. Safe to call more than once.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                // Lingering keep-alive connections; drop them with the task.
                task.abort();
                let _ = task.await;
            }
            debug!(local_addr = %self.local_addr, "redirect listener stopped");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
