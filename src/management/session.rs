use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    error::AuthError,
    management::CredentialStore,
    spotify::auth::{FlowState, TokenBroker},
    types::CredentialRecord,
};

type Outcome = Result<String, AuthError>;
type InFlight = Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>;

enum Role {
    Leader(watch::Sender<Option<Outcome>>),
    Follower(watch::Receiver<Option<Outcome>>),
}

/// Removes the in-flight entry however the leading call ends, including
/// cancellation, so waiters can take over.
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    identity: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.identity);
    }
}

/// Hands out usable access tokens per identity.
///
/// Concurrent calls for one identity share a single broker run: the first
/// caller drives it, the others wait for its outcome.
pub struct SessionProvider {
    broker: Arc<TokenBroker>,
    in_flight: InFlight,
}

impl SessionProvider {
    pub fn new(broker: Arc<TokenBroker>) -> Self {
        Self {
            broker,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.broker.store()
    }

    /// Returns an access token that is not expired (within the refresh margin),
    /// refreshing or authorizing as needed.
    pub async fn get_valid_token(&self, identity: &str) -> Result<String, AuthError> {
        loop {
            match self.claim(identity) {
                Role::Leader(tx) => {
                    let _guard = InFlightGuard {
                        in_flight: &self.in_flight,
                        identity,
                    };
                    let outcome = self.drive(identity).await;
                    tx.send_replace(Some(outcome.clone()));
                    return outcome;
                }
                Role::Follower(mut rx) => {
                    debug!(identity, "waiting on in-flight token request");
                    let shared = match rx.wait_for(Option::is_some).await {
                        Ok(value) => value.clone(),
                        // Leader went away without an outcome; claim again.
                        Err(_) => None,
                    };
                    if let Some(outcome) = shared {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Cached state of `identity` without running any flow.
    pub async fn status(&self, identity: &str) -> (FlowState, Option<CredentialRecord>) {
        let record = self.store().load(identity).await;
        let state = self
            .broker
            .classify(record.as_ref(), Utc::now().timestamp());
        (state, record)
    }

    /// Forgets the cached record of `identity`.
    pub async fn logout(&self, identity: &str) -> Result<(), AuthError> {
        self.store().delete(identity).await
    }

    fn claim(&self, identity: &str) -> Role {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match in_flight.get(identity) {
            Some(rx) => Role::Follower(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                in_flight.insert(identity.to_string(), rx);
                Role::Leader(tx)
            }
        }
    }

    async fn drive(&self, identity: &str) -> Outcome {
        let cached = self.store().load(identity).await;
        let record = self.broker.ensure(identity, cached).await?;
        Ok(record.access_token)
    }
}
