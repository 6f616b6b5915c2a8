use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{
    backend::{AuthError, Identity, IdentityProvider, SessionFeed},
    config::SessionConfig,
};

use super::events::SessionEvent;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The feed task has stopped.
    #[error("session feed task has stopped")]
    Closed,
}

/// Current authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Signed-in user, if any.
    pub identity: Option<Identity>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Handle to the session store.
///
/// `identity` is written only by the provider's session feed; `login` and
/// `logout` just ask the provider to change it.
pub struct SessionHandle<P: IdentityProvider> {
    provider: Arc<P>,
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SessionEvent>,
    state_rx: watch::Receiver<SessionState>,
}

impl<P: IdentityProvider> Clone for SessionHandle<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
            state_rx: self.state_rx.clone(),
        }
    }
}

enum Command {
    Shutdown { resp: oneshot::Sender<()> },
}

/// Subscribes to session changes and spawns the task that owns the state.
pub fn spawn_session_store<P: IdentityProvider>(provider: Arc<P>, config: &SessionConfig) -> SessionHandle<P> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(8);
    let (events_tx, _) = broadcast::channel::<SessionEvent>(config.events_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(SessionState::default());

    let feed = provider.subscribe_session();
    tokio::spawn(run_session_loop(feed, cmd_rx, state_tx, events_tx.clone()));

    SessionHandle {
        provider,
        cmd_tx,
        events_tx,
        state_rx,
    }
}

async fn run_session_loop(
    mut feed: SessionFeed,
    mut cmd_rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<SessionState>,
    events_tx: broadcast::Sender<SessionEvent>,
) {
    info!("session store started");
    let mut feed_open = true;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown { resp }) => {
                        let _ = resp.send(());
                        break;
                    }
                    None => break,
                }
            }
            identity = feed.recv(), if feed_open => {
                match identity {
                    Some(identity) => apply_identity(identity, &state_tx, &events_tx),
                    None => {
                        warn!("session feed closed by provider");
                        feed_open = false;
                    }
                }
            }
        }
    }

    drop(feed);
    info!("session store stopped");
}

fn apply_identity(
    identity: Option<Identity>,
    state_tx: &watch::Sender<SessionState>,
    events_tx: &broadcast::Sender<SessionEvent>,
) {
    let event = {
        let current = state_tx.borrow();
        match (&current.identity, &identity) {
            (None, None) => None,
            (Some(old), Some(new)) if old.uid == new.uid => None,
            (_, Some(new)) => Some(SessionEvent::SignedIn { uid: new.uid.clone() }),
            (Some(_), None) => Some(SessionEvent::SignedOut),
        }
    };

    state_tx.send_if_modified(|state| {
        if state.identity == identity {
            return false;
        }
        state.identity = identity;
        true
    });

    if let Some(event) = event {
        debug!(?event, "session changed");
        let _ = events_tx.send(event);
    }
}

impl<P: IdentityProvider> SessionHandle<P> {
    /// Signed-in user, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.state_rx.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_rx.borrow().is_authenticated()
    }

    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Waits until the session satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionState, SessionError>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(state.clone())
    }

    /// Asks the provider to sign in. The identity updates once the provider's
    /// feed reports the new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        debug!("login requested");
        self.provider.authenticate_with_password(email, password).await
    }

    /// Asks the provider to end the session.
    pub async fn logout(&self) -> Result<(), AuthError> {
        debug!("logout requested");
        self.provider.end_session().await
    }

    /// Stops the feed task and drops the subscription. Idempotent.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown { resp: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}
