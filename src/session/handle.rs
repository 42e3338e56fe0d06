use crate::models::Session;
use tokio::sync::watch;

/// Read-only view of the session store
///
/// Consumers pull the latest snapshot instead of registering callbacks.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    rx: watch::Receiver<Session>,
}

impl SessionHandle {
    pub(crate) fn new(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }

    /// Copy of the current session
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Wait for the next replacement of the session record
    ///
    /// Returns `false` once the store has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the auth check has resolved and return that session
    ///
    /// Returns the last known session if the store goes away first.
    pub async fn resolved(&mut self) -> Session {
        let resolved = self
            .rx
            .wait_for(|session| !session.is_checking())
            .await
            .map(|session| Session::clone(&session));
        resolved.unwrap_or_else(|_| self.snapshot())
    }
}
