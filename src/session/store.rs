//! Process-wide session store
//!
//! The store subscribes to the identity provider and keeps one [`Session`]
//! record in a `tokio::sync::watch` cell. All enrichment runs on the listener
//! task, one backend fetch per identity event or explicit refresh request;
//! [`SessionStore::sign_out`] and [`SessionStore::stop`] are the only other
//! writers. Every write replaces the whole record, and a write is only applied
//! if no newer write has started since: a slow backend answer for an identity
//! that has since signed out is dropped.

use super::SessionHandle;
use crate::backend::Backend;
use crate::credentials::CredentialStore;
use crate::identity::IdentityProvider;
use crate::models::auth::{AuthenticationError, Notice, PasswordCredentials};
use crate::models::{Identity, Session};
use crate::utils::logging::LoggingHelper;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Result of a sign-in or registration
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    /// Session after the awaited refresh
    pub session: Session,
    /// Confirmations and non-fatal warnings to show the user
    pub notices: Vec<Notice>,
}

/// Requests served by the listener between identity events
enum Command {
    /// Answer once every identity event seen so far has been applied
    Settle(oneshot::Sender<Session>),
    /// Re-enrich the current identity, then answer
    Refresh(oneshot::Sender<Session>),
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    backend: Arc<dyn Backend>,
    credentials: CredentialStore,
    state: watch::Sender<Session>,
    generation: AtomicU64,
    commands: mpsc::UnboundedSender<Command>,
}

/// Aborts the identity listener once the last store clone is gone
struct ListenerGuard {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ListenerGuard {
    fn abort(&self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Shared session store; clones refer to the same record
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
    listener: Arc<ListenerGuard>,
}

impl SessionStore {
    /// Create the store and start listening to identity events
    ///
    /// Must be called from within a tokio runtime. The session starts in the
    /// checking state; the provider's current snapshot is processed at once.
    #[must_use]
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn Backend>,
        credentials: CredentialStore,
    ) -> Self {
        let (state, _) = watch::channel(Session::checking());
        let (commands, requests) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            provider,
            backend,
            credentials,
            state,
            generation: AtomicU64::new(0),
            commands,
        });

        let events = inner.provider.subscribe();
        let handle = tokio::spawn(Self::listen(Arc::clone(&inner), events, requests));

        Self {
            inner,
            listener: Arc::new(ListenerGuard {
                handle: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Identity event loop: one enrichment per event, in order
    ///
    /// Pending identity events are always applied before a command is
    /// answered, so a command sent after an identity change sees its result.
    async fn listen(
        inner: Arc<Inner>,
        mut events: watch::Receiver<Option<Identity>>,
        mut requests: mpsc::UnboundedReceiver<Command>,
    ) {
        let identity = events.borrow_and_update().clone();
        inner.apply_identity(identity).await;

        loop {
            tokio::select! {
                biased;
                changed = events.changed() => {
                    if changed.is_err() {
                        log::debug!("Identity provider closed its session stream");
                        break;
                    }
                    let identity = events.borrow_and_update().clone();
                    inner.apply_identity(identity).await;
                }
                Some(command) = requests.recv() => match command {
                    Command::Settle(reply) => {
                        let _ = reply.send(inner.state.borrow().clone());
                    }
                    Command::Refresh(reply) => {
                        let identity = events.borrow().clone();
                        inner.apply_identity(identity).await;
                        let _ = reply.send(inner.state.borrow().clone());
                    }
                },
            }
        }
    }

    /// Hand `command` to the listener and wait for its answer; falls back to
    /// the current snapshot once the listener has stopped
    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<Session>) -> Command,
    ) -> Session {
        let (reply, answer) = oneshot::channel();
        if self.inner.commands.send(command(reply)).is_err() {
            return self.snapshot();
        }
        match answer.await {
            Ok(session) => session,
            Err(_) => self.snapshot(),
        }
    }

    /// Stop listening to identity events and tear the session down to anonymous
    pub fn stop(&self) {
        self.listener.abort();
        let generation = self.inner.next_generation();
        self.inner.publish(generation, Session::anonymous());
    }

    /// Read-only projection for guards and flows
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.inner.state.subscribe())
    }

    /// Copy of the current session
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Re-read role and entitlement for the provider's current identity and
    /// wait for the result
    ///
    /// An already resolved session for the same user stays visible until the
    /// new record replaces it.
    pub async fn refresh(&self) -> Session {
        self.request(Command::Refresh).await
    }

    /// Wait until the listener has applied every identity event published so
    /// far, without another backend fetch
    async fn settle(&self) -> Session {
        self.request(Command::Settle).await
    }

    /// Bearer token for backend calls on behalf of the current session
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::NotSignedIn`] for an anonymous session
    pub async fn bearer(&self) -> Result<String, AuthenticationError> {
        let identity = self
            .snapshot()
            .identity
            .ok_or(AuthenticationError::NotSignedIn)?;
        Ok(self.inner.bearer_for(&identity).await)
    }

    /// Sign in, exchange the provider credential for a backend token and
    /// refresh the session before returning
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider rejects the credentials or is
    /// unavailable. Backend problems after a successful sign-in only produce
    /// warnings.
    pub async fn sign_in(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<SignInOutcome, AuthenticationError> {
        let identity = self
            .inner
            .provider
            .sign_in(&credentials.email, &credentials.password)
            .await?;

        // A token left over from another account must not be used for this one
        self.inner.credentials.clear()?;

        let mut notices = self.inner.establish_backend_session(&identity).await;
        notices.push(Notice::success("Login successful!"));

        let session = self.settle().await;
        Ok(SignInOutcome { session, notices })
    }

    /// Create an account, register its profile with the backend and sign it in
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider refuses the registration
    pub async fn register(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<SignInOutcome, AuthenticationError> {
        let identity = self
            .inner
            .provider
            .sign_up(
                &credentials.email,
                &credentials.password,
                credentials.name.as_deref(),
            )
            .await?;
        self.inner.credentials.clear()?;

        let mut notices = Vec::new();
        if let Err(e) = self.inner.backend.register_user(&identity).await {
            log::warn!("Failed to store profile of {} in backend: {e}", identity.uid);
            notices.push(Notice::warning("User saved failed to backend!"));
        }
        notices.extend(self.inner.establish_backend_session(&identity).await);
        notices.push(Notice::success("Registration successful!"));

        let session = self.settle().await;
        Ok(SignInOutcome { session, notices })
    }

    /// End the session
    ///
    /// The identity provider session is invalidated, the persisted credential
    /// removed and the anonymous session published, all before this returns,
    /// so a redirect issued afterwards already sees the anonymous state.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider refuses to sign out or the
    /// persisted credential cannot be removed; the session is left untouched
    /// in the first case.
    pub async fn sign_out(&self) -> Result<Notice, AuthenticationError> {
        let identity = self.snapshot().identity;

        if let Some(identity) = identity.as_ref() {
            match self.inner.provider.sign_out(identity).await {
                // Already gone on the provider side; still clear locally
                Ok(()) | Err(AuthenticationError::NotSignedIn) => {}
                Err(e) => {
                    log::error!("Logout error: {e}");
                    return Err(e);
                }
            }
        }

        self.inner.credentials.clear()?;

        let generation = self.inner.next_generation();
        self.inner.publish(generation, Session::anonymous());
        LoggingHelper::log_signed_out(identity.as_ref().map(|i| i.uid.as_str()));

        Ok(Notice::success("Logged out successfully!"))
    }
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Replace the session if `generation` is still the latest write
    fn publish(&self, generation: u64, session: Session) -> bool {
        self.state.send_if_modified(|current| {
            if self.is_current(generation) {
                *current = session;
                true
            } else {
                false
            }
        })
    }

    /// Persisted backend token, else the provider credential
    async fn bearer_for(&self, identity: &Identity) -> String {
        match self.credentials.load() {
            Ok(Some(token)) => return token,
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read persisted credential: {e}"),
        }
        match self.provider.credential(identity).await {
            Ok(token) => token,
            Err(e) => {
                log::debug!("No fresh provider credential for {}: {e}", identity.uid);
                identity.id_token.clone()
            }
        }
    }

    /// Handle one identity snapshot: anonymous, or checking then enriched
    async fn apply_identity(&self, identity: Option<Identity>) {
        let generation = self.next_generation();

        let Some(identity) = identity else {
            self.publish(generation, Session::anonymous());
            LoggingHelper::log_session_resolved(&Session::anonymous());
            return;
        };

        let already_resolved = {
            let current = self.state.borrow();
            current.is_authenticated()
                && current
                    .identity
                    .as_ref()
                    .is_some_and(|shown| shown.uid == identity.uid)
        };
        if !already_resolved {
            self.publish(generation, Session::checking_for(identity.clone()));
        }

        let bearer = self.bearer_for(&identity).await;
        let session = match self.backend.fetch_user_data(&bearer).await {
            Ok(record) => Session::authenticated(identity, &record),
            Err(e) => {
                LoggingHelper::log_enrichment_failed(&identity.uid, &e);
                Session::least_privileged(identity)
            }
        };

        let uid = session
            .identity
            .as_ref()
            .map(|i| i.uid.clone())
            .unwrap_or_default();
        LoggingHelper::log_session_resolved(&session);
        if !self.publish(generation, session) {
            LoggingHelper::log_stale_enrichment(&uid);
        }
    }

    /// Exchange the provider token for a backend token, persist it, and fire
    /// the last-login bookkeeping call
    async fn establish_backend_session(&self, identity: &Identity) -> Vec<Notice> {
        let mut notices = Vec::new();

        let provider_token = match self.provider.credential(identity).await {
            Ok(token) => token,
            Err(_) => identity.id_token.clone(),
        };

        let bearer = match self.backend.exchange_token(&provider_token).await {
            Ok(token) => {
                if let Err(e) = self.credentials.store(&token) {
                    log::warn!("Failed to persist backend credential: {e}");
                }
                token
            }
            Err(e) => {
                log::warn!("Failed to get backend token for {}: {e}", identity.uid);
                notices.push(Notice::warning("Failed to get JWT token from server."));
                provider_token
            }
        };

        let backend = Arc::clone(&self.backend);
        let uid = identity.uid.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.record_last_login(&bearer, &uid).await {
                log::debug!("Ignoring last-login update failure for {uid}: {e}");
            }
        });

        notices
    }
}
