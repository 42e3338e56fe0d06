//! Identity provider contract
//!
//! The identity provider authenticates users and issues their bearer
//! credential. Session changes are published as an always-current snapshot on
//! a `tokio::sync::watch` channel: a fresh subscriber sees the current state
//! immediately and every later sign-in or sign-out.

pub mod password;

pub use password::PasswordIdentityProvider;

use crate::models::auth::AuthenticationError;
use crate::models::Identity;
use async_trait::async_trait;
use tokio::sync::watch;

/// External authentication service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to session changes (`None` = signed out)
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// Current bearer credential for `identity`
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` is no longer signed in
    async fn credential(&self, identity: &Identity) -> Result<String, AuthenticationError>;

    /// Sign in with email and password
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::Rejected`] for bad credentials, or a
    /// provider error if the service is unreachable
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthenticationError>;

    /// Create an account and sign it in
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::Rejected`] if the account cannot be
    /// created (e.g. the email is taken)
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthenticationError>;

    /// End the provider session of `identity`
    ///
    /// # Errors
    ///
    /// Returns an error if the provider refuses to end the session
    async fn sign_out(&self, identity: &Identity) -> Result<(), AuthenticationError>;
}
