//! Backend REST API contract
//!
//! The backend owns roles, entitlement and payment intents. This module defines
//! the calls the client makes ([`Backend`]) and an HTTP implementation
//! ([`HttpBackend`]).

pub mod client;

pub use client::HttpBackend;

use crate::models::{Amount, DurationUnit, Identity, UserRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by backend calls
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The request never produced a response (connect, timeout, TLS)
    #[error("backend unreachable: {0}")]
    Transport(String),
    /// The backend answered with a non-success status
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body did not match the expected shape
    #[error("unexpected backend response: {0}")]
    Decode(String),
    /// The client is misconfigured (e.g. invalid base URL)
    #[error("backend client misconfigured: {0}")]
    Configuration(String),
}

impl BackendError {
    /// HTTP status reported by the backend, if it answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Calls made against the news backend
///
/// Every call is bearer-authenticated except [`Backend::exchange_token`], which
/// presents the identity provider's credential instead.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /users/user-data`: role and entitlement of the calling user
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded
    async fn fetch_user_data(&self, bearer: &str) -> Result<UserRecord, BackendError>;

    /// `POST /auth`: trade an identity-provider token for a backend token
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the identity token
    async fn exchange_token(&self, identity_token: &str) -> Result<String, BackendError>;

    /// `POST /users/register`: store a freshly created account's profile
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not accept the profile
    async fn register_user(&self, identity: &Identity) -> Result<(), BackendError>;

    /// `POST /users/subscription`: create a payment intent for `amount`,
    /// returning its client secret
    ///
    /// # Errors
    ///
    /// Returns an error if the intent cannot be created
    async fn create_payment_intent(
        &self,
        bearer: &str,
        amount: Amount,
    ) -> Result<String, BackendError>;

    /// `PATCH /users/premium`: extend premium entitlement
    ///
    /// Not idempotent by contract; callers must not retry automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not acknowledge the extension
    async fn extend_premium(
        &self,
        bearer: &str,
        duration: u32,
        unit: DurationUnit,
    ) -> Result<(), BackendError>;

    /// `PATCH /users/:id/last-login`: best-effort bookkeeping
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; callers ignore it
    async fn record_last_login(&self, bearer: &str, uid: &str) -> Result<(), BackendError>;
}
