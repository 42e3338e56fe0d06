//! Common authentication data types
//!
//! Error types shared by the session store and the HTTP handlers. Authorization
//! denials are deliberately absent: a role mismatch is a redirect decision made
//! by the route guards, never an error.

use crate::backend::BackendError;
use crate::credentials::CredentialError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown for any rejected sign-in; the provider's reason is only logged
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";

/// Errors raised while signing in, signing up or signing out
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The identity provider rejected the submitted credentials
    #[error("identity provider rejected credentials: {0}")]
    Rejected(String),
    /// The identity provider could not be reached or answered unexpectedly
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// The identity provider is not configured (missing API key etc.)
    #[error("identity provider misconfigured: {0}")]
    Configuration(String),
    /// An operation needed an identity but the session is anonymous
    #[error("no signed-in identity")]
    NotSignedIn,
    /// Backend call made on behalf of the session failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    /// The locally persisted credential could not be read or written
    #[error("credential store error: {0}")]
    Credentials(#[from] CredentialError),
}

impl AuthenticationError {
    /// Generic, user-facing text for this error
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthenticationError::Rejected(_) => INVALID_CREDENTIALS_MESSAGE,
            AuthenticationError::NotSignedIn => "You are not signed in.",
            AuthenticationError::Credentials(_) => {
                "Could not update the saved sign-in. Please try again."
            }
            AuthenticationError::ProviderUnavailable(_)
            | AuthenticationError::Configuration(_)
            | AuthenticationError::Backend(_) => {
                "Authentication is temporarily unavailable. Please try again."
            }
        }
    }
}

impl AuthenticationError {
    /// User-facing text for a failed registration
    #[must_use]
    pub fn registration_message(&self) -> &'static str {
        match self {
            AuthenticationError::Rejected(code) if code.starts_with("EMAIL_EXISTS") => {
                "Email already in use."
            }
            AuthenticationError::Rejected(code) if code.starts_with("WEAK_PASSWORD") => {
                "Password should be at least 6 characters."
            }
            AuthenticationError::Rejected(_) => "Registration failed.",
            other => other.user_message(),
        }
    }
}

/// Email/password pair submitted by the login and register forms
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
    /// Display name, only used on registration
    #[serde(default)]
    pub name: Option<String>,
}

/// User-visible confirmation produced by session operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "level", content = "message")]
pub enum Notice {
    Success(String),
    Warning(String),
}

impl Notice {
    #[must_use]
    pub fn success(message: &str) -> Self {
        Notice::Success(message.to_string())
    }

    #[must_use]
    pub fn warning(message: &str) -> Self {
        Notice::Warning(message.to_string())
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(msg) | Notice::Warning(msg) => msg,
        }
    }
}
