// Common types used across handlers
use crate::models::auth::Notice;
use crate::models::{AuthCheck, Role, Session};
use crate::payment::CardDetails;
use crate::upgrade::{PaymentState, UpgradeOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `?from=` return-to parameter of the login and register pages
#[derive(Debug, Default, Deserialize)]
pub struct ReturnQuery {
    pub from: Option<String>,
}

/// What the client may know about the current session
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub auth_check: AuthCheck,
    pub pending: bool,
    pub uid: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    /// Only reported once the auth check has resolved
    pub role: Option<Role>,
    pub premium: bool,
    pub enriched: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let identity = session.identity.as_ref();
        Self {
            auth_check: session.auth_check,
            pending: session.is_checking(),
            uid: identity.map(|i| i.uid.clone()),
            display_name: identity.and_then(|i| i.display_name.clone()),
            email: identity.and_then(|i| i.email.clone()),
            photo_url: identity.and_then(|i| i.photo_url.clone()),
            role: session.resolved_role(),
            premium: session.has_premium(),
            enriched: session.enriched,
        }
    }
}

/// A page the client should render
#[derive(Debug, Serialize)]
pub struct PageView {
    pub page: String,
    pub path: String,
    pub params: HashMap<String, String>,
    pub session: SessionView,
}

/// Successful sign-in or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub redirect_to: String,
    pub session: SessionView,
    pub notices: Vec<Notice>,
}

/// Successful sign-out
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub redirect_to: String,
    pub notice: Notice,
}

/// Body of `POST /api/checkout`
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: String,
    pub card: CardDetails,
}

/// Result of a checkout that reached the entitlement step
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub flow_id: String,
    /// Title of the purchased plan
    pub plan: String,
    pub state: PaymentState,
    #[serde(flatten)]
    pub outcome: UpgradeOutcome,
    pub session: SessionView,
}
