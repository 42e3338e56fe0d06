// Centralized logging helpers for session, guard and payment events
use crate::guards::GuardDecision;
use crate::models::Session;
use crate::upgrade::PaymentState;
use log::{debug, error, info, warn};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log a session snapshot after enrichment
    pub fn log_session_resolved(session: &Session) {
        match session.identity.as_ref() {
            Some(identity) if session.enriched => info!(
                "Session resolved for {}: role={}, premium={}",
                identity.uid, session.role, session.entitlement.premium_taken
            ),
            Some(identity) => info!(
                "Session resolved for {} with least-privilege defaults",
                identity.uid
            ),
            None => info!("Session resolved as anonymous"),
        }
    }

    /// Log a failed role/entitlement lookup
    pub fn log_enrichment_failed(uid: &str, err: &dyn std::fmt::Display) {
        warn!("Failed to fetch user data for {uid}, falling back to reader: {err}");
    }

    /// Log that an enrichment result was dropped because the session moved on
    pub fn log_stale_enrichment(uid: &str) {
        debug!("Discarding stale user data for {uid}");
    }

    pub fn log_signed_out(uid: Option<&str>) {
        info!("🚪 Signed out {}", uid.unwrap_or("anonymous session"));
    }

    /// Log a guard outcome for a navigation
    pub fn log_guard_decision(path: &str, decision: &GuardDecision) {
        match decision {
            GuardDecision::Render => debug!("Guard allowed {path}"),
            GuardDecision::Pending => debug!("Guard pending for {path}: auth check in flight"),
            GuardDecision::Redirect { to, reason } => {
                debug!("Guard redirected {path} -> {to} ({reason:?})");
            }
        }
    }

    /// Log an upgrade flow transition
    pub fn log_payment_transition(flow_id: &uuid::Uuid, from: PaymentState, to: PaymentState) {
        info!("💳 Upgrade flow {flow_id}: {from} -> {to}");
    }

    /// Log a payment error reported by the processor or backend
    pub fn log_payment_failed(flow_id: &uuid::Uuid, reason: &str) {
        warn!("💳 Upgrade flow {flow_id} failed: {reason}");
    }

    /// Log the paid-but-not-entitled condition
    pub fn log_entitlement_update_failed(flow_id: &uuid::Uuid, err: &dyn std::fmt::Display) {
        error!(
            "💳 Upgrade flow {flow_id}: payment succeeded but entitlement update failed: {err}"
        );
    }

    /// Log server startup details
    pub fn log_startup(bind_address: &str, backend_url: &str, routes: usize) {
        info!("Starting newsgate on http://{bind_address}");
        info!("Backend API: {backend_url}");
        info!("Route table: {routes} routes");
    }
}
