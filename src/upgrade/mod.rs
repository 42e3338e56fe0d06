//! Entitlement upgrade flow
//!
//! Turns a plan selection into a processor-confirmed payment and exactly one
//! entitlement extension on the backend.
//!
//! # Modules
//!
//! - [`flow`] - The per-checkout state machine
//! - [`plans`] - Plan catalog
//! - [`slot`] - Process-wide checkout slot (one flow in flight at a time)

pub mod flow;
pub mod plans;
pub mod slot;

pub use flow::UpgradeFlow;
pub use plans::{catalog, find_plan, Plan, PlanCategory};
pub use slot::{CheckoutGuard, CheckoutSlot};

use crate::models::{Amount, DurationUnit};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Message for a confirmed payment whose entitlement update failed
pub const ENTITLEMENT_PENDING_MESSAGE: &str =
    "Payment succeeded but entitlement update failed. Please contact support before paying again.";

/// Progress of one checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentState {
    Idle,
    CreatingIntent,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl PaymentState {
    /// Whether `self -> to` is an edge of the state machine
    ///
    /// `AwaitingConfirmation` can only leave through `Confirmed` or `Failed`;
    /// `Confirmed` is terminal.
    #[must_use]
    pub fn can_transition_to(self, to: PaymentState) -> bool {
        use PaymentState::{AwaitingConfirmation, Confirmed, CreatingIntent, Failed, Idle};
        matches!(
            (self, to),
            (Idle, CreatingIntent)
                | (CreatingIntent, AwaitingConfirmation | Failed)
                | (AwaitingConfirmation, Confirmed | Failed)
                | (Failed, Idle)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentState::Idle => "idle",
            PaymentState::CreatingIntent => "creating-intent",
            PaymentState::AwaitingConfirmation => "awaiting-confirmation",
            PaymentState::Confirmed => "confirmed",
            PaymentState::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors in driving the flow itself (not payment outcomes)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("invalid payment state transition {from} -> {to}")]
    InvalidTransition { from: PaymentState, to: PaymentState },
    /// Submit while a payment is already in progress or finished
    #[error("checkout already {0}")]
    Busy(PaymentState),
    /// Another checkout holds the slot
    #[error("another checkout is in progress")]
    SlotTaken,
    #[error("free plans do not go through checkout")]
    FreePlan,
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error("checkout requires a signed-in user")]
    NotSignedIn,
}

/// Transient state of one checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeIntent {
    /// Title of the plan being bought, shown next to any failure
    pub target_plan_name: String,
    pub amount: Amount,
    pub duration: u32,
    pub unit: DurationUnit,
    pub payment_state: PaymentState,
    /// Set while the backend-issued intent is being confirmed
    #[serde(skip)]
    pub client_secret: Option<String>,
    /// Inline error for the last failure
    pub error: Option<String>,
}

impl UpgradeIntent {
    #[must_use]
    pub fn new(
        target_plan_name: &str,
        amount: Amount,
        duration: u32,
        unit: DurationUnit,
    ) -> Self {
        Self {
            target_plan_name: target_plan_name.to_string(),
            amount,
            duration,
            unit,
            payment_state: PaymentState::Idle,
            client_secret: None,
            error: None,
        }
    }

    #[must_use]
    pub fn for_plan(plan: &Plan) -> Self {
        Self::new(plan.title, plan.amount, plan.duration, plan.unit)
    }

    /// Move to `to`, refusing edges the state machine does not have
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidTransition`] for a disallowed edge
    pub fn transition(&mut self, to: PaymentState) -> Result<PaymentState, FlowError> {
        let from = self.payment_state;
        if !from.can_transition_to(to) {
            return Err(FlowError::InvalidTransition { from, to });
        }
        self.payment_state = to;
        Ok(from)
    }
}

/// What the checkout form should show after a submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum UpgradeOutcome {
    /// Entitlement extended; close the modal and navigate
    Completed { redirect_to: String },
    /// Payment did not go through; shown inline, the flow can be reset
    PaymentFailed { message: String },
    /// Paid, but the backend did not record the entitlement
    EntitlementPending { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentState; 5] = [
        PaymentState::Idle,
        PaymentState::CreatingIntent,
        PaymentState::AwaitingConfirmation,
        PaymentState::Confirmed,
        PaymentState::Failed,
    ];

    #[test]
    fn test_awaiting_confirmation_never_returns_to_idle() {
        assert!(!PaymentState::AwaitingConfirmation.can_transition_to(PaymentState::Idle));
        assert!(PaymentState::AwaitingConfirmation.can_transition_to(PaymentState::Failed));
        assert!(PaymentState::Failed.can_transition_to(PaymentState::Idle));
    }

    #[test]
    fn test_confirmed_is_terminal() {
        for to in ALL {
            assert!(!PaymentState::Confirmed.can_transition_to(to), "confirmed -> {to}");
        }
    }

    #[test]
    fn test_transition_reports_invalid_edges() {
        let mut intent =
            UpgradeIntent::new("Premium Analyst", Amount::from_cents(1499), 1, DurationUnit::Month);
        assert_eq!(
            intent.transition(PaymentState::Confirmed),
            Err(FlowError::InvalidTransition {
                from: PaymentState::Idle,
                to: PaymentState::Confirmed,
            })
        );
        assert_eq!(intent.payment_state, PaymentState::Idle);

        assert_eq!(
            intent.transition(PaymentState::CreatingIntent),
            Ok(PaymentState::Idle)
        );
        assert_eq!(intent.payment_state, PaymentState::CreatingIntent);
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        let json = serde_json::to_value(PaymentState::AwaitingConfirmation).unwrap();
        assert_eq!(json, "awaiting-confirmation");
        assert_eq!(PaymentState::CreatingIntent.to_string(), "creating-intent");
    }
}
