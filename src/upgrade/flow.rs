use super::{
    FlowError, PaymentState, Plan, UpgradeIntent, UpgradeOutcome, ENTITLEMENT_PENDING_MESSAGE,
};
use crate::backend::Backend;
use crate::models::{Identity, Session};
use crate::payment::{BillingDetails, CardDetails, ConfirmDetails, PaymentProcessor};
use crate::utils::logging::LoggingHelper;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_POST_UPGRADE_PATH: &str = "/all-articles";

/// One checkout: payment, confirmation, then a single entitlement extension
///
/// Steps are strictly sequential. Dropping the flow mid-way abandons it; the
/// processor side is left to its own idempotency.
pub struct UpgradeFlow {
    id: Uuid,
    intent: UpgradeIntent,
    identity: Identity,
    bearer: String,
    processor: Arc<dyn PaymentProcessor>,
    backend: Arc<dyn Backend>,
    post_upgrade_path: String,
    /// Set once the entitlement extension has been issued
    entitlement_outcome: Option<UpgradeOutcome>,
}

impl UpgradeFlow {
    /// Start a checkout for `plan` on behalf of `session`
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotSignedIn`] for a session without identity and
    /// [`FlowError::FreePlan`] for a zero-amount plan
    pub fn new(
        plan: &Plan,
        session: &Session,
        bearer: String,
        processor: Arc<dyn PaymentProcessor>,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, FlowError> {
        let identity = session
            .identity
            .clone()
            .filter(|_| session.is_authenticated())
            .ok_or(FlowError::NotSignedIn)?;
        if plan.is_free() {
            return Err(FlowError::FreePlan);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            intent: UpgradeIntent::for_plan(plan),
            identity,
            bearer,
            processor,
            backend,
            post_upgrade_path: DEFAULT_POST_UPGRADE_PATH.to_string(),
            entitlement_outcome: None,
        })
    }

    /// Where a completed upgrade sends the user
    #[must_use]
    pub fn with_post_upgrade_path(mut self, path: &str) -> Self {
        self.post_upgrade_path = path.to_string();
        self
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn intent(&self) -> &UpgradeIntent {
        &self.intent
    }

    #[must_use]
    pub fn state(&self) -> PaymentState {
        self.intent.payment_state
    }

    fn transition(&mut self, to: PaymentState) -> Result<(), FlowError> {
        let from = self.intent.transition(to)?;
        LoggingHelper::log_payment_transition(&self.id, from, to);
        Ok(())
    }

    /// Record a payment failure and move to `failed`
    fn fail(&mut self, message: String) -> Result<UpgradeOutcome, FlowError> {
        LoggingHelper::log_payment_failed(&self.id, &message);
        self.transition(PaymentState::Failed)?;
        self.intent.client_secret = None;
        self.intent.error = Some(message.clone());
        Ok(UpgradeOutcome::PaymentFailed { message })
    }

    /// Pay with `card`
    ///
    /// Payment problems are returned as [`UpgradeOutcome::PaymentFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Busy`] unless the flow is idle, which rules out a
    /// double submit
    pub async fn submit(&mut self, card: &CardDetails) -> Result<UpgradeOutcome, FlowError> {
        if self.state() != PaymentState::Idle {
            return Err(FlowError::Busy(self.state()));
        }
        self.intent.error = None;
        self.transition(PaymentState::CreatingIntent)?;

        let payment_method = match self.processor.create_payment_method(card).await {
            Ok(method) => method,
            Err(e) => return self.fail(e.user_message()),
        };

        let client_secret = match self
            .backend
            .create_payment_intent(&self.bearer, self.intent.amount)
            .await
        {
            Ok(secret) => secret,
            Err(e) => {
                log::warn!("Failed to create payment intent: {e}");
                return self.fail("Could not start the payment. Please try again.".to_string());
            }
        };
        self.intent.client_secret = Some(client_secret.clone());
        self.transition(PaymentState::AwaitingConfirmation)?;

        let details = ConfirmDetails {
            payment_method,
            billing_details: BillingDetails {
                name: self.identity.billing_name(),
                email: self.identity.email.clone(),
            },
        };
        let intent = match self
            .processor
            .confirm_card_payment(&client_secret, &details)
            .await
        {
            Ok(intent) => intent,
            Err(e) => return self.fail(e.user_message()),
        };

        if !intent.status.is_success() {
            return self.fail(intent.status.failure_message().to_string());
        }

        self.transition(PaymentState::Confirmed)?;
        Ok(self.extend_entitlement().await)
    }

    /// Issue the entitlement extension for a confirmed payment
    ///
    /// The backend call happens at most once per flow; later calls return the
    /// first outcome.
    pub async fn extend_entitlement(&mut self) -> UpgradeOutcome {
        if let Some(outcome) = self.entitlement_outcome.as_ref() {
            return outcome.clone();
        }
        if self.state() != PaymentState::Confirmed {
            return UpgradeOutcome::PaymentFailed {
                message: "Payment has not been confirmed.".to_string(),
            };
        }

        // Recorded before the call so a re-entry cannot issue a second one
        self.entitlement_outcome = Some(UpgradeOutcome::EntitlementPending {
            message: ENTITLEMENT_PENDING_MESSAGE.to_string(),
        });

        let outcome = match self
            .backend
            .extend_premium(&self.bearer, self.intent.duration, self.intent.unit)
            .await
        {
            Ok(()) => {
                log::info!(
                    "💳 Upgrade flow {}: premium extended by {} {}",
                    self.id,
                    self.intent.duration,
                    self.intent.unit
                );
                UpgradeOutcome::Completed {
                    redirect_to: self.post_upgrade_path.clone(),
                }
            }
            Err(e) => {
                LoggingHelper::log_entitlement_update_failed(&self.id, &e);
                UpgradeOutcome::EntitlementPending {
                    message: ENTITLEMENT_PENDING_MESSAGE.to_string(),
                }
            }
        };

        self.entitlement_outcome = Some(outcome.clone());
        outcome
    }

    /// Return a failed flow to `idle` so the user can try again
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidTransition`] unless the flow has failed
    pub fn reset(&mut self) -> Result<(), FlowError> {
        self.transition(PaymentState::Idle)?;
        self.intent.error = None;
        self.intent.client_secret = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::models::{Amount, DurationUnit, Role};
    use crate::payment::{PaymentError, PaymentIntentStatus};
    use crate::testing::mock::{MockBackend, MockPaymentProcessor};
    use crate::testing::TestFixtures;
    use crate::upgrade::find_plan;

    fn flow_with(
        processor: &Arc<MockPaymentProcessor>,
        backend: &Arc<MockBackend>,
    ) -> UpgradeFlow {
        UpgradeFlow::new(
            find_plan("monthly-premium-analyst").unwrap(),
            &TestFixtures::reader_session(),
            "bearer".to_string(),
            Arc::clone(processor) as Arc<dyn PaymentProcessor>,
            Arc::clone(backend) as Arc<dyn Backend>,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_upgrade() {
        let processor = Arc::new(MockPaymentProcessor::succeeding());
        let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
        let mut flow = flow_with(&processor, &backend);

        let outcome = flow.submit(&TestFixtures::card()).await.unwrap();

        assert_eq!(
            outcome,
            UpgradeOutcome::Completed {
                redirect_to: "/all-articles".to_string()
            }
        );
        assert_eq!(flow.state(), PaymentState::Confirmed);
        assert_eq!(backend.payment_intent_amounts(), vec![Amount::from_cents(1499)]);
        assert_eq!(backend.premium_extensions(), vec![(1, DurationUnit::Month)]);
        let confirmed = processor.confirmations();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].billing_details.name, "janedoe");
    }

    #[tokio::test]
    async fn test_card_error_fails_without_backend_calls() {
        let processor = Arc::new(MockPaymentProcessor::failing_card("Your card was declined."));
        let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
        let mut flow = flow_with(&processor, &backend);

        let outcome = flow.submit(&TestFixtures::card()).await.unwrap();

        assert_eq!(
            outcome,
            UpgradeOutcome::PaymentFailed {
                message: "Your card was declined.".to_string()
            }
        );
        assert_eq!(flow.state(), PaymentState::Failed);
        assert!(backend.payment_intent_amounts().is_empty());
        assert!(backend.premium_extensions().is_empty());
    }

    #[tokio::test]
    async fn test_non_succeeded_status_is_failure() {
        let processor = Arc::new(MockPaymentProcessor::with_status(
            PaymentIntentStatus::RequiresAction,
        ));
        let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
        let mut flow = flow_with(&processor, &backend);

        let outcome = flow.submit(&TestFixtures::card()).await.unwrap();

        assert_eq!(
            outcome,
            UpgradeOutcome::PaymentFailed {
                message: PaymentIntentStatus::RequiresAction
                    .failure_message()
                    .to_string()
            }
        );
        assert!(backend.premium_extensions().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_error_passes_through_failed() {
        let processor = Arc::new(MockPaymentProcessor::succeeding());
        processor.fail_confirmation(PaymentError::Processor("timeout".to_string()));
        let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
        let mut flow = flow_with(&processor, &backend);

        flow.submit(&TestFixtures::card()).await.unwrap();
        assert_eq!(flow.state(), PaymentState::Failed);

        flow.reset().unwrap();
        assert_eq!(flow.state(), PaymentState::Idle);
        assert!(flow.intent().error.is_none());
    }

    #[tokio::test]
    async fn test_double_submit_is_rejected() {
        let processor = Arc::new(MockPaymentProcessor::succeeding());
        let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
        let mut flow = flow_with(&processor, &backend);

        flow.submit(&TestFixtures::card()).await.unwrap();
        let second = flow.submit(&TestFixtures::card()).await;

        assert_eq!(second, Err(FlowError::Busy(PaymentState::Confirmed)));
        assert_eq!(backend.premium_extensions().len(), 1);
        assert_eq!(processor.confirmations().len(), 1);
    }

    #[tokio::test]
    async fn test_entitlement_failure_is_not_retried() {
        let processor = Arc::new(MockPaymentProcessor::succeeding());
        let backend = Arc::new(MockBackend::with_user(Role::Reader, false));
        backend.fail_premium(BackendError::Status {
            status: 500,
            body: "oops".to_string(),
        });
        let mut flow = flow_with(&processor, &backend);

        let outcome = flow.submit(&TestFixtures::card()).await.unwrap();
        assert!(matches!(outcome, UpgradeOutcome::EntitlementPending { .. }));

        let again = flow.extend_entitlement().await;
        assert_eq!(again, outcome);
        assert_eq!(backend.premium_extension_attempts(), 1);
        assert!(flow.reset().is_err());
    }

    #[test]
    fn test_free_plan_and_anonymous_rejected() {
        let processor: Arc<dyn PaymentProcessor> = Arc::new(MockPaymentProcessor::succeeding());
        let backend: Arc<dyn Backend> = Arc::new(MockBackend::with_user(Role::Reader, false));

        let free = UpgradeFlow::new(
            find_plan("monthly-digital-reader").unwrap(),
            &TestFixtures::reader_session(),
            String::new(),
            Arc::clone(&processor),
            Arc::clone(&backend),
        );
        assert!(matches!(free, Err(FlowError::FreePlan)));

        let anonymous = UpgradeFlow::new(
            find_plan("monthly-premium-analyst").unwrap(),
            &Session::anonymous(),
            String::new(),
            processor,
            backend,
        );
        assert!(matches!(anonymous, Err(FlowError::NotSignedIn)));
    }
}
