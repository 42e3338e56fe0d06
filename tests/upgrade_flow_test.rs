// Upgrade flow end to end: session, payment processor and entitlement update
use newsgate::backend::{Backend, BackendError};
use newsgate::models::{Amount, DurationUnit, Role};
use newsgate::payment::{PaymentIntentStatus, PaymentProcessor};
use newsgate::testing::mock::{MockBackend, MockPaymentProcessor};
use newsgate::testing::{TestAppBuilder, TestFixtures};
use newsgate::upgrade::{
    find_plan, FlowError, PaymentState, UpgradeFlow, UpgradeOutcome, ENTITLEMENT_PENDING_MESSAGE,
};
use std::sync::Arc;

#[tokio::test]
async fn test_successful_upgrade_grants_premium_on_next_fetch() {
    let app = TestAppBuilder::new().signed_in_as(Role::Reader).build();
    let store = app.state.store.clone();
    let session = store.handle().resolved().await;
    assert!(!session.has_premium());

    let plan = find_plan("monthly-premium-analyst").unwrap();
    assert_eq!(plan.amount, Amount::from_cents(1499));

    let mut flow = UpgradeFlow::new(
        plan,
        &session,
        store.bearer().await.unwrap(),
        Arc::clone(&app.processor) as Arc<dyn PaymentProcessor>,
        Arc::clone(&app.backend) as Arc<dyn Backend>,
    )
    .unwrap();

    let outcome = flow.submit(&TestFixtures::card()).await.unwrap();

    assert_eq!(
        outcome,
        UpgradeOutcome::Completed {
            redirect_to: "/all-articles".to_string()
        }
    );
    assert_eq!(flow.state(), PaymentState::Confirmed);
    assert_eq!(flow.intent().target_plan_name, "Premium Analyst");
    assert_eq!(app.backend.premium_extensions(), vec![(1, DurationUnit::Month)]);
    assert_eq!(
        app.processor.client_secrets(),
        vec![MockBackend::CLIENT_SECRET.to_string()]
    );

    let refreshed = store.refresh().await;
    assert!(refreshed.has_premium());
}

#[tokio::test]
async fn test_entitlement_failure_is_explicit_and_not_retried() {
    let backend = MockBackend::with_user(Role::Reader, false);
    backend.fail_premium(BackendError::Status {
        status: 500,
        body: "internal error".to_string(),
    });
    let app = TestAppBuilder::new()
        .with_backend(backend)
        .signed_in_as(Role::Reader)
        .build();
    let store = app.state.store.clone();
    let session = store.handle().resolved().await;

    let mut flow = UpgradeFlow::new(
        find_plan("monthly-premium-analyst").unwrap(),
        &session,
        store.bearer().await.unwrap(),
        Arc::clone(&app.processor) as Arc<dyn PaymentProcessor>,
        Arc::clone(&app.backend) as Arc<dyn Backend>,
    )
    .unwrap();

    let outcome = flow.submit(&TestFixtures::card()).await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::EntitlementPending {
            message: ENTITLEMENT_PENDING_MESSAGE.to_string()
        }
    );

    // Re-rendering the result must not re-issue the entitlement call
    assert_eq!(flow.extend_entitlement().await, outcome);
    assert_eq!(
        flow.submit(&TestFixtures::card()).await,
        Err(FlowError::Busy(PaymentState::Confirmed))
    );
    assert_eq!(app.backend.premium_extension_attempts(), 1);
    assert_eq!(app.processor.confirmations().len(), 1);
    assert!(!store.refresh().await.has_premium());
}

#[tokio::test]
async fn test_declined_payment_can_be_retried_after_reset() {
    let app = TestAppBuilder::new()
        .with_processor(MockPaymentProcessor::with_status(
            PaymentIntentStatus::RequiresPaymentMethod,
        ))
        .signed_in_as(Role::Reader)
        .build();
    let store = app.state.store.clone();
    let session = store.handle().resolved().await;

    let mut flow = UpgradeFlow::new(
        find_plan("quick-short-term").unwrap(),
        &session,
        store.bearer().await.unwrap(),
        Arc::clone(&app.processor) as Arc<dyn PaymentProcessor>,
        Arc::clone(&app.backend) as Arc<dyn Backend>,
    )
    .unwrap();

    let outcome = flow.submit(&TestFixtures::card()).await.unwrap();
    assert!(matches!(outcome, UpgradeOutcome::PaymentFailed { .. }));
    assert_eq!(flow.state(), PaymentState::Failed);
    assert!(flow.intent().error.is_some());
    assert_eq!(flow.intent().target_plan_name, "Short Term");
    assert_eq!(app.backend.premium_extension_attempts(), 0);

    // Resubmitting a failed flow without a reset is a double submit
    assert_eq!(
        flow.submit(&TestFixtures::card()).await,
        Err(FlowError::Busy(PaymentState::Failed))
    );

    flow.reset().unwrap();
    let retried = flow.submit(&TestFixtures::card()).await.unwrap();
    assert!(matches!(retried, UpgradeOutcome::PaymentFailed { .. }));
    assert_eq!(
        app.backend.payment_intent_amounts(),
        vec![Amount::from_cents(500), Amount::from_cents(500)]
    );
}

#[tokio::test]
async fn test_payment_intent_failure_fails_before_confirmation() {
    let backend = MockBackend::with_user(Role::Reader, false);
    backend.fail_payment_intent(BackendError::Transport("timeout".to_string()));
    let app = TestAppBuilder::new()
        .with_backend(backend)
        .signed_in_as(Role::Reader)
        .build();
    let store = app.state.store.clone();
    let session = store.handle().resolved().await;

    let mut flow = UpgradeFlow::new(
        find_plan("annual-family-edition").unwrap(),
        &session,
        store.bearer().await.unwrap(),
        Arc::clone(&app.processor) as Arc<dyn PaymentProcessor>,
        Arc::clone(&app.backend) as Arc<dyn Backend>,
    )
    .unwrap();

    let outcome = flow.submit(&TestFixtures::card()).await.unwrap();

    assert!(matches!(outcome, UpgradeOutcome::PaymentFailed { .. }));
    assert_eq!(flow.state(), PaymentState::Failed);
    assert!(app.processor.confirmations().is_empty());
}
