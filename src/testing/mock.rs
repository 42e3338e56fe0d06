//! Mock objects and fake implementations for testing
//!
//! In-memory stand-ins for the identity provider, the backend and the payment
//! processor. Each records the calls made against it and can be told to fail.

use crate::backend::{Backend, BackendError};
use crate::identity::IdentityProvider;
use crate::models::auth::AuthenticationError;
use crate::models::{Amount, DurationUnit, Identity, Role, UserRecord};
use crate::payment::{
    CardDetails, ConfirmDetails, PaymentError, PaymentIntent, PaymentIntentStatus, PaymentMethod,
    PaymentProcessor,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};

use super::constants::TEST_PROVIDER_TOKEN;
use super::fixtures::TestFixtures;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ===============================
// IDENTITY PROVIDER
// ===============================

/// Identity provider that signs everyone in as [`TestFixtures::identity`]
pub struct MockIdentityProvider {
    current: watch::Sender<Option<Identity>>,
    account: Identity,
    rejection: Mutex<Option<String>>,
    fail_sign_out: AtomicBool,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockIdentityProvider {
    fn with_current(current: Option<Identity>) -> Self {
        let (current, _) = watch::channel(current);
        Self {
            current,
            account: TestFixtures::identity(),
            rejection: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::with_current(None)
    }

    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        Self::with_current(Some(identity))
    }

    /// Reject the next sign-ins and sign-ups with `code`
    pub fn reject_with(&self, code: &str) {
        *lock(&self.rejection) = Some(code.to_string());
    }

    pub fn reject_sign_in(&self) {
        self.reject_with("INVALID_LOGIN_CREDENTIALS");
    }

    pub fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    /// Push an identity event as the provider would on a token change
    pub fn emit(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }

    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn check_rejection(&self) -> Result<(), AuthenticationError> {
        match lock(&self.rejection).clone() {
            Some(code) => Err(AuthenticationError::Rejected(code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    async fn credential(&self, _identity: &Identity) -> Result<String, AuthenticationError> {
        Ok(TEST_PROVIDER_TOKEN.to_string())
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity, AuthenticationError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.check_rejection()?;

        let identity = Identity {
            email: Some(email.to_string()),
            ..self.account.clone()
        };
        self.emit(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthenticationError> {
        self.check_rejection()?;

        let identity = Identity {
            email: Some(email.to_string()),
            display_name: display_name.map(ToString::to_string),
            ..self.account.clone()
        };
        self.emit(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self, _identity: &Identity) -> Result<(), AuthenticationError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthenticationError::ProviderUnavailable(
                "network error".to_string(),
            ));
        }
        self.emit(None);
        Ok(())
    }
}

// ===============================
// BACKEND
// ===============================

/// Backend holding a single user record
pub struct MockBackend {
    record: Mutex<UserRecord>,
    user_data_error: Mutex<Option<BackendError>>,
    premium_error: Mutex<Option<BackendError>>,
    intent_error: Mutex<Option<BackendError>>,
    token_exchange_fails: AtomicBool,
    registration_fails: AtomicBool,
    user_data_gate: Mutex<Option<Arc<Semaphore>>>,
    user_data_calls: AtomicUsize,
    user_data_completed: AtomicUsize,
    last_bearer: Mutex<Option<String>>,
    registered: Mutex<Vec<String>>,
    last_logins: Mutex<Vec<String>>,
    intents: Mutex<Vec<Amount>>,
    extensions: Mutex<Vec<(u32, DurationUnit)>>,
    extension_attempts: AtomicUsize,
}

impl MockBackend {
    /// Token returned by `POST /auth`
    pub const BACKEND_TOKEN: &'static str = "backend-jwt";

    /// Client secret returned by `POST /users/subscription`
    pub const CLIENT_SECRET: &'static str = "pi_mock_secret_abc";

    #[must_use]
    pub fn with_user(role: Role, premium_taken: bool) -> Self {
        Self {
            record: Mutex::new(TestFixtures::user_record(role, premium_taken)),
            user_data_error: Mutex::new(None),
            premium_error: Mutex::new(None),
            intent_error: Mutex::new(None),
            token_exchange_fails: AtomicBool::new(false),
            registration_fails: AtomicBool::new(false),
            user_data_gate: Mutex::new(None),
            user_data_calls: AtomicUsize::new(0),
            user_data_completed: AtomicUsize::new(0),
            last_bearer: Mutex::new(None),
            registered: Mutex::new(Vec::new()),
            last_logins: Mutex::new(Vec::new()),
            intents: Mutex::new(Vec::new()),
            extensions: Mutex::new(Vec::new()),
            extension_attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_user(&self, role: Role, premium_taken: bool) {
        *lock(&self.record) = TestFixtures::user_record(role, premium_taken);
    }

    pub fn fail_user_data(&self, error: BackendError) {
        *lock(&self.user_data_error) = Some(error);
    }

    pub fn fail_premium(&self, error: BackendError) {
        *lock(&self.premium_error) = Some(error);
    }

    pub fn fail_payment_intent(&self, error: BackendError) {
        *lock(&self.intent_error) = Some(error);
    }

    pub fn fail_token_exchange(&self) {
        self.token_exchange_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_registration(&self) {
        self.registration_fails.store(true, Ordering::SeqCst);
    }

    /// Hold every following `GET /users/user-data` until a permit is added to
    /// the returned semaphore
    #[must_use]
    pub fn hold_user_data(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *lock(&self.user_data_gate) = Some(Arc::clone(&gate));
        gate
    }

    #[must_use]
    pub fn user_data_calls(&self) -> usize {
        self.user_data_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn user_data_completed(&self) -> usize {
        self.user_data_completed.load(Ordering::SeqCst)
    }

    /// Bearer presented on the latest user-data fetch
    #[must_use]
    pub fn last_bearer(&self) -> Option<String> {
        lock(&self.last_bearer).clone()
    }

    #[must_use]
    pub fn registered_uids(&self) -> Vec<String> {
        lock(&self.registered).clone()
    }

    #[must_use]
    pub fn last_login_uids(&self) -> Vec<String> {
        lock(&self.last_logins).clone()
    }

    #[must_use]
    pub fn payment_intent_amounts(&self) -> Vec<Amount> {
        lock(&self.intents).clone()
    }

    /// Successful entitlement extensions
    #[must_use]
    pub fn premium_extensions(&self) -> Vec<(u32, DurationUnit)> {
        lock(&self.extensions).clone()
    }

    /// Every `PATCH /users/premium`, successful or not
    #[must_use]
    pub fn premium_extension_attempts(&self) -> usize {
        self.extension_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn fetch_user_data(&self, bearer: &str) -> Result<UserRecord, BackendError> {
        self.user_data_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_bearer) = Some(bearer.to_string());

        let gate = lock(&self.user_data_gate).clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let result = match lock(&self.user_data_error).clone() {
            Some(error) => Err(error),
            None => Ok(lock(&self.record).clone()),
        };
        self.user_data_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn exchange_token(&self, _identity_token: &str) -> Result<String, BackendError> {
        if self.token_exchange_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 401,
                body: "invalid token".to_string(),
            });
        }
        Ok(Self::BACKEND_TOKEN.to_string())
    }

    async fn register_user(&self, identity: &Identity) -> Result<(), BackendError> {
        if self.registration_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".to_string()));
        }
        lock(&self.registered).push(identity.uid.clone());
        Ok(())
    }

    async fn create_payment_intent(
        &self,
        _bearer: &str,
        amount: Amount,
    ) -> Result<String, BackendError> {
        if let Some(error) = lock(&self.intent_error).clone() {
            return Err(error);
        }
        lock(&self.intents).push(amount);
        Ok(Self::CLIENT_SECRET.to_string())
    }

    async fn extend_premium(
        &self,
        _bearer: &str,
        duration: u32,
        unit: DurationUnit,
    ) -> Result<(), BackendError> {
        self.extension_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.premium_error).clone() {
            return Err(error);
        }

        lock(&self.extensions).push((duration, unit));
        let mut record = lock(&self.record);
        record.premium_taken = true;
        if record.role == Role::Reader {
            record.role = Role::Premium;
        }
        Ok(())
    }

    async fn record_last_login(&self, _bearer: &str, uid: &str) -> Result<(), BackendError> {
        lock(&self.last_logins).push(uid.to_string());
        Ok(())
    }
}

// ===============================
// PAYMENT PROCESSOR
// ===============================

/// Payment processor answering every confirmation with a fixed status
pub struct MockPaymentProcessor {
    status: Mutex<PaymentIntentStatus>,
    method_error: Mutex<Option<PaymentError>>,
    confirm_error: Mutex<Option<PaymentError>>,
    methods_created: AtomicUsize,
    confirmations: Mutex<Vec<ConfirmDetails>>,
    client_secrets: Mutex<Vec<String>>,
}

impl MockPaymentProcessor {
    #[must_use]
    pub fn with_status(status: PaymentIntentStatus) -> Self {
        Self {
            status: Mutex::new(status),
            method_error: Mutex::new(None),
            confirm_error: Mutex::new(None),
            methods_created: AtomicUsize::new(0),
            confirmations: Mutex::new(Vec::new()),
            client_secrets: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn succeeding() -> Self {
        Self::with_status(PaymentIntentStatus::Succeeded)
    }

    /// Reject card tokenisation with a user-facing message
    #[must_use]
    pub fn failing_card(message: &str) -> Self {
        let processor = Self::succeeding();
        *lock(&processor.method_error) = Some(PaymentError::Card(message.to_string()));
        processor
    }

    pub fn fail_confirmation(&self, error: PaymentError) {
        *lock(&self.confirm_error) = Some(error);
    }

    #[must_use]
    pub fn methods_created(&self) -> usize {
        self.methods_created.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn confirmations(&self) -> Vec<ConfirmDetails> {
        lock(&self.confirmations).clone()
    }

    #[must_use]
    pub fn client_secrets(&self) -> Vec<String> {
        lock(&self.client_secrets).clone()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_payment_method(
        &self,
        card: &CardDetails,
    ) -> Result<PaymentMethod, PaymentError> {
        if let Some(error) = lock(&self.method_error).clone() {
            return Err(error);
        }
        let count = self.methods_created.fetch_add(1, Ordering::SeqCst) + 1;
        let last4 = card
            .number
            .get(card.number.len().saturating_sub(4)..)
            .unwrap_or_default();
        Ok(PaymentMethod {
            id: format!("pm_mock_{count}_{last4}"),
        })
    }

    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        details: &ConfirmDetails,
    ) -> Result<PaymentIntent, PaymentError> {
        lock(&self.client_secrets).push(client_secret.to_string());
        lock(&self.confirmations).push(details.clone());
        if let Some(error) = lock(&self.confirm_error).clone() {
            return Err(error);
        }

        let id = client_secret
            .split_once("_secret_")
            .map_or("pi_mock", |(id, _)| id)
            .to_string();
        Ok(PaymentIntent {
            id,
            status: *lock(&self.status),
        })
    }
}
