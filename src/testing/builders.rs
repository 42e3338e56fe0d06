//! Fluent builders for creating customizable test objects

use crate::backend::Backend;
use crate::credentials::CredentialStore;
use crate::handlers::AppState;
use crate::identity::IdentityProvider;
use crate::models::{Entitlement, Identity, Role, Session, UserRecord};
use crate::payment::PaymentProcessor;
use crate::session::SessionStore;
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::fixtures::TestFixtures;
use super::mock::{MockBackend, MockIdentityProvider, MockPaymentProcessor};

/// Builder for session snapshots
pub struct TestSessionBuilder {
    identity: Option<Identity>,
    role: Role,
    premium_taken: bool,
    premium_expires_in_hours: Option<i64>,
    checking: bool,
    enriched: bool,
}

impl TestSessionBuilder {
    /// Authenticated reader without premium
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: Some(TestFixtures::identity()),
            role: Role::Reader,
            premium_taken: false,
            premium_expires_in_hours: None,
            checking: false,
            enriched: true,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            identity: None,
            ..Self::new()
        }
    }

    /// Auth check still in flight
    #[must_use]
    pub fn checking() -> Self {
        Self {
            checking: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn with_premium(mut self) -> Self {
        self.premium_taken = true;
        self
    }

    /// Premium that ends (or ended, for negative values) this many hours from now
    #[must_use]
    pub fn premium_expires_in_hours(mut self, hours: i64) -> Self {
        self.premium_taken = true;
        self.premium_expires_in_hours = Some(hours);
        self
    }

    /// Backend lookup failed; least-privilege defaults
    #[must_use]
    pub fn unenriched(mut self) -> Self {
        self.enriched = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Session {
        if self.checking {
            return match self.identity {
                Some(identity) => Session::checking_for(identity),
                None => Session::checking(),
            };
        }
        let Some(identity) = self.identity else {
            return Session::anonymous();
        };
        if !self.enriched {
            return Session::least_privileged(identity);
        }

        let mut session = Session::authenticated(
            identity,
            &UserRecord {
                role: self.role,
                premium_taken: self.premium_taken,
                premium_expires_at: None,
            },
        );
        if let Some(hours) = self.premium_expires_in_hours {
            session.entitlement = Entitlement {
                premium_taken: true,
                expires_at: Some(Utc::now() + Duration::hours(hours)),
            };
        }
        session
    }
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state wired to mock collaborators
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<MockIdentityProvider>,
    pub backend: Arc<MockBackend>,
    pub processor: Arc<MockPaymentProcessor>,
}

/// Builder for [`TestApp`]
pub struct TestAppBuilder {
    provider: MockIdentityProvider,
    backend: MockBackend,
    processor: MockPaymentProcessor,
}

impl TestAppBuilder {
    /// Signed-out visitor, reader record on the backend, succeeding payments
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: MockIdentityProvider::signed_out(),
            backend: MockBackend::with_user(Role::Reader, false),
            processor: MockPaymentProcessor::succeeding(),
        }
    }

    /// Start already signed in as [`TestFixtures::identity`] with `role`
    #[must_use]
    pub fn signed_in_as(mut self, role: Role) -> Self {
        self.provider = MockIdentityProvider::signed_in(TestFixtures::identity());
        self.backend.set_user(role, role != Role::Reader);
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: MockBackend) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_processor(mut self, processor: MockPaymentProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Start the session store; must run inside a tokio runtime
    #[must_use]
    pub fn build(self) -> TestApp {
        let provider = Arc::new(self.provider);
        let backend = Arc::new(self.backend);
        let processor = Arc::new(self.processor);

        let store = SessionStore::start(
            Arc::clone(&provider) as Arc<dyn IdentityProvider>,
            Arc::clone(&backend) as Arc<dyn Backend>,
            CredentialStore::in_memory(),
        );
        let state = AppState::new(
            store,
            Arc::clone(&backend) as Arc<dyn Backend>,
            Arc::clone(&processor) as Arc<dyn PaymentProcessor>,
        );

        TestApp {
            state,
            provider,
            backend,
            processor,
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
