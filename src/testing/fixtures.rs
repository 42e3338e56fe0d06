//! Test fixtures providing pre-built test objects

use crate::models::auth::PasswordCredentials;
use crate::models::{Identity, Role, Session, UserRecord};
use crate::payment::CardDetails;
use crate::settings::NewsgateSettings;

use super::constants::{
    TEST_CARD_NUMBER, TEST_EMAIL, TEST_PASSWORD, TEST_PROVIDER_TOKEN, TEST_UID, TEST_USER_NAME,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// The identity the mock provider signs in
    #[must_use]
    pub fn identity() -> Identity {
        Identity {
            uid: TEST_UID.to_string(),
            display_name: Some(TEST_USER_NAME.to_string()),
            email: Some(TEST_EMAIL.to_string()),
            photo_url: None,
            id_token: TEST_PROVIDER_TOKEN.to_string(),
        }
    }

    #[must_use]
    pub fn password_credentials() -> PasswordCredentials {
        PasswordCredentials {
            email: TEST_EMAIL.to_string(),
            password: TEST_PASSWORD.to_string(),
            name: Some(TEST_USER_NAME.to_string()),
        }
    }

    #[must_use]
    pub fn user_record(role: Role, premium_taken: bool) -> UserRecord {
        UserRecord {
            role,
            premium_taken,
            premium_expires_at: None,
        }
    }

    /// Authenticated, enriched session with the given role
    #[must_use]
    pub fn session_with_role(role: Role) -> Session {
        Session::authenticated(
            Self::identity(),
            &Self::user_record(role, role != Role::Reader),
        )
    }

    #[must_use]
    pub fn reader_session() -> Session {
        Self::session_with_role(Role::Reader)
    }

    #[must_use]
    pub fn premium_session() -> Session {
        Self::session_with_role(Role::Premium)
    }

    #[must_use]
    pub fn admin_session() -> Session {
        Self::session_with_role(Role::Admin)
    }

    #[must_use]
    pub fn card() -> CardDetails {
        CardDetails {
            number: TEST_CARD_NUMBER.to_string(),
            exp_month: 12,
            exp_year: 2034,
            cvc: "123".to_string(),
        }
    }

    /// Settings with test keys and no environment indirection
    #[must_use]
    pub fn settings() -> NewsgateSettings {
        let mut settings = NewsgateSettings::default();
        settings.identity.api_key = Some("test-identity-key".to_string());
        settings.identity.api_key_env = None;
        settings.payments.publishable_key = Some("pk_test_123".to_string());
        settings.payments.publishable_key_env = None;
        settings
    }
}
