//! Testing utilities for newsgate
//!
//! Shared by unit tests and by the integration tests under `tests/` (behind
//! the `testing` feature).
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built test data (identities, sessions, cards, settings)
//! - [`builders`] - Fluent builders for sessions and application state
//! - [`mock`] - In-memory identity provider, backend and payment processor
//!   that record the calls made against them
//!
//! ## Usage
//!
//! ```ignore
//! use newsgate::testing::{builders::TestSessionBuilder, fixtures::TestFixtures};
//! use newsgate::models::Role;
//!
//! let admin = TestSessionBuilder::new().with_role(Role::Admin).build();
//! assert!(admin.is_authenticated());
//!
//! let identity = TestFixtures::identity();
//! assert_eq!(identity.billing_name(), "janedoe");
//! ```

pub mod builders;
pub mod fixtures;
pub mod mock;

pub use builders::*;
pub use fixtures::TestFixtures;

/// Common test constants
pub mod constants {
    pub const TEST_UID: &str = "uid-test-1";

    pub const TEST_EMAIL: &str = "jane@example.com";

    pub const TEST_USER_NAME: &str = "Jane Doe";

    pub const TEST_PASSWORD: &str = "correct-horse";

    /// Token the mock identity provider hands out for an identity
    pub const TEST_PROVIDER_TOKEN: &str = "provider-id-token";

    /// Card number accepted by the mock processor
    pub const TEST_CARD_NUMBER: &str = "4242424242424242";
}
