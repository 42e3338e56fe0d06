#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the newsgate application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod credentials;
pub mod guards;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod payment;
pub mod routes;
pub mod session;
pub mod settings;
pub mod upgrade;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use guards::{evaluate, GuardDecision, RouteRequirement};
pub use handlers::{configure_services, AppState};
pub use models::{Role, Session};
pub use session::{SessionHandle, SessionStore};
pub use settings::NewsgateSettings;
pub use upgrade::{PaymentState, UpgradeFlow};
