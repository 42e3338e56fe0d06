//! Session Store
//!
//! Single source of truth for who the current user is and what they may do.
//!
//! # Modules
//!
//! - [`store`] - The process-wide store fed by identity-provider events
//! - [`handle`] - Read-only projection handed to guards and flows

pub mod handle;
pub mod store;

pub use handle::SessionHandle;
pub use store::{SessionStore, SignInOutcome};
