//! Route guards
//!
//! Pure functions from a session snapshot and a route requirement to a
//! [`GuardDecision`]. Guards never navigate; the dispatcher acts on the
//! decision. Composition order is fixed: the auth gate runs first and the role
//! gate only sees sessions the auth gate let through.

use crate::models::{Role, Session};
use crate::utils::redirect_validator::validate_post_auth_redirect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const DEFAULT_RETURN_PATH: &str = "/";

/// Access requirement attached to a route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequirement {
    pub requires_auth: bool,
    /// Empty means any authenticated role; otherwise the session's role must
    /// be a member
    #[serde(default)]
    pub allowed_roles: BTreeSet<Role>,
}

impl RouteRequirement {
    #[must_use]
    pub fn public() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            allowed_roles: BTreeSet::new(),
        }
    }

    /// Authenticated and holding any of `roles`
    #[must_use]
    pub fn roles(roles: &[Role]) -> Self {
        Self {
            requires_auth: true,
            allowed_roles: roles.iter().copied().collect(),
        }
    }

    /// Whether `role` passes the role gate
    #[must_use]
    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.contains(&role)
    }
}

/// Why a guard redirected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RedirectReason {
    /// Sign-in required; come back to `return_to` afterwards
    Login { return_to: String },
    /// Signed in, but the role is not allowed
    Unauthorized,
    /// Guest-only page requested by a signed-in user
    AlreadyAuthenticated,
}

/// Outcome of evaluating the guards for one navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum GuardDecision {
    /// Auth check still in flight; show a loading placeholder
    Pending,
    Render,
    Redirect { to: String, reason: RedirectReason },
}

impl GuardDecision {
    fn login(requested_path: &str) -> Self {
        GuardDecision::Redirect {
            to: format!("{LOGIN_PATH}?from={}", urlencoding::encode(requested_path)),
            reason: RedirectReason::Login {
                return_to: requested_path.to_string(),
            },
        }
    }

    fn unauthorized() -> Self {
        GuardDecision::Redirect {
            to: UNAUTHORIZED_PATH.to_string(),
            reason: RedirectReason::Unauthorized,
        }
    }

    #[must_use]
    pub fn is_render(&self) -> bool {
        matches!(self, GuardDecision::Render)
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, GuardDecision::Pending)
    }

    /// Redirect target, if any
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::Redirect { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// Authentication gate
///
/// While the auth check is in flight this is always `Pending`, regardless of
/// the route, so nothing renders or redirects on a guess.
#[must_use]
pub fn auth_gate(
    session: &Session,
    requirement: &RouteRequirement,
    requested_path: &str,
) -> GuardDecision {
    if session.is_checking() {
        return GuardDecision::Pending;
    }
    if requirement.requires_auth && !session.is_authenticated() {
        return GuardDecision::login(requested_path);
    }
    GuardDecision::Render
}

/// Role gate
#[must_use]
pub fn role_gate(session: &Session, requirement: &RouteRequirement) -> GuardDecision {
    if requirement.allowed_roles.is_empty() {
        return GuardDecision::Render;
    }
    match session.resolved_role() {
        Some(role) if requirement.permits(role) => GuardDecision::Render,
        _ => GuardDecision::unauthorized(),
    }
}

/// Run the auth gate, then the role gate
#[must_use]
pub fn evaluate(
    session: &Session,
    requirement: &RouteRequirement,
    requested_path: &str,
) -> GuardDecision {
    match auth_gate(session, requirement, requested_path) {
        GuardDecision::Render => role_gate(session, requirement),
        other => other,
    }
}

/// Guard for the login and register pages
///
/// A signed-in user is sent on to `return_to` when it is a safe in-app path,
/// otherwise to `/`.
#[must_use]
pub fn guest_gate(session: &Session, return_to: Option<&str>) -> GuardDecision {
    if session.is_checking() {
        return GuardDecision::Pending;
    }
    if !session.is_authenticated() {
        return GuardDecision::Render;
    }
    GuardDecision::Redirect {
        to: safe_return_path(return_to),
        reason: RedirectReason::AlreadyAuthenticated,
    }
}

/// Validated return-to path, or `/`
#[must_use]
pub fn safe_return_path(return_to: Option<&str>) -> String {
    return_to
        .filter(|path| !path.is_empty())
        .and_then(|path| validate_post_auth_redirect(path).ok())
        .unwrap_or_else(|| DEFAULT_RETURN_PATH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRecord;
    use crate::testing::TestFixtures;

    fn signed_in(role: Role) -> Session {
        Session::authenticated(
            TestFixtures::identity(),
            &UserRecord {
                role,
                premium_taken: false,
                premium_expires_at: None,
            },
        )
    }

    #[test]
    fn test_checking_is_always_pending() {
        let session = Session::checking();
        for requirement in [
            RouteRequirement::public(),
            RouteRequirement::authenticated(),
            RouteRequirement::roles(&[Role::Admin]),
        ] {
            assert_eq!(evaluate(&session, &requirement, "/x"), GuardDecision::Pending);
        }
        assert_eq!(guest_gate(&session, None), GuardDecision::Pending);
    }

    #[test]
    fn test_anonymous_gets_login_with_return_path() {
        let decision = evaluate(
            &Session::anonymous(),
            &RouteRequirement::roles(&[Role::Admin]),
            "/admin/dashboard",
        );
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/login?from=%2Fadmin%2Fdashboard".to_string(),
                reason: RedirectReason::Login {
                    return_to: "/admin/dashboard".to_string()
                },
            }
        );
    }

    #[test]
    fn test_anonymous_may_view_public_routes() {
        let decision = evaluate(&Session::anonymous(), &RouteRequirement::public(), "/");
        assert!(decision.is_render());
    }

    #[test]
    fn test_role_union_semantics() {
        let requirement = RouteRequirement::roles(&[Role::Premium, Role::Admin]);
        assert!(evaluate(&signed_in(Role::Premium), &requirement, "/p").is_render());
        assert!(evaluate(&signed_in(Role::Admin), &requirement, "/p").is_render());
        assert_eq!(
            evaluate(&signed_in(Role::Reader), &requirement, "/p").redirect_target(),
            Some(UNAUTHORIZED_PATH)
        );
    }

    #[test]
    fn test_empty_role_set_admits_any_role() {
        let requirement = RouteRequirement::authenticated();
        for role in [Role::Reader, Role::Premium, Role::Admin] {
            assert!(role_gate(&signed_in(role), &requirement).is_render());
        }
    }

    #[test]
    fn test_least_privileged_session_is_reader() {
        let session = Session::least_privileged(TestFixtures::identity());
        let decision = evaluate(&session, &RouteRequirement::roles(&[Role::Premium]), "/p");
        assert_eq!(decision.redirect_target(), Some(UNAUTHORIZED_PATH));
    }

    #[test]
    fn test_guest_gate() {
        assert!(guest_gate(&Session::anonymous(), Some("/my-profile")).is_render());

        let session = signed_in(Role::Reader);
        assert_eq!(
            guest_gate(&session, Some("/my-profile")).redirect_target(),
            Some("/my-profile")
        );
        assert_eq!(guest_gate(&session, None).redirect_target(), Some("/"));
        assert_eq!(
            guest_gate(&session, Some("https://evil.example/")).redirect_target(),
            Some("/")
        );
    }
}
