use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod auth;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Coarse permission class assigned by the backend
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Reader,
    Premium,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Premium => "premium",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" | "user" => Ok(Role::Reader),
            "premium" => Ok(Role::Premium),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity issued by the external identity provider
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Opaque provider-issued user id
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Avatar reference (URL) as stored by the identity provider
    pub photo_url: Option<String>,
    /// Bearer credential issued by the identity provider
    #[serde(skip_serializing, default)]
    pub id_token: String,
}

impl Identity {
    /// Billing name handed to the payment processor: the display name with
    /// whitespace removed and lowercased, falling back to the email.
    #[must_use]
    pub fn billing_name(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name
                .split_whitespace()
                .collect::<String>()
                .to_lowercase(),
            _ => self.email.clone().unwrap_or_default(),
        }
    }
}

/// Premium entitlement as reported by the backend
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Entitlement {
    pub premium_taken: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    /// Not entitled; the least-privileged default
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether premium access is active at the given instant
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_taken && self.expires_at.map_or(true, |expiry| expiry > now)
    }
}

/// User record returned by `GET /users/user-data`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub premium_taken: bool,
    #[serde(default, alias = "premiumExpiresAt", alias = "premiumExpiry")]
    pub premium_expires_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    #[must_use]
    pub fn entitlement(&self) -> Entitlement {
        Entitlement {
            premium_taken: self.premium_taken,
            expires_at: self.premium_expires_at,
        }
    }
}

/// Monetary amount in cents; sent to the backend as decimal dollars
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)] // cents of a subscription price fit in f64 exactly
    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_dollars())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dollars = f64::deserialize(deserializer)?;
        if !dollars.is_finite() || dollars < 0.0 {
            return Err(serde::de::Error::custom("amount must be a non-negative number"));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cents = (dollars * 100.0).round() as u64;
        Ok(Self(cents))
    }
}

/// Unit of an entitlement extension
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Minute,
    Day,
    Month,
    Year,
}

impl DurationUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DurationUnit::Minute => "minute",
            DurationUnit::Day => "day",
            DurationUnit::Month => "month",
            DurationUnit::Year => "year",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the authentication check
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthCheck {
    Checking,
    Authenticated,
    Anonymous,
}

impl AuthCheck {
    #[must_use]
    pub fn is_resolved(self) -> bool {
        !matches!(self, AuthCheck::Checking)
    }
}

/// The current user session
///
/// A session is always replaced as a whole; readers never observe a
/// half-applied update. `role` and `entitlement` only carry meaning once
/// `auth_check` is resolved.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub role: Role,
    pub entitlement: Entitlement,
    pub auth_check: AuthCheck,
    /// `false` when role and entitlement are least-privilege defaults because
    /// the backend lookup failed
    pub enriched: bool,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Initial state before the identity provider has reported anything
    #[must_use]
    pub fn checking() -> Self {
        Self {
            identity: None,
            role: Role::Reader,
            entitlement: Entitlement::none(),
            auth_check: AuthCheck::Checking,
            enriched: false,
            updated_at: Utc::now(),
        }
    }

    /// Identity known, backend lookup outstanding
    #[must_use]
    pub fn checking_for(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::checking()
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            auth_check: AuthCheck::Anonymous,
            ..Self::checking()
        }
    }

    #[must_use]
    pub fn authenticated(identity: Identity, record: &UserRecord) -> Self {
        Self {
            identity: Some(identity),
            role: record.role,
            entitlement: record.entitlement(),
            auth_check: AuthCheck::Authenticated,
            enriched: true,
            updated_at: Utc::now(),
        }
    }

    /// Authenticated, but role and entitlement could not be fetched
    #[must_use]
    pub fn least_privileged(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            role: Role::Reader,
            entitlement: Entitlement::none(),
            auth_check: AuthCheck::Authenticated,
            enriched: false,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.auth_check == AuthCheck::Checking
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_check == AuthCheck::Authenticated && self.identity.is_some()
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.auth_check == AuthCheck::Anonymous
    }

    /// Role, only once the auth check has resolved
    #[must_use]
    pub fn resolved_role(&self) -> Option<Role> {
        self.is_authenticated().then_some(self.role)
    }

    #[must_use]
    pub fn has_premium(&self) -> bool {
        self.is_authenticated() && self.entitlement.is_active_at(Utc::now())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::checking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity() -> Identity {
        Identity {
            uid: "uid-1".to_string(),
            display_name: Some("Jane Q Doe".to_string()),
            email: Some("jane@example.com".to_string()),
            photo_url: None,
            id_token: "token".to_string(),
        }
    }

    #[test]
    fn test_role_parsing_and_serde() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" Premium ".parse::<Role>().unwrap(), Role::Premium);
        assert_eq!("user".parse::<Role>().unwrap(), Role::Reader);
        assert!("owner".parse::<Role>().is_err());

        let json = serde_json::to_string(&Role::Premium).unwrap();
        assert_eq!(json, "\"premium\"");
    }

    #[test]
    fn test_user_record_from_backend_payload() {
        let record: UserRecord =
            serde_json::from_str(r#"{"role":"premium","premiumTaken":true,"name":"x"}"#).unwrap();
        assert_eq!(record.role, Role::Premium);
        assert!(record.premium_taken);
        assert!(record.premium_expires_at.is_none());

        let sparse: UserRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(sparse.role, Role::Reader);
        assert!(!sparse.premium_taken);
    }

    #[test]
    fn test_entitlement_expiry() {
        let now = Utc::now();
        let active = Entitlement {
            premium_taken: true,
            expires_at: Some(now + Duration::days(1)),
        };
        let lapsed = Entitlement {
            premium_taken: true,
            expires_at: Some(now - Duration::minutes(1)),
        };
        assert!(active.is_active_at(now));
        assert!(!lapsed.is_active_at(now));
        assert!(!Entitlement::none().is_active_at(now));
    }

    #[test]
    fn test_session_states() {
        let checking = Session::checking();
        assert!(checking.is_checking());
        assert_eq!(checking.resolved_role(), None);

        let degraded = Session::least_privileged(identity());
        assert!(degraded.is_authenticated());
        assert!(!degraded.enriched);
        assert_eq!(degraded.resolved_role(), Some(Role::Reader));
        assert!(!degraded.has_premium());

        let anonymous = Session::anonymous();
        assert!(anonymous.is_anonymous());
        assert!(anonymous.identity.is_none());
    }

    #[test]
    fn test_billing_name() {
        assert_eq!(identity().billing_name(), "janeqdoe");

        let mut nameless = identity();
        nameless.display_name = None;
        assert_eq!(nameless.billing_name(), "jane@example.com");
    }

    #[test]
    fn test_identity_token_not_serialized() {
        let json = serde_json::to_value(identity()).unwrap();
        assert!(json.get("id_token").is_none());
        assert_eq!(json["uid"], "uid-1");
    }

    #[test]
    fn test_amount_dollars_and_display() {
        let amount = Amount::from_cents(1499);
        assert_eq!(amount.to_string(), "$14.99");
        assert_eq!(serde_json::to_string(&amount).unwrap(), "14.99");

        let parsed: Amount = serde_json::from_str("19.99").unwrap();
        assert_eq!(parsed.cents(), 1999);
        assert!(serde_json::from_str::<Amount>("-1").is_err());
        assert!(Amount::from_cents(0).is_zero());
    }

    #[test]
    fn test_duration_unit_serde() {
        assert_eq!(serde_json::to_string(&DurationUnit::Month).unwrap(), "\"month\"");
        let unit: DurationUnit = serde_json::from_str("\"minute\"").unwrap();
        assert_eq!(unit, DurationUnit::Minute);
    }
}
