//! Email/password identity provider over a REST identity toolkit
//!
//! Speaks the `accounts:signInWithPassword` / `accounts:signUp` /
//! `accounts:update` endpoints keyed by a project API key.

use super::IdentityProvider;
use crate::models::auth::AuthenticationError;
use crate::models::Identity;
use crate::settings::IdentitySettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    profile_picture: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Provider error codes that mean "the user got something wrong"
const REJECTION_CODES: &[&str] = &[
    "EMAIL_NOT_FOUND",
    "INVALID_PASSWORD",
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_EMAIL",
    "MISSING_PASSWORD",
    "USER_DISABLED",
    "EMAIL_EXISTS",
    "WEAK_PASSWORD",
];

/// REST-backed [`IdentityProvider`]
pub struct PasswordIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
    current: watch::Sender<Option<Identity>>,
}

impl PasswordIdentityProvider {
    /// Build a provider from settings
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::Configuration`] if no API key is configured
    pub fn new(settings: &IdentitySettings) -> Result<Self, AuthenticationError> {
        let api_key = settings.get_api_key().ok_or_else(|| {
            AuthenticationError::Configuration("identity API key is not configured".to_string())
        })?;
        Ok(Self::with_key(&settings.base_url, &api_key))
    }

    #[must_use]
    pub fn with_key(base_url: &str, api_key: &str) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            current,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/accounts:{action}?key={}",
            self.base_url,
            urlencoding::encode(&self.api_key)
        )
    }

    async fn post<B: Serialize + Sync>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<AccountResponse, AuthenticationError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthenticationError::ProviderUnavailable(e.to_string()))?;

        if response.status().is_success() {
            return response
                .json::<AccountResponse>()
                .await
                .map_err(|e| AuthenticationError::ProviderUnavailable(e.to_string()));
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text))
    }

    /// Publish a signed-in identity to subscribers
    fn publish(&self, identity: &Identity) {
        self.current.send_replace(Some(identity.clone()));
    }
}

/// Map a provider error response onto the authentication taxonomy
fn classify_error(status: u16, body: &str) -> AuthenticationError {
    let code = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_default();

    // Codes may carry a detail suffix, e.g. "WEAK_PASSWORD : Password should be ..."
    let head = code.split([' ', ':']).next().unwrap_or_default();
    if REJECTION_CODES.contains(&head) || head.starts_with("TOO_MANY_ATTEMPTS") {
        AuthenticationError::Rejected(code)
    } else if status == 400 && head == "API_KEY_INVALID" {
        AuthenticationError::Configuration(code)
    } else {
        AuthenticationError::ProviderUnavailable(format!("HTTP {status}: {code}"))
    }
}

fn into_identity(account: AccountResponse) -> Result<Identity, AuthenticationError> {
    let id_token = account.id_token.ok_or_else(|| {
        AuthenticationError::ProviderUnavailable("response carried no id token".to_string())
    })?;
    Ok(Identity {
        uid: account.local_id,
        display_name: account.display_name.filter(|name| !name.is_empty()),
        email: account.email,
        photo_url: account.profile_picture,
        id_token,
    })
}

#[async_trait]
impl IdentityProvider for PasswordIdentityProvider {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    async fn credential(&self, identity: &Identity) -> Result<String, AuthenticationError> {
        match self.current.borrow().as_ref() {
            Some(current) if current.uid == identity.uid => Ok(current.id_token.clone()),
            _ => Err(AuthenticationError::NotSignedIn),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthenticationError> {
        let account = self
            .post(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        let identity = into_identity(account)?;
        log::info!("Identity provider signed in user {}", identity.uid);
        self.publish(&identity);
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthenticationError> {
        let account = self
            .post(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        let mut identity = into_identity(account)?;

        if let Some(name) = display_name.filter(|name| !name.trim().is_empty()) {
            let request = ProfileUpdateRequest {
                id_token: &identity.id_token,
                display_name: name,
                return_secure_token: true,
            };
            match self.post("update", &request).await {
                Ok(updated) => {
                    identity.display_name = updated.display_name.or(Some(name.to_string()));
                    if let Some(token) = updated.id_token {
                        identity.id_token = token;
                    }
                }
                // The account exists; a missing display name is cosmetic
                Err(e) => log::warn!("Failed to set display name for {}: {e}", identity.uid),
            }
        }

        log::info!("Identity provider registered user {}", identity.uid);
        self.publish(&identity);
        Ok(identity)
    }

    async fn sign_out(&self, identity: &Identity) -> Result<(), AuthenticationError> {
        let signed_in = self
            .current
            .borrow()
            .as_ref()
            .is_some_and(|current| current.uid == identity.uid);
        if !signed_in {
            return Err(AuthenticationError::NotSignedIn);
        }
        self.current.send_replace(None);
        log::info!("Identity provider signed out user {}", identity.uid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_classified() {
        let body = r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS"}}"#;
        assert!(matches!(
            classify_error(400, body),
            AuthenticationError::Rejected(_)
        ));

        let weak = r#"{"error":{"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        assert!(matches!(
            classify_error(400, weak),
            AuthenticationError::Rejected(_)
        ));

        let key = r#"{"error":{"message":"API_KEY_INVALID"}}"#;
        assert!(matches!(
            classify_error(400, key),
            AuthenticationError::Configuration(_)
        ));

        assert!(matches!(
            classify_error(503, "upstream down"),
            AuthenticationError::ProviderUnavailable(_)
        ));
    }

    #[test]
    fn test_account_response_to_identity() {
        let account: AccountResponse = serde_json::from_str(
            r#"{"localId":"u1","email":"a@b.c","displayName":"","idToken":"tok"}"#,
        )
        .unwrap();
        let identity = into_identity(account).unwrap();
        assert_eq!(identity.uid, "u1");
        assert_eq!(identity.display_name, None);
        assert_eq!(identity.id_token, "tok");
    }

    #[tokio::test]
    async fn test_subscribe_sees_current_state_and_sign_out() {
        let provider = PasswordIdentityProvider::with_key("http://127.0.0.1:9", "key");
        let rx = provider.subscribe();
        assert!(rx.borrow().is_none());

        let identity = Identity {
            uid: "u1".to_string(),
            display_name: None,
            email: None,
            photo_url: None,
            id_token: "tok".to_string(),
        };
        provider.publish(&identity);

        let late = provider.subscribe();
        assert_eq!(late.borrow().as_ref().map(|i| i.uid.as_str()), Some("u1"));
        assert_eq!(provider.credential(&identity).await.unwrap(), "tok");

        provider.sign_out(&identity).await.unwrap();
        assert!(provider.subscribe().borrow().is_none());
        assert!(matches!(
            provider.credential(&identity).await,
            Err(AuthenticationError::NotSignedIn)
        ));
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let settings = IdentitySettings {
            api_key: None,
            api_key_env: None,
            ..IdentitySettings::default()
        };
        assert!(matches!(
            PasswordIdentityProvider::new(&settings),
            Err(AuthenticationError::Configuration(_))
        ));
    }
}
