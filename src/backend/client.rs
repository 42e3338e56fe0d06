use super::{Backend, BackendError};
use crate::models::{Amount, DurationUnit, Identity, UserRecord};
use crate::settings::BackendSettings;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("newsgate/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct UserDataResponse {
    user: UserRecord,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: Option<&'a str>,
    email: Option<&'a str>,
    image: Option<&'a str>,
    uid: &'a str,
}

#[derive(Serialize)]
struct SubscriptionRequest {
    amount: Amount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    client_secret: String,
}

#[derive(Serialize)]
struct PremiumRequest {
    duration: u32,
    unit: DurationUnit,
}

/// reqwest-based [`Backend`] implementation
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client from backend settings
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not a valid absolute URL or the
    /// HTTP client cannot be constructed
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        url::Url::parse(&settings.base_url).map_err(|e| {
            BackendError::Configuration(format!("invalid base URL '{}': {e}", settings.base_url))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the full URL for an API path
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .bearer_auth(bearer)
    }

    /// Send a request and turn non-success statuses into errors
    async fn send(request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_user_data(&self, bearer: &str) -> Result<UserRecord, BackendError> {
        let response = Self::send(self.request(Method::GET, "/users/user-data", bearer)).await?;
        let payload: UserDataResponse = Self::decode(response).await?;
        Ok(payload.user)
    }

    async fn exchange_token(&self, identity_token: &str) -> Result<String, BackendError> {
        let request = self
            .request(Method::POST, "/auth", identity_token)
            .json(&serde_json::json!({}));
        let response = Self::send(request).await?;
        let payload: TokenResponse = Self::decode(response).await?;
        Ok(payload.token)
    }

    async fn register_user(&self, identity: &Identity) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.endpoint("/users/register"))
            .json(&RegisterRequest {
                name: identity.display_name.as_deref(),
                email: identity.email.as_deref(),
                image: identity.photo_url.as_deref(),
                uid: &identity.uid,
            });
        Self::send(request).await.map(|_| ())
    }

    async fn create_payment_intent(
        &self,
        bearer: &str,
        amount: Amount,
    ) -> Result<String, BackendError> {
        let request = self
            .request(Method::POST, "/users/subscription", bearer)
            .json(&SubscriptionRequest { amount });
        let response = Self::send(request).await?;
        let payload: SubscriptionResponse = Self::decode(response).await?;
        Ok(payload.client_secret)
    }

    async fn extend_premium(
        &self,
        bearer: &str,
        duration: u32,
        unit: DurationUnit,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, "/users/premium", bearer)
            .json(&PremiumRequest { duration, unit });
        Self::send(request).await.map(|_| ())
    }

    async fn record_last_login(&self, bearer: &str, uid: &str) -> Result<(), BackendError> {
        let path = format!("/users/{}/last-login", urlencoding::encode(uid));
        Self::send(self.request(Method::PATCH, &path, bearer))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        let backend = HttpBackend::new(&BackendSettings {
            base_url: "http://localhost:3000/web/api/".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();

        assert_eq!(
            backend.endpoint("/users/user-data"),
            "http://localhost:3000/web/api/users/user-data"
        );
        assert_eq!(
            backend.endpoint("users/premium"),
            "http://localhost:3000/web/api/users/premium"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpBackend::new(&BackendSettings {
            base_url: "not a url".to_string(),
            timeout_seconds: 5,
        });
        assert!(matches!(result, Err(BackendError::Configuration(_))));
    }

    #[test]
    fn test_request_payload_shapes() {
        let subscription = serde_json::to_value(SubscriptionRequest {
            amount: Amount::from_cents(1499),
        })
        .unwrap();
        assert_eq!(subscription, serde_json::json!({ "amount": 14.99 }));

        let premium = serde_json::to_value(PremiumRequest {
            duration: 1,
            unit: DurationUnit::Month,
        })
        .unwrap();
        assert_eq!(premium, serde_json::json!({ "duration": 1, "unit": "month" }));

        let user: UserDataResponse =
            serde_json::from_str(r#"{"user":{"role":"admin","premiumTaken":false}}"#).unwrap();
        assert_eq!(user.user.role, crate::models::Role::Admin);

        let secret: SubscriptionResponse =
            serde_json::from_str(r#"{"clientSecret":"pi_1_secret_2"}"#).unwrap();
        assert_eq!(secret.client_secret, "pi_1_secret_2");
    }
}
