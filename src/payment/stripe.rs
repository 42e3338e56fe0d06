use super::{
    CardDetails, ConfirmDetails, PaymentError, PaymentIntent, PaymentMethod, PaymentProcessor,
};
use crate::settings::PaymentSettings;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ProcessorError,
}

#[derive(Deserialize)]
struct ProcessorError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

/// Card-payment REST client authenticated with a publishable key
#[derive(Clone)]
pub struct StripeProcessor {
    client: Client,
    api_base: String,
    publishable_key: String,
}

impl StripeProcessor {
    /// Build a processor client from payment settings
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Configuration`] if no publishable key is
    /// configured or the API base is not a valid URL
    pub fn new(settings: &PaymentSettings) -> Result<Self, PaymentError> {
        let publishable_key = settings.get_publishable_key().ok_or_else(|| {
            PaymentError::Configuration("no publishable key configured".to_string())
        })?;
        Self::with_key(&settings.api_base, &publishable_key)
    }

    /// # Errors
    ///
    /// Returns [`PaymentError::Configuration`] for an invalid API base URL
    pub fn with_key(api_base: &str, publishable_key: &str) -> Result<Self, PaymentError> {
        url::Url::parse(api_base).map_err(|e| {
            PaymentError::Configuration(format!("invalid payment API base '{api_base}': {e}"))
        })?;

        Ok(Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/{}", self.api_base, path.trim_start_matches('/')))
            .bearer_auth(&self.publishable_key)
    }

    async fn send<T: for<'de> Deserialize<'de>>(request: RequestBuilder) -> Result<T, PaymentError> {
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::Processor(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PaymentError::Processor(format!("unexpected response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &body))
    }
}

/// Map an error body to a card error (user-facing) or a processor error
fn classify_error(status: u16, body: &str) -> PaymentError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.kind == "card_error" => PaymentError::Card(
            envelope
                .error
                .message
                .unwrap_or_else(|| "Your card was declined.".to_string()),
        ),
        Ok(envelope) => PaymentError::Processor(format!(
            "HTTP {status} {}: {}",
            envelope.error.kind,
            envelope.error.message.unwrap_or_default()
        )),
        Err(_) => PaymentError::Processor(format!("HTTP {status}: {body}")),
    }
}

/// Intent id embedded in a client secret (`pi_123_secret_abc` -> `pi_123`)
#[must_use]
pub fn intent_id_from_secret(client_secret: &str) -> Option<&str> {
    client_secret
        .split_once("_secret_")
        .map(|(id, _)| id)
        .filter(|id| !id.is_empty())
}

fn card_form(card: &CardDetails) -> Vec<(&'static str, String)> {
    vec![
        ("type", "card".to_string()),
        ("card[number]", card.number.clone()),
        ("card[exp_month]", card.exp_month.to_string()),
        ("card[exp_year]", card.exp_year.to_string()),
        ("card[cvc]", card.cvc.clone()),
    ]
}

fn confirm_form(client_secret: &str, details: &ConfirmDetails) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("client_secret", client_secret.to_string()),
        ("payment_method", details.payment_method.id.clone()),
        (
            "payment_method_data[billing_details][name]",
            details.billing_details.name.clone(),
        ),
    ];
    if let Some(email) = details.billing_details.email.as_ref() {
        form.push((
            "payment_method_data[billing_details][email]",
            email.clone(),
        ));
    }
    form
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_payment_method(
        &self,
        card: &CardDetails,
    ) -> Result<PaymentMethod, PaymentError> {
        log::debug!("Creating payment method for {card:?}");
        Self::send(self.post("/payment_methods").form(&card_form(card))).await
    }

    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        details: &ConfirmDetails,
    ) -> Result<PaymentIntent, PaymentError> {
        let intent_id = intent_id_from_secret(client_secret).ok_or_else(|| {
            PaymentError::Processor("malformed payment intent client secret".to_string())
        })?;

        Self::send(
            self.post(&format!("/payment_intents/{intent_id}/confirm"))
                .form(&confirm_form(client_secret, details)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::BillingDetails;

    #[test]
    fn test_intent_id_from_secret() {
        assert_eq!(intent_id_from_secret("pi_123_secret_abc"), Some("pi_123"));
        assert_eq!(intent_id_from_secret("pi_123"), None);
        assert_eq!(intent_id_from_secret("_secret_abc"), None);
    }

    #[test]
    fn test_card_errors_are_user_facing() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card has insufficient funds."}}"#;
        let err = classify_error(402, body);
        assert!(matches!(err, PaymentError::Card(_)));
        assert_eq!(err.user_message(), "Your card has insufficient funds.");
    }

    #[test]
    fn test_other_errors_are_processor_errors() {
        let err = classify_error(401, r#"{"error":{"type":"invalid_request_error","message":"Invalid API Key"}}"#);
        assert!(matches!(err, PaymentError::Processor(_)));
        assert!(!err.user_message().contains("API Key"));

        let err = classify_error(502, "<html>bad gateway</html>");
        assert!(matches!(err, PaymentError::Processor(_)));
    }

    #[test]
    fn test_confirm_form_carries_billing_details() {
        let details = ConfirmDetails {
            payment_method: PaymentMethod {
                id: "pm_1".to_string(),
            },
            billing_details: BillingDetails {
                name: "janedoe".to_string(),
                email: Some("jane@example.com".to_string()),
            },
        };
        let form = confirm_form("pi_1_secret_x", &details);
        assert!(form.contains(&("payment_method", "pm_1".to_string())));
        assert!(form.contains(&(
            "payment_method_data[billing_details][email]",
            "jane@example.com".to_string()
        )));
    }

    #[test]
    fn test_missing_publishable_key_is_configuration_error() {
        let settings = PaymentSettings {
            publishable_key: None,
            publishable_key_env: None,
            ..PaymentSettings::default()
        };
        assert!(matches!(
            StripeProcessor::new(&settings),
            Err(PaymentError::Configuration(_))
        ));
    }
}
