//! Payment processor contract
//!
//! Card data only ever travels between the client and the processor. The
//! backend creates the payment intent and hands back its client secret; the
//! processor confirms it and reports a status, which is the sole success
//! signal of the upgrade flow.

pub mod stripe;

pub use stripe::StripeProcessor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors reported by the payment processor
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// The processor declined or rejected the card; the message is user-facing
    #[error("card rejected: {0}")]
    Card(String),
    /// The processor could not be reached or answered unexpectedly
    #[error("payment processor unavailable: {0}")]
    Processor(String),
    /// No publishable key or otherwise unusable processor configuration
    #[error("payment processor misconfigured: {0}")]
    Configuration(String),
}

impl PaymentError {
    /// Text to show inline in the checkout form
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Card(message) => message.clone(),
            PaymentError::Processor(_) | PaymentError::Configuration(_) => {
                "Payment could not be processed. Please try again.".to_string()
            }
        }
    }
}

/// Raw card fields as entered in the checkout form
#[derive(Clone, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last4 = self
            .number
            .get(self.number.len().saturating_sub(4)..)
            .unwrap_or_default();
        f.debug_struct("CardDetails")
            .field("number", &format_args!("**** {last4}"))
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"***")
            .finish()
    }
}

/// Tokenised card returned by the processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
}

/// Billing details attached at confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: Option<String>,
}

/// Confirmation request for one client secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDetails {
    pub payment_method: PaymentMethod,
    pub billing_details: BillingDetails,
}

/// Processor-side status of a payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl PaymentIntentStatus {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == PaymentIntentStatus::Succeeded
    }

    /// Text shown when a confirmation ends in this non-success status
    #[must_use]
    pub fn failure_message(self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresAction => {
                "Your bank requires additional verification, which is not supported. Please use another card."
            }
            PaymentIntentStatus::Processing => {
                "Your payment is still processing. Please check back before trying again."
            }
            PaymentIntentStatus::Canceled => "The payment was canceled.",
            _ => "Payment failed. Please try again.",
        }
    }
}

/// Result of a confirmation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: PaymentIntentStatus,
}

/// Client-side payment processor operations
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Tokenise card details
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Card`] for invalid card data and
    /// [`PaymentError::Processor`] when the processor is unavailable
    async fn create_payment_method(&self, card: &CardDetails)
        -> Result<PaymentMethod, PaymentError>;

    /// Confirm the intent behind `client_secret`
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Card`] when the processor declines the payment
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        details: &ConfirmDetails,
    ) -> Result<PaymentIntent, PaymentError>;
}
