//! Buyer notifications.
//!
//! Notifications are best-effort. The order pipeline dispatches them on a
//! background task after the order is stored; a failed or slow send is
//! logged and never changes the checkout result.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marigold_core::{Email, Phone};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Klaviyo API version.
const API_REVISION: &str = "2024-10-15";

/// Klaviyo API base URL.
const BASE_URL: &str = "https://a.klaviyo.com/api";

/// Errors from a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Channel could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The channel did not answer in time.
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

/// Messages the pipeline sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    VerificationCode,
    OrderConfirmation,
}

impl NotificationTemplate {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerificationCode => "verification_code",
            Self::OrderConfirmation => "order_confirmation",
        }
    }

    /// Klaviyo metric that triggers the matching flow.
    #[must_use]
    pub const fn metric_name(self) -> &'static str {
        match self {
            Self::VerificationCode => "Verification Code Requested",
            Self::OrderConfirmation => "Order Confirmation",
        }
    }
}

impl fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a notification goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Email(Email),
    Phone(Phone),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email(email) => write!(f, "{email}"),
            Self::Phone(phone) => write!(f, "{phone}"),
        }
    }
}

/// An outbound message channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `template` to `recipient` with template `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel did not accept the message.
    async fn send(
        &self,
        template: NotificationTemplate,
        recipient: &Recipient,
        data: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Sends notifications as Klaviyo events; flows attached to each metric
/// render and deliver the message.
#[derive(Clone)]
pub struct KlaviyoNotifier {
    client: reqwest::Client,
}

impl KlaviyoNotifier {
    /// Create a Klaviyo notifier.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(api_key: &SecretString, timeout: Duration) -> Result<Self, NotifyError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Klaviyo-API-Key {}", api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| NotifyError::Config(format!("Invalid API key format: {e}")))?,
        );
        headers.insert("revision", HeaderValue::from_static(API_REVISION));
        headers.insert(
            "Content-Type",
            HeaderValue::from_static("application/vnd.api+json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

/// JSON:API body for Klaviyo's create-event endpoint.
fn event_body(
    template: NotificationTemplate,
    recipient: &Recipient,
    data: serde_json::Value,
) -> serde_json::Value {
    let profile = match recipient {
        Recipient::Email(email) => serde_json::json!({ "email": email.as_str() }),
        Recipient::Phone(phone) => serde_json::json!({ "phone_number": format!("+{}", phone.key()) }),
    };

    serde_json::json!({
        "data": {
            "type": "event",
            "attributes": {
                "properties": data,
                "metric": {
                    "data": {
                        "type": "metric",
                        "attributes": { "name": template.metric_name() }
                    }
                },
                "profile": {
                    "data": { "type": "profile", "attributes": profile }
                }
            }
        }
    })
}

#[async_trait]
impl Notifier for KlaviyoNotifier {
    #[instrument(skip(self, data), fields(template = %template))]
    async fn send(
        &self,
        template: NotificationTemplate,
        recipient: &Recipient,
        data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let url = format!("{BASE_URL}/events");
        let response = self
            .client
            .post(&url)
            .json(&event_body(template, recipient, data))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Writes notifications to the log. Used when no channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        template: NotificationTemplate,
        recipient: &Recipient,
        data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let data = redacted(template, data);
        info!(%template, %recipient, %data, "Notification (no channel configured)");
        Ok(())
    }
}

/// `data` with one-time codes masked, for logging.
fn redacted(template: NotificationTemplate, mut data: serde_json::Value) -> serde_json::Value {
    if template == NotificationTemplate::VerificationCode
        && let Some(code) = data.get_mut("code")
    {
        *code = serde_json::Value::String("[REDACTED]".to_string());
    }
    data
}

/// Sends notifications with a bounded wait.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Send and wait for the channel to accept the message.
    ///
    /// # Errors
    ///
    /// Returns the channel's error, or `NotifyError::Timeout`.
    pub async fn send_now(
        &self,
        template: NotificationTemplate,
        recipient: &Recipient,
        data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        match tokio::time::timeout(self.timeout, self.notifier.send(template, recipient, data))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.timeout)),
        }
    }

    /// Send on a background task. Failures are logged and discarded.
    pub fn dispatch(
        &self,
        template: NotificationTemplate,
        recipient: Recipient,
        data: serde_json::Value,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.send_now(template, &recipient, data).await {
                warn!(%template, error = %e, "Notification failed");
            }
        })
    }
}
