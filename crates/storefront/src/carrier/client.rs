//! Carrier HTTP client.
//!
//! [`CarrierApi`] is the seam the fulfillment gateway talks through. The
//! client does not interpret order-create responses beyond capturing status
//! and body; deciding what a response means is the gateway's job.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use super::CarrierError;
use super::auth::{LoginErrorResponse, LoginRequest, LoginResponse};
use super::payload::ShipmentPayload;

const LOGIN_PATH: &str = "v1/external/auth/login";
const CREATE_ORDER_PATH: &str = "v1/external/orders/create/adhoc";

/// Raw response from the carrier's order-create endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierResponse {
    pub status: u16,
    pub body: String,
}

/// Operations the fulfillment gateway needs from a carrier.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// Carrier name recorded on fulfilled orders.
    fn name(&self) -> &str;

    /// Exchange account credentials for a session token.
    ///
    /// # Errors
    ///
    /// Returns `CarrierError::AuthenticationFailed` if the carrier refuses the
    /// credentials, `CarrierError::Http` if the carrier cannot be reached.
    async fn login(&self, email: &str, password: &SecretString)
    -> Result<SecretString, CarrierError>;

    /// Submit a shipment. Any HTTP status is returned as a response.
    ///
    /// # Errors
    ///
    /// Returns `CarrierError::Http` if no response was received.
    async fn create_order(
        &self,
        token: &SecretString,
        payload: &ShipmentPayload,
    ) -> Result<CarrierResponse, CarrierError>;
}

/// `reqwest`-backed carrier client.
#[derive(Clone)]
pub struct HttpCarrierClient {
    client: reqwest::Client,
    login_url: Url,
    create_order_url: Url,
}

impl HttpCarrierClient {
    /// Create a client for the carrier API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `CarrierError::Protocol` if the endpoint URLs cannot be built,
    /// `CarrierError::Http` if the HTTP client cannot be created.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, CarrierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|e| CarrierError::Protocol(format!("invalid carrier URL: {e}")))
        };

        Ok(Self {
            client,
            login_url: join(LOGIN_PATH)?,
            create_order_url: join(CREATE_ORDER_PATH)?,
        })
    }
}

#[async_trait]
impl CarrierApi for HttpCarrierClient {
    fn name(&self) -> &str {
        "shiprocket"
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SecretString, CarrierError> {
        let response = self
            .client
            .post(self.login_url.clone())
            .json(&LoginRequest {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            let login: LoginResponse = serde_json::from_str(&body)
                .map_err(|e| CarrierError::Protocol(format!("login response: {e}")))?;
            if login.token.is_empty() {
                return Err(CarrierError::Protocol(
                    "login response carried an empty token".to_string(),
                ));
            }
            Ok(SecretString::from(login.token))
        } else if status.is_client_error() {
            let error_response: LoginErrorResponse =
                response.json().await.unwrap_or(LoginErrorResponse {
                    message: None,
                    error: None,
                });

            let message = error_response
                .message
                .or(error_response.error)
                .unwrap_or_else(|| "Invalid credentials".to_string());

            Err(CarrierError::AuthenticationFailed(message))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(CarrierError::AuthenticationFailed(format!(
                "HTTP {status}: {error_text}"
            )))
        }
    }

    #[instrument(skip(self, token, payload), fields(order_id = %payload.order_id))]
    async fn create_order(
        &self,
        token: &SecretString,
        payload: &ShipmentPayload,
    ) -> Result<CarrierResponse, CarrierError> {
        let response = self
            .client
            .post(self.create_order_url.clone())
            .bearer_auth(token.expose_secret())
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(CarrierResponse { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls_join_base() {
        let base = Url::parse("https://carrier.test/").unwrap();
        let client = HttpCarrierClient::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.login_url.as_str(),
            "https://carrier.test/v1/external/auth/login"
        );
        assert_eq!(
            client.create_order_url.as_str(),
            "https://carrier.test/v1/external/orders/create/adhoc"
        );
    }

    #[test]
    fn test_endpoint_urls_keep_base_path() {
        let base = Url::parse("https://gateway.test/carrier/").unwrap();
        let client = HttpCarrierClient::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.login_url.as_str(),
            "https://gateway.test/carrier/v1/external/auth/login"
        );
    }
}
