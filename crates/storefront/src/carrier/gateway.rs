//! Fulfillment gateway: opens a carrier shipment for an order draft.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use super::auth::{CarrierToken, TokenSource};
use super::client::{CarrierApi, CarrierResponse};
use super::payload::{PackageDefaults, ShipmentPayload};
use super::{CarrierError, FulfillmentError};
use crate::models::{FulfillmentInfo, OrderDraft};

/// Account credentials for the carrier's login exchange.
#[derive(Clone)]
pub struct CarrierCredentials {
    pub email: String,
    pub password: SecretString,
}

impl fmt::Debug for CarrierCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub credentials: CarrierCredentials,
    /// Long-lived token tried before logging in.
    pub static_token: Option<SecretString>,
    /// Carrier-side name of the warehouse parcels are collected from.
    pub pickup_location: String,
    pub package: PackageDefaults,
    /// Upper bound on each individual carrier call.
    pub call_timeout: Duration,
}

/// Outcome of one order-create attempt.
#[derive(Debug)]
pub(crate) enum Attempt {
    Created(FulfillmentInfo),
    AuthRejected,
}

/// Opens carrier shipments, caching the session token between orders.
///
/// Token preference: a cached unexpired token, then the static token (until
/// the carrier rejects it once), then a fresh login. A request rejected for
/// authentication is retried exactly once with a token from a forced login.
pub struct FulfillmentGateway {
    api: Arc<dyn CarrierApi>,
    settings: GatewaySettings,
    token: RwLock<Option<CarrierToken>>,
    static_rejected: AtomicBool,
}

impl FulfillmentGateway {
    #[must_use]
    pub fn new(api: Arc<dyn CarrierApi>, settings: GatewaySettings) -> Self {
        Self {
            api,
            settings,
            token: RwLock::new(None),
            static_rejected: AtomicBool::new(false),
        }
    }

    /// Name of the carrier shipments are opened with.
    #[must_use]
    pub fn carrier_name(&self) -> &str {
        self.api.name()
    }

    /// Open a shipment for `draft`.
    ///
    /// # Errors
    ///
    /// - `AuthFailed` if no token could be obtained, or the carrier rejected
    ///   the token obtained by the forced re-login.
    /// - `Rejected` if the carrier refused the shipment.
    /// - `Protocol`, `Transport`, `Timeout` for unusable or missing responses.
    #[instrument(skip_all, fields(order_id = %draft.id))]
    pub async fn create_shipment(
        &self,
        draft: &OrderDraft,
    ) -> Result<FulfillmentInfo, FulfillmentError> {
        let payload = ShipmentPayload::build(
            draft,
            &self.settings.pickup_location,
            &self.settings.package,
            Utc::now(),
        );

        let token = self.current_token().await?;
        if let Attempt::Created(info) = self.attempt(&token, &payload).await? {
            return Ok(info);
        }

        warn!(source = ?token.source, "Carrier rejected token, re-authenticating");
        if token.source == TokenSource::Static {
            self.static_rejected.store(true, Ordering::Relaxed);
        }

        let fresh = self.login().await?;
        match self.attempt(&fresh, &payload).await? {
            Attempt::Created(info) => Ok(info),
            Attempt::AuthRejected => {
                self.clear_token().await;
                Err(FulfillmentError::AuthFailed(
                    "carrier rejected a freshly issued token".to_string(),
                ))
            }
        }
    }

    /// Drop the cached session token.
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Whether a usable token is cached.
    pub async fn has_valid_token(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_expired())
    }

    async fn current_token(&self) -> Result<CarrierToken, FulfillmentError> {
        if let Some(token) = self.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.clone());
        }

        if !self.static_rejected.load(Ordering::Relaxed)
            && let Some(raw) = &self.settings.static_token
        {
            if let Some(token) = CarrierToken::from_static(raw) {
                *self.token.write().await = Some(token.clone());
                return Ok(token);
            }
            warn!("Configured carrier token is malformed or expired, logging in instead");
        }

        self.login().await
    }

    async fn login(&self) -> Result<CarrierToken, FulfillmentError> {
        let credentials = &self.settings.credentials;
        let raw = self
            .bounded(self.api.login(&credentials.email, &credentials.password))
            .await?;

        let token = CarrierToken::from_login(raw);
        *self.token.write().await = Some(token.clone());
        info!(expires_at = token.expires_at, "Carrier login succeeded");
        Ok(token)
    }

    async fn attempt(
        &self,
        token: &CarrierToken,
        payload: &ShipmentPayload,
    ) -> Result<Attempt, FulfillmentError> {
        let response = self
            .bounded(self.api.create_order(&token.access_token, payload))
            .await?;
        interpret_response(self.api.name(), &response, Utc::now())
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CarrierError>>,
    ) -> Result<T, FulfillmentError> {
        let limit = self.settings.call_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(FulfillmentError::from),
            Err(_) => Err(FulfillmentError::Timeout(limit)),
        }
    }
}

/// Read a carrier identifier, which may arrive as a string or a number.
fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_u64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}

/// Pull a human-readable reason out of a carrier error body.
fn carrier_message(body: &Map<String, Value>) -> Option<String> {
    if let Some(Value::String(message)) = body.get("message")
        && !message.is_empty()
    {
        return Some(message.clone());
    }

    let Some(Value::Object(errors)) = body.get("errors") else {
        return None;
    };
    let parts: Vec<String> = errors
        .iter()
        .map(|(field, detail)| match detail {
            Value::Array(items) => {
                let items: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                format!("{field}: {}", items.join(", "))
            }
            Value::String(s) => format!("{field}: {s}"),
            other => format!("{field}: {other}"),
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

fn parse_object(response: &CarrierResponse) -> Result<Map<String, Value>, FulfillmentError> {
    match serde_json::from_str::<Value>(&response.body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(FulfillmentError::Protocol(format!(
            "HTTP {}: expected a JSON object",
            response.status
        ))),
        Err(e) => Err(FulfillmentError::Protocol(format!(
            "HTTP {}: body is not JSON ({e})",
            response.status
        ))),
    }
}

/// Decide what a carrier order-create response means.
pub(crate) fn interpret_response(
    carrier: &str,
    response: &CarrierResponse,
    now: DateTime<Utc>,
) -> Result<Attempt, FulfillmentError> {
    let status = response.status;

    if status == 401 || status == 403 {
        return Ok(Attempt::AuthRejected);
    }

    let body = parse_object(response)?;

    if !(200..300).contains(&status) {
        return Err(FulfillmentError::Rejected {
            status,
            message: carrier_message(&body).unwrap_or_else(|| format!("HTTP {status}")),
        });
    }

    let carrier_order_id = identifier(body.get("order_id"));
    let shipment_id = identifier(body.get("shipment_id"));

    if carrier_order_id.is_none() && shipment_id.is_none() {
        return Err(FulfillmentError::Rejected {
            status,
            message: carrier_message(&body)
                .unwrap_or_else(|| "response carried no order or shipment id".to_string()),
        });
    }

    Ok(Attempt::Created(FulfillmentInfo {
        carrier: carrier.to_string(),
        carrier_order_id,
        shipment_id,
        carrier_status: body.get("status").and_then(Value::as_str).map(str::to_string),
        opened_at: now,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use marigold_core::{Email, OrderId, PaymentMethod, Phone, ProductId};
    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::models::{Buyer, LineItem, ShippingAddress, Variant};

    fn response(status: u16, body: &str) -> CarrierResponse {
        CarrierResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_interpret_success() {
        let r = response(200, r#"{"order_id": 123, "shipment_id": 456, "status": "NEW"}"#);
        let Attempt::Created(info) = interpret_response("test", &r, Utc::now()).unwrap() else {
            panic!("expected created");
        };
        assert_eq!(info.carrier_order_id.as_deref(), Some("123"));
        assert_eq!(info.shipment_id.as_deref(), Some("456"));
        assert_eq!(info.carrier_status.as_deref(), Some("NEW"));
    }

    #[test]
    fn test_interpret_success_without_ids_is_rejection() {
        let r = response(200, r#"{"message": "Wrong Pickup location entered."}"#);
        let err = interpret_response("test", &r, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::Rejected { status: 200, ref message } if message == "Wrong Pickup location entered."
        ));

        let r = response(200, r#"{"order_id": 0, "shipment_id": ""}"#);
        assert!(matches!(
            interpret_response("test", &r, Utc::now()),
            Err(FulfillmentError::Rejected { .. })
        ));
    }

    #[test]
    fn test_interpret_auth_statuses() {
        for status in [401, 403] {
            let r = response(status, "Unauthorized");
            assert!(matches!(
                interpret_response("test", &r, Utc::now()),
                Ok(Attempt::AuthRejected)
            ));
        }
    }

    #[test]
    fn test_interpret_validation_errors() {
        let r = response(
            422,
            r#"{"message": "", "errors": {"billing_pincode": ["The billing pincode must be 6 digits."]}}"#,
        );
        let err = interpret_response("test", &r, Utc::now()).unwrap_err();
        let FulfillmentError::Rejected { status, message } = err else {
            panic!("expected rejection");
        };
        assert_eq!(status, 422);
        assert_eq!(message, "billing_pincode: The billing pincode must be 6 digits.");
    }

    #[test]
    fn test_interpret_non_json() {
        let r = response(200, "<html>gateway error</html>");
        assert!(matches!(
            interpret_response("test", &r, Utc::now()),
            Err(FulfillmentError::Protocol(_))
        ));

        let r = response(502, "Bad Gateway");
        assert!(matches!(
            interpret_response("test", &r, Utc::now()),
            Err(FulfillmentError::Protocol(_))
        ));
    }

    // Scripted carrier: each create_order call pops the next status; tokens
    // issued by login are "login-1", "login-2", ...
    struct ScriptedCarrier {
        statuses: Mutex<VecDeque<u16>>,
        logins: Mutex<u32>,
        login_fails: bool,
        tokens_seen: Mutex<Vec<String>>,
    }

    impl ScriptedCarrier {
        fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                logins: Mutex::new(0),
                login_fails: false,
                tokens_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CarrierApi for ScriptedCarrier {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn login(
            &self,
            _email: &str,
            _password: &SecretString,
        ) -> Result<SecretString, CarrierError> {
            if self.login_fails {
                return Err(CarrierError::AuthenticationFailed("bad password".to_string()));
            }
            let mut logins = self.logins.lock().unwrap();
            *logins += 1;
            Ok(SecretString::from(format!("login-{logins}")))
        }

        async fn create_order(
            &self,
            token: &SecretString,
            _payload: &ShipmentPayload,
        ) -> Result<CarrierResponse, CarrierError> {
            self.tokens_seen
                .lock()
                .unwrap()
                .push(token.expose_secret().to_string());
            let status = self.statuses.lock().unwrap().pop_front().unwrap_or(500);
            Ok(if status == 200 {
                response(200, r#"{"order_id": 1, "shipment_id": 2}"#)
            } else {
                response(status, r#"{"message": "denied"}"#)
            })
        }
    }

    fn static_jwt() -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"store"}"#);
        format!("{header}.{claims}.sig")
    }

    fn settings(static_token: Option<String>) -> GatewaySettings {
        GatewaySettings {
            credentials: CarrierCredentials {
                email: "ops@example.com".to_string(),
                password: SecretString::from("hunter2"),
            },
            static_token: static_token.map(SecretString::from),
            pickup_location: "Primary".to_string(),
            package: PackageDefaults::default(),
            call_timeout: Duration::from_secs(5),
        }
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            id: OrderId::generate(),
            buyer: Buyer {
                name: "Ravi Kumar".to_string(),
                email: Email::parse("ravi@example.com").unwrap(),
                phone: Phone::parse("9123456780").unwrap(),
            },
            shipping_address: ShippingAddress {
                line1: "1 Park Street".to_string(),
                line2: None,
                city: "Kolkata".to_string(),
                state: "West Bengal".to_string(),
                postal_code: "700016".to_string(),
                country: "India".to_string(),
            },
            line_items: vec![LineItem {
                product_id: ProductId::new(1),
                name: "Tee".to_string(),
                unit_price: Decimal::from(500),
                quantity: 1,
                variant: Variant::default(),
                image: None,
            }],
            subtotal: Decimal::from(500),
            charges: vec![],
            additional_amount: Decimal::ZERO,
            total: Decimal::from(500),
            payment_method: PaymentMethod::Deferred,
            payment_reference: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_static_token_used_first() {
        let carrier = Arc::new(ScriptedCarrier::new(&[200]));
        let gateway = FulfillmentGateway::new(carrier.clone(), settings(Some(static_jwt())));

        let info = gateway.create_shipment(&draft()).await.unwrap();
        assert_eq!(info.carrier, "scripted");
        assert_eq!(*carrier.logins.lock().unwrap(), 0);
        assert_eq!(*carrier.tokens_seen.lock().unwrap(), vec![static_jwt()]);
    }

    #[tokio::test]
    async fn test_rejected_static_token_retries_with_fresh_login() {
        let carrier = Arc::new(ScriptedCarrier::new(&[401, 200, 200]));
        let gateway = FulfillmentGateway::new(carrier.clone(), settings(Some(static_jwt())));

        gateway.create_shipment(&draft()).await.unwrap();
        assert_eq!(
            *carrier.tokens_seen.lock().unwrap(),
            vec![static_jwt(), "login-1".to_string()]
        );

        // The static token is not tried again once rejected.
        gateway.create_shipment(&draft()).await.unwrap();
        assert_eq!(carrier.tokens_seen.lock().unwrap().last().unwrap(), "login-1");
        assert_eq!(*carrier.logins.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_rejection_is_auth_failure() {
        let carrier = Arc::new(ScriptedCarrier::new(&[403, 403, 200]));
        let gateway = FulfillmentGateway::new(carrier.clone(), settings(None));

        let err = gateway.create_shipment(&draft()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::AuthFailed(_)));
        assert_eq!(carrier.tokens_seen.lock().unwrap().len(), 2);
        assert!(!gateway.has_valid_token().await);
    }

    #[tokio::test]
    async fn test_login_failure_is_auth_failure() {
        let mut carrier = ScriptedCarrier::new(&[200]);
        carrier.login_fails = true;
        let carrier = Arc::new(carrier);
        let gateway = FulfillmentGateway::new(carrier.clone(), settings(None));

        let err = gateway.create_shipment(&draft()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::AuthFailed(ref m) if m == "bad password"));
        assert!(carrier.tokens_seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_static_token_falls_back_to_login() {
        let carrier = Arc::new(ScriptedCarrier::new(&[200]));
        let gateway =
            FulfillmentGateway::new(carrier.clone(), settings(Some("not-a-jwt".to_string())));

        gateway.create_shipment(&draft()).await.unwrap();
        assert_eq!(*carrier.tokens_seen.lock().unwrap(), vec!["login-1".to_string()]);
    }

    #[tokio::test]
    async fn test_business_rejection_is_not_retried() {
        let carrier = Arc::new(ScriptedCarrier::new(&[422, 200]));
        let gateway = FulfillmentGateway::new(carrier.clone(), settings(None));

        let err = gateway.create_shipment(&draft()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::Rejected { status: 422, .. }));
        assert_eq!(carrier.tokens_seen.lock().unwrap().len(), 1);
    }
}
