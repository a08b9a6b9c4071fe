//! Razorpay order creation and checkout signature verification.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// An order as returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> &str;

    /// `amount` is in the smallest currency unit (paise).
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError>;

    /// Checks the signature the checkout widget returned for a payment.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(key_id: String, key_secret: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            key_id,
            key_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let resp = self
            .client
            .post("https://api.razorpay.com/v1/orders")
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Payment gateway unreachable: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Razorpay order creation failed ({}): {}", status, body);
            return Err(AppError::Upstream(
                "Payment gateway rejected the order".to_string(),
            ));
        }

        resp.json::<GatewayOrder>()
            .await
            .map_err(|e| AppError::Upstream(format!("Payment gateway response unreadable: {}", e)))
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_checkout_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

fn signing_mac(secret: &str, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    Some(mac)
}

/// Razorpay checkout signature: hex(HMAC_SHA256(secret, "order_id|payment_id")).
pub fn checkout_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    signing_mac(secret, order_id, payment_id)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Constant-time comparison of a hex signature.
pub fn verify_checkout_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };
    signing_mac(secret, order_id, payment_id)
        .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}
