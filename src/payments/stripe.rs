use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{EngineError, Result};

use super::{PaymentPlatform, RefundReceipt};

/// Metadata key the checkout layer stamps onto promotion codes it creates
/// for referral codes. Lets us map an applied discount back to its owner.
const CODE_ID_METADATA_KEY: &str = "kickback_code_id";

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PromotionCodeResponse {
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    /// `timeout` bounds every API call; a timed-out refund surfaces as a
    /// payment error, which the orchestrator records as a failed payout.
    pub fn new(secret_key: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentPlatform for StripeClient {
    async fn lookup_discount_owner(&self, instrument_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!(
                "https://api.stripe.com/v1/promotion_codes/{}",
                instrument_id
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| EngineError::Payment(format!("Stripe API error: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Payment(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let promo: PromotionCodeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Payment(format!("Failed to parse Stripe response: {}", e)))?;

        let code_id = promo
            .metadata
            .and_then(|m| m.get(CODE_ID_METADATA_KEY).cloned())
            .and_then(|v| v.as_str().map(|s| s.to_string()));

        Ok(code_id)
    }

    async fn partial_refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<RefundReceipt> {
        let amount = amount_cents.to_string();
        let response = self
            .client
            .post("https://api.stripe.com/v1/refunds")
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", idempotency_key)
            .form(&[
                ("charge", charge_id),
                ("amount", amount.as_str()),
                ("metadata[kickback_idempotency_key]", idempotency_key),
            ])
            .send()
            .await
            .map_err(|e| EngineError::Payment(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Payment(format!(
                "Stripe refund failed: {}",
                error_text
            )));
        }

        let refund: RefundResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Payment(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(RefundReceipt {
            refund_id: refund.id,
        })
    }
}
