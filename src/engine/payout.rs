//! Payout execution: turn a payable reward into a partial refund against the
//! referrer's original charge.
//!
//! The executor never retries. A platform failure (including a timeout) is a
//! terminal outcome for the conversion; the next delivery of the same webhook
//! event short-circuits at the idempotency claim and will not re-attempt
//! payment. The idempotency key passed to the platform is derived from
//! (code id, referee sale id), so even a racing duplicate cannot double-refund.

use crate::payments::PaymentPlatform;

/// Disbursement method recorded on paid conversions.
pub const METHOD_CHARGE_REFUND: &str = "charge_refund";

/// What actually happened when a payable reward was disbursed.
#[derive(Debug, Clone)]
pub struct PayoutOutcome {
    pub success: bool,
    pub amount_paid_cents: i64,
    /// Capped remainder that could not be paid - observability only, never
    /// queued for later payout
    pub pending_cents: i64,
    pub method: Option<String>,
    pub refund_id: Option<String>,
    pub error: Option<String>,
}

/// Deterministic idempotency key for one (code, sale) payout.
pub fn payout_idempotency_key(code_id: &str, sale_id: &str) -> String {
    format!("kb_payout_{}_{}", code_id, sale_id)
}

/// Disburse `payable_cents` via a partial refund against the referrer's
/// original charge.
///
/// Counter increments are the caller's job: on any non-zero amount paid, the
/// orchestrator atomically bumps the code's lifetime and period counters.
pub async fn execute_payout(
    platform: &dyn PaymentPlatform,
    idempotency_key: &str,
    payable_cents: i64,
    pending_cents: i64,
    referrer_charge_id: Option<&str>,
) -> PayoutOutcome {
    if payable_cents <= 0 {
        // Nothing payable (cap exhaustion or zero earn): success, no
        // platform call.
        return PayoutOutcome {
            success: true,
            amount_paid_cents: 0,
            pending_cents,
            method: None,
            refund_id: None,
            error: None,
        };
    }

    let Some(charge_id) = referrer_charge_id else {
        return PayoutOutcome {
            success: false,
            amount_paid_cents: 0,
            pending_cents,
            method: None,
            refund_id: None,
            error: Some("missing_referrer_charge".to_string()),
        };
    };

    match platform
        .partial_refund(charge_id, payable_cents, idempotency_key)
        .await
    {
        Ok(receipt) => PayoutOutcome {
            success: true,
            amount_paid_cents: payable_cents,
            pending_cents,
            method: Some(METHOD_CHARGE_REFUND.to_string()),
            refund_id: Some(receipt.refund_id),
            error: None,
        },
        Err(e) => {
            tracing::warn!(
                charge_id = %charge_id,
                amount_cents = payable_cents,
                "referral payout refund failed: {}",
                e
            );
            PayoutOutcome {
                success: false,
                amount_paid_cents: 0,
                pending_cents,
                method: None,
                refund_id: None,
                error: Some(e.to_string()),
            }
        }
    }
}
