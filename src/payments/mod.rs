mod stripe;

pub use stripe::*;

use async_trait::async_trait;

use crate::error::Result;

/// Receipt for a disbursed partial refund.
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refund_id: String,
}

/// The payment platform as the engine sees it: it can map a discount
/// instrument back to the referral code that owns it, and issue partial
/// refunds against a referrer's original charge.
///
/// Implementations must honor the idempotency key so a retried webhook can
/// never double-refund.
#[async_trait]
pub trait PaymentPlatform: Send + Sync {
    /// Resolve a discount instrument (e.g. a promotion code id) to the
    /// referral code id that owns it, if any. Not every discount is a
    /// referral.
    async fn lookup_discount_owner(&self, instrument_id: &str) -> Result<Option<String>>;

    /// Issue a partial refund of `amount_cents` against the referrer's
    /// original charge, tagged with `idempotency_key`.
    async fn partial_refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<RefundReceipt>;
}
