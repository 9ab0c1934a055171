use serde::{Deserialize, Serialize};

/// One referee purchase attributed to one referrer code. Immutable once
/// finalized; unique on (code_id, sale_id), which is the idempotency key
/// for webhook retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConversion {
    pub id: String,
    pub code_id: String,
    /// The referee's sale, as identified by the payment platform
    pub sale_id: String,

    // Provenance, for auditability and replay detection
    pub referee_account_id: Option<String>,
    pub referee_email: Option<String>,
    pub discount_instrument_id: Option<String>,

    // Financial facts (cents)
    pub sale_amount_cents: i64,
    pub discount_applied_cents: i64,
    /// Pre-cap reward, kept for bookkeeping even when nothing is paid
    pub reward_earned_cents: i64,
    /// Post-cap reward actually disbursed
    pub reward_paid_cents: i64,

    pub payout_status: PayoutStatus,
    pub payout_method: Option<String>,
    /// Free-text reason (e.g. "self_referral", a platform error message)
    pub payout_error: Option<String>,
    /// Payment platform refund id, when a payout was disbursed
    pub refund_id: Option<String>,

    pub created_at: i64,
}

/// Data inserted when a conversion is first claimed. The row starts in
/// `pending` status and is finalized with the reached outcome.
#[derive(Debug, Clone)]
pub struct NewConversion {
    pub code_id: String,
    pub sale_id: String,
    pub referee_account_id: Option<String>,
    pub referee_email: Option<String>,
    pub discount_instrument_id: Option<String>,
    pub sale_amount_cents: i64,
    pub discount_applied_cents: i64,
}

/// Final outcome written onto a claimed conversion row.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub payout_status: PayoutStatus,
    pub reward_earned_cents: i64,
    pub reward_paid_cents: i64,
    pub payout_method: Option<String>,
    pub payout_error: Option<String>,
    pub refund_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Claimed by an in-flight conversion, not yet finalized
    Pending,
    Paid,
    Skipped,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PayoutStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
