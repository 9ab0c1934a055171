use serde::{Deserialize, Serialize};

/// A distributable referral code tied to an originating purchase/account,
/// optionally earning its owner a reward when redeemed by others.
///
/// Running counters are mutated only by the conversion orchestrator, and only
/// through atomic storage-level increments - never read-modify-write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCode {
    pub id: String,
    /// Display code shown to users (uppercase alphanumeric, 3-20 chars)
    pub code: String,
    pub tier: CodeTier,

    // Discount terms - applied by the payment platform at checkout,
    // never by this engine
    pub discount_type: DiscountType,
    pub discount_amount_cents: Option<i64>,
    pub discount_percent: Option<i64>,

    // Reward terms
    pub reward_type: RewardType,
    pub reward_amount_cents: Option<i64>,
    pub reward_percent: Option<i64>,
    pub reward_trigger: RewardTrigger,

    // Caps (all optional)
    pub max_redemptions: Option<i64>,
    pub max_reward_total_cents: Option<i64>,
    pub max_reward_per_period_cents: Option<i64>,
    pub reward_period_days: Option<i64>,
    /// Set when a period cap is configured; advances on rollover
    pub period_start_at: Option<i64>,

    // Running counters
    pub redemption_count: i64,
    pub total_reward_paid_cents: i64,
    pub period_reward_paid_cents: i64,
    /// Capped remainders that could not be paid. Consumes lifetime headroom
    /// but is never disbursed later (forfeited).
    pub pending_payout_cents: i64,

    pub is_active: bool,

    // Provenance of the originating purchase, for self-referral checks
    pub sale_id: Option<String>,
    pub lead_id: Option<String>,
    pub purchase_email: Option<String>,
    /// Payment platform discount instrument (e.g., Stripe promotion code id)
    pub discount_instrument_id: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a referral code. Omitted reward/discount fields
/// are filled from tier defaults seeded by the config store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReferralCode {
    pub code: String,
    pub tier: CodeTier,

    pub discount_type: Option<DiscountType>,
    pub discount_amount_cents: Option<i64>,
    pub discount_percent: Option<i64>,

    pub reward_type: Option<RewardType>,
    pub reward_amount_cents: Option<i64>,
    pub reward_percent: Option<i64>,
    pub reward_trigger: Option<RewardTrigger>,

    pub max_redemptions: Option<i64>,
    pub max_reward_total_cents: Option<i64>,
    pub max_reward_per_period_cents: Option<i64>,
    pub reward_period_days: Option<i64>,

    pub sale_id: Option<String>,
    pub lead_id: Option<String>,
    pub purchase_email: Option<String>,
    pub discount_instrument_id: Option<String>,
}

/// Code tier - determines default discount/reward semantics when a code is
/// created without explicit terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeTier {
    #[default]
    Standard,
    FriendsFamily,
    Affiliate,
}

impl CodeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::FriendsFamily => "friends_family",
            Self::Affiliate => "affiliate",
        }
    }
}

impl std::str::FromStr for CodeTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "friends_family" => Ok(Self::FriendsFamily),
            "affiliate" => Ok(Self::Affiliate),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for CodeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[default]
    Fixed,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percent => "percent",
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "percent" => Ok(Self::Percent),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    #[default]
    Fixed,
    Percent,
    None,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percent => "percent",
            Self::None => "none",
        }
    }
}

impl std::str::FromStr for RewardType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "percent" => Ok(Self::Percent),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for RewardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a code earns a reward only on its first successful conversion or
/// on every one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTrigger {
    #[default]
    First,
    Every,
}

impl RewardTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Every => "every",
        }
    }
}

impl std::str::FromStr for RewardTrigger {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "every" => Ok(Self::Every),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for RewardTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
