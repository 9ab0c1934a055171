//! Referral code lifecycle: generation, creation with tier defaults,
//! activation toggling, and redemption counting.

use rand::Rng;
use rusqlite::Connection;

use crate::config::{defaults, keys};
use crate::db::queries;
use crate::error::{EngineError, Result};
use crate::id::EntityType;
use crate::models::*;

/// Seed token used when a name normalizes to nothing (e.g. all punctuation).
const FALLBACK_SEED: &str = "FRIEND";

/// Seed names are truncated to this many characters before probing.
const MAX_BASE_LEN: usize = 12;

/// Candidates probed before giving up on deterministic suffixes:
/// BASE, BASE1, .. BASE9.
const MAX_PROBE_ATTEMPTS: u32 = 10;

const RANDOM_SUFFIX_LEN: usize = 4;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const MIN_CODE_LEN: usize = 3;
const MAX_CODE_LEN: usize = 20;

/// Uppercase-alphanumeric display codes, 3-20 chars.
pub fn is_valid_display_code(code: &str) -> bool {
    (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Normalize a seed name into a code base: uppercase, alphanumeric only,
/// truncated to MAX_BASE_LEN. Empty results fall back to a constant token.
fn normalize_seed(seed: &str) -> String {
    let base: String = seed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(MAX_BASE_LEN)
        .collect();

    if base.is_empty() {
        FALLBACK_SEED.to_string()
    } else {
        base
    }
}

/// Generate a unique display code from a seed name.
///
/// Probes `BASE`, `BASE1`, `BASE2`, .. against the code table; if every
/// probed candidate collides, appends a random suffix and returns it without
/// a further collision check (accepted small residual collision risk).
pub fn generate_unique_code(conn: &Connection, seed: &str) -> Result<String> {
    let base = normalize_seed(seed);

    for attempt in 0..MAX_PROBE_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.clone()
        } else {
            format!("{}{}", base, attempt)
        };
        if !queries::display_code_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }

    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();
    Ok(format!("{}{}", base, suffix))
}

/// Discount/reward terms a tier implies when the caller omits them.
struct TierDefaults {
    discount_type: DiscountType,
    discount_amount_cents: Option<i64>,
    discount_percent: Option<i64>,
    reward_type: RewardType,
    reward_amount_cents: Option<i64>,
    reward_percent: Option<i64>,
    reward_trigger: RewardTrigger,
}

/// The tier default table. Tunable amounts come from the config store.
fn tier_defaults(conn: &Connection, tier: CodeTier) -> Result<TierDefaults> {
    let discount_cents = queries::get_config_i64(
        conn,
        keys::DEFAULT_DISCOUNT_CENTS,
        defaults::DEFAULT_DISCOUNT_CENTS,
    )?;
    let discount_percent = queries::get_config_i64(
        conn,
        keys::DEFAULT_DISCOUNT_PERCENT,
        defaults::DEFAULT_DISCOUNT_PERCENT,
    )?;
    let reward_cents = queries::get_config_i64(
        conn,
        keys::DEFAULT_REWARD_CENTS,
        defaults::DEFAULT_REWARD_CENTS,
    )?;
    let reward_percent = queries::get_config_i64(
        conn,
        keys::DEFAULT_REWARD_PERCENT,
        defaults::DEFAULT_REWARD_PERCENT,
    )?;

    Ok(match tier {
        CodeTier::Standard => TierDefaults {
            discount_type: DiscountType::Fixed,
            discount_amount_cents: Some(discount_cents),
            discount_percent: None,
            reward_type: RewardType::Fixed,
            reward_amount_cents: Some(reward_cents),
            reward_percent: None,
            reward_trigger: RewardTrigger::First,
        },
        // Friends & family codes give a discount but earn nothing.
        CodeTier::FriendsFamily => TierDefaults {
            discount_type: DiscountType::Fixed,
            discount_amount_cents: Some(discount_cents),
            discount_percent: None,
            reward_type: RewardType::None,
            reward_amount_cents: None,
            reward_percent: None,
            reward_trigger: RewardTrigger::First,
        },
        // Affiliates earn a percentage on every conversion.
        CodeTier::Affiliate => TierDefaults {
            discount_type: DiscountType::Percent,
            discount_amount_cents: None,
            discount_percent: Some(discount_percent),
            reward_type: RewardType::Percent,
            reward_amount_cents: None,
            reward_percent: Some(reward_percent),
            reward_trigger: RewardTrigger::Every,
        },
    })
}

/// Create a referral code, filling omitted terms from the tier default table.
pub fn create_code(conn: &Connection, input: CreateReferralCode) -> Result<ReferralCode> {
    if !is_valid_display_code(&input.code) {
        return Err(EngineError::InvalidCode(format!(
            "display code must be {}-{} uppercase alphanumeric chars: {:?}",
            MIN_CODE_LEN, MAX_CODE_LEN, input.code
        )));
    }
    if queries::display_code_exists(conn, &input.code)? {
        return Err(EngineError::Conflict(format!(
            "referral code already exists: {}",
            input.code
        )));
    }

    let d = tier_defaults(conn, input.tier)?;
    let now = chrono::Utc::now().timestamp();

    let reward_type = input.reward_type.unwrap_or(d.reward_type);
    let code = ReferralCode {
        id: EntityType::ReferralCode.gen_id(),
        code: input.code,
        tier: input.tier,
        discount_type: input.discount_type.unwrap_or(d.discount_type),
        discount_amount_cents: input.discount_amount_cents.or(d.discount_amount_cents),
        discount_percent: input.discount_percent.or(d.discount_percent),
        reward_type,
        reward_amount_cents: input.reward_amount_cents.or(d.reward_amount_cents),
        reward_percent: input.reward_percent.or(d.reward_percent),
        reward_trigger: input.reward_trigger.unwrap_or(d.reward_trigger),
        max_redemptions: input.max_redemptions,
        max_reward_total_cents: input.max_reward_total_cents,
        max_reward_per_period_cents: input.max_reward_per_period_cents,
        reward_period_days: input.reward_period_days,
        // A period cap starts its first period at creation time
        period_start_at: input.max_reward_per_period_cents.map(|_| now),
        redemption_count: 0,
        total_reward_paid_cents: 0,
        period_reward_paid_cents: 0,
        pending_payout_cents: 0,
        is_active: true,
        sale_id: input.sale_id,
        lead_id: input.lead_id,
        purchase_email: input.purchase_email,
        discount_instrument_id: input.discount_instrument_id,
        created_at: now,
        updated_at: now,
    };

    queries::insert_referral_code(conn, &code)?;
    tracing::info!(code = %code.code, tier = %code.tier, "created referral code");
    Ok(code)
}

/// Auto-issue path: every completed purchase earns the buyer a standard-tier
/// code generated from their name, carrying the originating sale/account/email
/// for later self-referral checks.
#[derive(Debug, Clone)]
pub struct IssueCodeInput {
    pub buyer_name: String,
    pub sale_id: String,
    pub lead_id: Option<String>,
    pub purchase_email: Option<String>,
    pub discount_instrument_id: Option<String>,
}

pub fn issue_code_for_purchase(conn: &Connection, input: IssueCodeInput) -> Result<ReferralCode> {
    let display_code = generate_unique_code(conn, &input.buyer_name)?;

    create_code(
        conn,
        CreateReferralCode {
            code: display_code,
            tier: CodeTier::Standard,
            sale_id: Some(input.sale_id),
            lead_id: input.lead_id,
            purchase_email: input.purchase_email,
            discount_instrument_id: input.discount_instrument_id,
            ..Default::default()
        },
    )
}

/// Flip a code's active flag. Returns false when the code does not exist.
pub fn toggle_active(conn: &Connection, code_id: &str, active: bool) -> Result<bool> {
    queries::set_code_active(conn, code_id, active)
}

/// Count one redemption against the code. Redemption and reward are
/// independent counters: this is called once per completed purchase that
/// used the code as a discount, whatever the payout outcome.
pub fn record_redemption(conn: &Connection, code_id: &str) -> Result<bool> {
    let counted = queries::try_increment_redemption(conn, code_id)?;
    if !counted {
        tracing::warn!(code_id = %code_id, "redemption not counted: code at max_redemptions or missing");
    }
    Ok(counted)
}
