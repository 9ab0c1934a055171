//! Reward calculation: how much a conversion earns, and how much of that is
//! actually payable after lifetime and period caps.
//!
//! Pure function of the code snapshot, the sale amount, and "now". The cap
//! counters it reads are advisory - the orchestrator applies the resulting
//! increments as atomic storage updates, accepting a bounded overshoot when
//! two conversions for the same code race (at most one conversion's worth).

use crate::models::{ReferralCode, RewardTrigger, RewardType};

const SECS_PER_DAY: i64 = 86_400;

/// Outcome of reward calculation for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardDecision {
    /// Theoretical reward before caps, kept for bookkeeping
    pub earned_cents: i64,
    /// Amount the payout executor should disburse
    pub payable_cents: i64,
    /// When true, no payout is attempted (payable is forced to 0)
    pub skip_payout: bool,
    pub skip_reason: Option<&'static str>,
    /// New period_start_at to persist (compare-and-swap) when the current
    /// period has elapsed
    pub period_rolled_to: Option<i64>,
}

/// Compute the earned and payable reward for one conversion.
///
/// `is_first` reflects whether the code has zero prior conversions with
/// payout_status = paid.
pub fn calculate_reward(
    code: &ReferralCode,
    sale_amount_cents: i64,
    is_first: bool,
    now: i64,
) -> RewardDecision {
    if code.reward_type == RewardType::None {
        return RewardDecision {
            earned_cents: 0,
            payable_cents: 0,
            skip_payout: true,
            skip_reason: Some("no_reward_configured"),
            period_rolled_to: None,
        };
    }

    let earned_cents = match code.reward_type {
        RewardType::Fixed => code.reward_amount_cents.unwrap_or(0),
        RewardType::Percent => percent_of(sale_amount_cents, code.reward_percent.unwrap_or(0)),
        RewardType::None => 0,
    };

    // Earned is still computed for bookkeeping when the trigger gates the
    // payout; nothing is payable.
    if code.reward_trigger == RewardTrigger::First && !is_first {
        return RewardDecision {
            earned_cents,
            payable_cents: 0,
            skip_payout: true,
            skip_reason: Some("not_first_conversion"),
            period_rolled_to: None,
        };
    }

    // Roll the period before evaluating headroom. The schedule advances by
    // whole period lengths so it stays aligned to the original start.
    let period_rolled_to = rolled_period_start(code, now);
    let effective_period_paid = if period_rolled_to.is_some() {
        0
    } else {
        code.period_reward_paid_cents
    };

    let lifetime_headroom = match code.max_reward_total_cents {
        Some(cap) => (cap - code.total_reward_paid_cents - code.pending_payout_cents).max(0),
        None => i64::MAX,
    };
    let period_headroom = match code.max_reward_per_period_cents {
        Some(cap) => (cap - effective_period_paid).max(0),
        None => i64::MAX,
    };

    let payable_cents = earned_cents.min(lifetime_headroom).min(period_headroom).max(0);

    RewardDecision {
        earned_cents,
        payable_cents,
        skip_payout: false,
        skip_reason: None,
        period_rolled_to,
    }
}

/// If a period cap is configured and the current period has elapsed, the new
/// period_start_at. None when no roll is due.
fn rolled_period_start(code: &ReferralCode, now: i64) -> Option<i64> {
    code.max_reward_per_period_cents?;
    let days = code.reward_period_days?;
    let start = code.period_start_at?;

    if days <= 0 {
        return None;
    }

    let period_len = days * SECS_PER_DAY;
    if now < start + period_len {
        return None;
    }

    let elapsed_periods = (now - start) / period_len;
    Some(start + elapsed_periods * period_len)
}

/// Integer percentage of an amount in cents, rounded half-up.
pub(crate) fn percent_of(amount_cents: i64, percent: i64) -> i64 {
    if amount_cents <= 0 || percent <= 0 {
        return 0;
    }
    (amount_cents * percent + 50) / 100
}
