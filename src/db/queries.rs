use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{query_all, query_one, CODE_COLS, CONVERSION_COLS};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============================================================================
// Referral codes
// ============================================================================

/// Insert a fully resolved referral code entity.
///
/// Callers go through `engine::codes::create_code`, which applies tier
/// defaults and validates the display code first.
pub fn insert_referral_code(conn: &Connection, code: &ReferralCode) -> Result<()> {
    conn.execute(
        "INSERT INTO referral_codes (
            id, code, tier,
            discount_type, discount_amount_cents, discount_percent,
            reward_type, reward_amount_cents, reward_percent, reward_trigger,
            max_redemptions, max_reward_total_cents, max_reward_per_period_cents,
            reward_period_days, period_start_at,
            redemption_count, total_reward_paid_cents, period_reward_paid_cents,
            pending_payout_cents, is_active,
            sale_id, lead_id, purchase_email, discount_instrument_id,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
        params![
            code.id,
            code.code,
            code.tier.as_str(),
            code.discount_type.as_str(),
            code.discount_amount_cents,
            code.discount_percent,
            code.reward_type.as_str(),
            code.reward_amount_cents,
            code.reward_percent,
            code.reward_trigger.as_str(),
            code.max_redemptions,
            code.max_reward_total_cents,
            code.max_reward_per_period_cents,
            code.reward_period_days,
            code.period_start_at,
            code.redemption_count,
            code.total_reward_paid_cents,
            code.period_reward_paid_cents,
            code.pending_payout_cents,
            code.is_active as i32,
            code.sale_id,
            code.lead_id,
            code.purchase_email,
            code.discount_instrument_id,
            code.created_at,
            code.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_code_by_id(conn: &Connection, id: &str) -> Result<Option<ReferralCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM referral_codes WHERE id = ?1", CODE_COLS),
        &[&id],
    )
}

pub fn get_code_by_display_code(conn: &Connection, code: &str) -> Result<Option<ReferralCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM referral_codes WHERE code = ?1", CODE_COLS),
        &[&code],
    )
}

pub fn get_code_by_discount_instrument(
    conn: &Connection,
    instrument_id: &str,
) -> Result<Option<ReferralCode>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM referral_codes WHERE discount_instrument_id = ?1",
            CODE_COLS
        ),
        &[&instrument_id],
    )
}

pub fn list_codes_for_lead(conn: &Connection, lead_id: &str) -> Result<Vec<ReferralCode>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM referral_codes WHERE lead_id = ?1 ORDER BY created_at DESC",
            CODE_COLS
        ),
        &[&lead_id],
    )
}

/// Check whether a display code is already taken.
pub fn display_code_exists(conn: &Connection, code: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM referral_codes WHERE code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Flip is_active. Historical conversions and counters are untouched.
pub fn set_code_active(conn: &Connection, id: &str, active: bool) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE referral_codes SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active as i32, now(), id],
    )?;
    Ok(affected > 0)
}

/// Atomically count a redemption, refusing to exceed max_redemptions.
///
/// Returns false when the code is already at its ceiling (or missing), so the
/// counter can never overshoot even under concurrent conversions.
pub fn try_increment_redemption(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE referral_codes
         SET redemption_count = redemption_count + 1, updated_at = ?1
         WHERE id = ?2
           AND (max_redemptions IS NULL OR redemption_count < max_redemptions)",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

/// Atomically add a disbursed amount to both the lifetime and period
/// counters. Expressed as "add N to column" so two concurrent conversions
/// for the same code cannot lose an update.
pub fn add_reward_paid(conn: &Connection, id: &str, amount_cents: i64) -> Result<()> {
    conn.execute(
        "UPDATE referral_codes
         SET total_reward_paid_cents = total_reward_paid_cents + ?1,
             period_reward_paid_cents = period_reward_paid_cents + ?1,
             updated_at = ?2
         WHERE id = ?3",
        params![amount_cents, now(), id],
    )?;
    Ok(())
}

/// Atomically accumulate a capped remainder that could not be paid.
/// Pending amounts consume lifetime headroom but are never disbursed later.
///
/// The addition is clamped to the remaining lifetime headroom inside the
/// UPDATE itself, so total_reward_paid_cents + pending_payout_cents can never
/// exceed max_reward_total_cents, even under concurrent conversions.
pub fn add_pending_payout(conn: &Connection, id: &str, amount_cents: i64) -> Result<()> {
    conn.execute(
        "UPDATE referral_codes
         SET pending_payout_cents = pending_payout_cents + MIN(?1,
                 CASE WHEN max_reward_total_cents IS NULL THEN ?1
                      ELSE MAX(max_reward_total_cents
                               - total_reward_paid_cents
                               - pending_payout_cents, 0)
                 END),
             updated_at = ?2
         WHERE id = ?3",
        params![amount_cents, now(), id],
    )?;
    Ok(())
}

/// Advance the reward period with a compare-and-swap on period_start_at.
///
/// Returns false if another conversion already rolled the period, in which
/// case the caller's zeroed-period view is stale but the roll happened
/// exactly once.
pub fn try_roll_reward_period(
    conn: &Connection,
    id: &str,
    expected_start: i64,
    new_start: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE referral_codes
         SET period_reward_paid_cents = 0, period_start_at = ?1, updated_at = ?2
         WHERE id = ?3 AND period_start_at = ?4",
        params![new_start, now(), id, expected_start],
    )?;
    Ok(affected > 0)
}

// ============================================================================
// Conversions
// ============================================================================

/// Atomically claim a conversion, returning true if this is the first
/// processing of this (code, sale) pair.
///
/// Uses INSERT OR IGNORE against the UNIQUE(code_id, sale_id) index - if the
/// pair already exists the insert is silently ignored and we return false,
/// so two concurrent deliveries of the same webhook event cannot both
/// process it. The row starts as 'pending' and is finalized with the
/// reached outcome.
pub fn try_begin_conversion(conn: &Connection, input: &NewConversion) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO referral_conversions (
            id, code_id, sale_id, referee_account_id, referee_email,
            discount_instrument_id, sale_amount_cents, discount_applied_cents,
            reward_earned_cents, reward_paid_cents, payout_status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, 'pending', ?9)",
        params![
            EntityType::Conversion.gen_id(),
            input.code_id,
            input.sale_id,
            input.referee_account_id,
            input.referee_email,
            input.discount_instrument_id,
            input.sale_amount_cents,
            input.discount_applied_cents,
            now(),
        ],
    )?;
    Ok(affected > 0)
}

/// Write the terminal outcome onto a claimed conversion row.
pub fn finalize_conversion(
    conn: &Connection,
    code_id: &str,
    sale_id: &str,
    result: &ConversionResult,
) -> Result<()> {
    conn.execute(
        "UPDATE referral_conversions
         SET payout_status = ?1, reward_earned_cents = ?2, reward_paid_cents = ?3,
             payout_method = ?4, payout_error = ?5, refund_id = ?6
         WHERE code_id = ?7 AND sale_id = ?8",
        params![
            result.payout_status.as_str(),
            result.reward_earned_cents,
            result.reward_paid_cents,
            result.payout_method,
            result.payout_error,
            result.refund_id,
            code_id,
            sale_id,
        ],
    )?;
    Ok(())
}

pub fn get_conversion(
    conn: &Connection,
    code_id: &str,
    sale_id: &str,
) -> Result<Option<ReferralConversion>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM referral_conversions WHERE code_id = ?1 AND sale_id = ?2",
            CONVERSION_COLS
        ),
        &[&code_id, &sale_id],
    )
}

pub fn list_conversions_for_code(
    conn: &Connection,
    code_id: &str,
) -> Result<Vec<ReferralConversion>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM referral_conversions WHERE code_id = ?1 ORDER BY created_at",
            CONVERSION_COLS
        ),
        &[&code_id],
    )
}

/// Count prior conversions that actually paid out. Zero such rows means the
/// next paid conversion is the code's first (reward_trigger = first gating).
pub fn count_paid_conversions(conn: &Connection, code_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM referral_conversions WHERE code_id = ?1 AND payout_status = 'paid'",
        params![code_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// Config store
// ============================================================================

/// Get a config value by key, falling back to the given default when the
/// key has never been written (or holds a non-numeric value).
pub fn get_config_i64(conn: &Connection, key: &str, default: i64) -> Result<i64> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM engine_config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(default))
}

/// Set a config value (insert or update).
pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO engine_config (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now()],
    )?;
    Ok(())
}
