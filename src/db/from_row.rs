//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const CODE_COLS: &str = "id, code, tier, discount_type, discount_amount_cents, discount_percent, reward_type, reward_amount_cents, reward_percent, reward_trigger, max_redemptions, max_reward_total_cents, max_reward_per_period_cents, reward_period_days, period_start_at, redemption_count, total_reward_paid_cents, period_reward_paid_cents, pending_payout_cents, is_active, sale_id, lead_id, purchase_email, discount_instrument_id, created_at, updated_at";

pub const CONVERSION_COLS: &str = "id, code_id, sale_id, referee_account_id, referee_email, discount_instrument_id, sale_amount_cents, discount_applied_cents, reward_earned_cents, reward_paid_cents, payout_status, payout_method, payout_error, refund_id, created_at";

// ============ FromRow Implementations ============

impl FromRow for ReferralCode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ReferralCode {
            id: row.get(0)?,
            code: row.get(1)?,
            tier: parse_enum(row, 2, "tier")?,
            discount_type: parse_enum(row, 3, "discount_type")?,
            discount_amount_cents: row.get(4)?,
            discount_percent: row.get(5)?,
            reward_type: parse_enum(row, 6, "reward_type")?,
            reward_amount_cents: row.get(7)?,
            reward_percent: row.get(8)?,
            reward_trigger: parse_enum(row, 9, "reward_trigger")?,
            max_redemptions: row.get(10)?,
            max_reward_total_cents: row.get(11)?,
            max_reward_per_period_cents: row.get(12)?,
            reward_period_days: row.get(13)?,
            period_start_at: row.get(14)?,
            redemption_count: row.get(15)?,
            total_reward_paid_cents: row.get(16)?,
            period_reward_paid_cents: row.get(17)?,
            pending_payout_cents: row.get(18)?,
            is_active: row.get::<_, i32>(19)? != 0,
            sale_id: row.get(20)?,
            lead_id: row.get(21)?,
            purchase_email: row.get(22)?,
            discount_instrument_id: row.get(23)?,
            created_at: row.get(24)?,
            updated_at: row.get(25)?,
        })
    }
}

impl FromRow for ReferralConversion {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ReferralConversion {
            id: row.get(0)?,
            code_id: row.get(1)?,
            sale_id: row.get(2)?,
            referee_account_id: row.get(3)?,
            referee_email: row.get(4)?,
            discount_instrument_id: row.get(5)?,
            sale_amount_cents: row.get(6)?,
            discount_applied_cents: row.get(7)?,
            reward_earned_cents: row.get(8)?,
            reward_paid_cents: row.get(9)?,
            payout_status: parse_enum(row, 10, "payout_status")?,
            payout_method: row.get(11)?,
            payout_error: row.get(12)?,
            refund_id: row.get(13)?,
            created_at: row.get(14)?,
        })
    }
}
