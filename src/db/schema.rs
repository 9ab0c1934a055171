use rusqlite::Connection;

/// Initialize the referral engine schema.
///
/// The unique index on (code_id, sale_id) is load-bearing: it is what makes
/// the orchestrator's insert-if-not-exists idempotency claim atomic.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Referral codes. Running counters (redemption_count, *_paid_cents,
        -- pending_payout_cents) are mutated only through atomic
        -- "SET col = col + N" updates by the conversion orchestrator.
        -- Codes are soft-deleted by flipping is_active, never removed while
        -- conversions reference them.
        CREATE TABLE IF NOT EXISTS referral_codes (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            tier TEXT NOT NULL CHECK (tier IN ('standard', 'friends_family', 'affiliate')),

            discount_type TEXT NOT NULL CHECK (discount_type IN ('fixed', 'percent')),
            discount_amount_cents INTEGER,
            discount_percent INTEGER,

            reward_type TEXT NOT NULL CHECK (reward_type IN ('fixed', 'percent', 'none')),
            reward_amount_cents INTEGER,
            reward_percent INTEGER,
            reward_trigger TEXT NOT NULL CHECK (reward_trigger IN ('first', 'every')),

            max_redemptions INTEGER,
            max_reward_total_cents INTEGER,
            max_reward_per_period_cents INTEGER,
            reward_period_days INTEGER,
            period_start_at INTEGER,

            redemption_count INTEGER NOT NULL DEFAULT 0,
            total_reward_paid_cents INTEGER NOT NULL DEFAULT 0,
            period_reward_paid_cents INTEGER NOT NULL DEFAULT 0,
            pending_payout_cents INTEGER NOT NULL DEFAULT 0,

            is_active INTEGER NOT NULL DEFAULT 1,

            sale_id TEXT,
            lead_id TEXT,
            purchase_email TEXT,
            discount_instrument_id TEXT,

            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_codes_instrument
            ON referral_codes(discount_instrument_id)
            WHERE discount_instrument_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_codes_lead ON referral_codes(lead_id);

        -- Conversions. One row per (code, referee sale); the unique index is
        -- the idempotency key across webhook retries.
        CREATE TABLE IF NOT EXISTS referral_conversions (
            id TEXT PRIMARY KEY,
            code_id TEXT NOT NULL REFERENCES referral_codes(id),
            sale_id TEXT NOT NULL,

            referee_account_id TEXT,
            referee_email TEXT,
            discount_instrument_id TEXT,

            sale_amount_cents INTEGER NOT NULL,
            discount_applied_cents INTEGER NOT NULL DEFAULT 0,
            reward_earned_cents INTEGER NOT NULL DEFAULT 0,
            reward_paid_cents INTEGER NOT NULL DEFAULT 0,

            payout_status TEXT NOT NULL CHECK (payout_status IN ('pending', 'paid', 'skipped', 'failed')),
            payout_method TEXT,
            payout_error TEXT,
            refund_id TEXT,

            created_at INTEGER NOT NULL,

            UNIQUE(code_id, sale_id)
        );
        CREATE INDEX IF NOT EXISTS idx_conversions_code ON referral_conversions(code_id);
        CREATE INDEX IF NOT EXISTS idx_conversions_sale ON referral_conversions(sale_id);

        -- Tunable defaults for new-code creation (key/value config store)
        CREATE TABLE IF NOT EXISTS engine_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}
