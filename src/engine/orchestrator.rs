//! Conversion orchestrator: the single entry point invoked once per
//! completed purchase event.
//!
//! Pipeline: resolve the applied discount to a referral code, claim the
//! (code, sale) pair atomically, run the self-referral guard, calculate the
//! capped reward, attempt the payout, then finalize the conversion row and
//! count the redemption.
//!
//! Referral processing is best-effort: errors never propagate to the webhook
//! handler, so referral trouble can never block purchase fulfillment. All
//! failures are observable through the persisted payout_status/payout_error
//! fields and logs.

use std::sync::Arc;

use crate::db::{queries, DbPool};
use crate::engine::{codes, guard, payout, reward};
use crate::error::Result;
use crate::id;
use crate::models::*;
use crate::payments::PaymentPlatform;

/// Handle threaded through the engine: the database pool plus the payment
/// platform client.
#[derive(Clone)]
pub struct EngineState {
    pub db: DbPool,
    pub platform: Arc<dyn PaymentPlatform>,
}

/// One completed-sale event, as delivered (possibly more than once) by the
/// payment webhook.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// The referee's sale id - together with the resolved code id this is
    /// the idempotency key
    pub sale_id: String,
    pub referee_account_id: Option<String>,
    pub referee_email: Option<String>,
    pub sale_amount_cents: i64,
    /// The discount instrument applied at checkout (e.g. Stripe promotion
    /// code id). Not every discount is a referral.
    pub discount_instrument_id: String,
    /// The referrer's original charge, refunded partially to pay the reward
    pub referrer_charge_id: Option<String>,
}

/// Terminal outcome of processing one purchase event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The applied discount does not map to a known referral code
    NoCode,
    /// A conversion row already exists for this (code, sale) pair
    AlreadyProcessed,
    /// A conversion row was written with the reached outcome
    Recorded {
        code_id: String,
        payout_status: PayoutStatus,
        reward_earned_cents: i64,
        reward_paid_cents: i64,
    },
    /// An unexpected error was logged and swallowed before any row was
    /// claimed; the next delivery will retry from scratch
    Error,
}

/// Process one completed purchase event. Safe to call multiple times for the
/// same sale; never returns an error to the caller.
pub async fn process_conversion(state: &EngineState, req: ConversionRequest) -> ConversionOutcome {
    match convert(state, &req).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                sale_id = %req.sale_id,
                instrument_id = %req.discount_instrument_id,
                "referral conversion processing failed: {}",
                e
            );
            ConversionOutcome::Error
        }
    }
}

async fn convert(state: &EngineState, req: &ConversionRequest) -> Result<ConversionOutcome> {
    let Some(code) = resolve_code(state, &req.discount_instrument_id).await? else {
        tracing::debug!(
            sale_id = %req.sale_id,
            instrument_id = %req.discount_instrument_id,
            "discount is not a referral code"
        );
        return Ok(ConversionOutcome::NoCode);
    };

    // Idempotency claim: atomic insert-if-not-exists on (code_id, sale_id).
    // A lost claim means another delivery of this event already processed
    // (or is processing) it.
    let claimed = {
        let conn = state.db.get()?;
        queries::try_begin_conversion(
            &conn,
            &NewConversion {
                code_id: code.id.clone(),
                sale_id: req.sale_id.clone(),
                referee_account_id: req.referee_account_id.clone(),
                referee_email: req.referee_email.clone(),
                discount_instrument_id: Some(req.discount_instrument_id.clone()),
                sale_amount_cents: req.sale_amount_cents,
                discount_applied_cents: discount_applied_cents(&code, req.sale_amount_cents),
            },
        )?
    };
    if !claimed {
        tracing::debug!(
            sale_id = %req.sale_id,
            code = %code.code,
            "conversion already processed, skipping"
        );
        return Ok(ConversionOutcome::AlreadyProcessed);
    }

    match settle(state, req, &code).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            // The row is claimed; make the failure terminal rather than
            // leaving a pending row that blocks every future delivery.
            tracing::error!(
                sale_id = %req.sale_id,
                code = %code.code,
                "conversion failed after claim: {}",
                e
            );
            let conn = state.db.get()?;
            let result = ConversionResult {
                payout_status: PayoutStatus::Failed,
                reward_earned_cents: 0,
                reward_paid_cents: 0,
                payout_method: None,
                payout_error: Some(e.to_string()),
                refund_id: None,
            };
            queries::finalize_conversion(&conn, &code.id, &req.sale_id, &result)?;
            codes::record_redemption(&conn, &code.id)?;
            Ok(recorded(&code.id, &result))
        }
    }
}

/// Run the pipeline past the idempotency claim: guard, reward, payout,
/// finalize, redemption count.
async fn settle(
    state: &EngineState,
    req: &ConversionRequest,
    code: &ReferralCode,
) -> Result<ConversionOutcome> {
    // Self-referral: still recorded (status=skipped) so the attempt is
    // auditable and never retried as unprocessed.
    if let Some(reason) = guard::check_self_referral(
        code,
        req.referee_account_id.as_deref(),
        req.referee_email.as_deref(),
    ) {
        tracing::info!(sale_id = %req.sale_id, code = %code.code, "self-referral blocked");
        let conn = state.db.get()?;
        let result = ConversionResult {
            payout_status: PayoutStatus::Skipped,
            reward_earned_cents: 0,
            reward_paid_cents: 0,
            payout_method: None,
            payout_error: Some(reason.to_string()),
            refund_id: None,
        };
        queries::finalize_conversion(&conn, &code.id, &req.sale_id, &result)?;
        codes::record_redemption(&conn, &code.id)?;
        return Ok(recorded(&code.id, &result));
    }

    let now = chrono::Utc::now().timestamp();
    let decision = {
        let conn = state.db.get()?;
        let is_first = queries::count_paid_conversions(&conn, &code.id)? == 0;
        let decision = reward::calculate_reward(code, req.sale_amount_cents, is_first, now);

        // Persist the period roll exactly once (CAS on period_start_at). A
        // lost race means another conversion rolled it first; our zeroed
        // view is then stale, which is the accepted bounded overshoot.
        if let (Some(new_start), Some(expected)) =
            (decision.period_rolled_to, code.period_start_at)
        {
            queries::try_roll_reward_period(&conn, &code.id, expected, new_start)?;
        }
        decision
    };

    if decision.skip_payout {
        let conn = state.db.get()?;
        let result = ConversionResult {
            payout_status: PayoutStatus::Skipped,
            reward_earned_cents: decision.earned_cents,
            reward_paid_cents: 0,
            payout_method: None,
            payout_error: decision.skip_reason.map(|r| r.to_string()),
            refund_id: None,
        };
        queries::finalize_conversion(&conn, &code.id, &req.sale_id, &result)?;
        codes::record_redemption(&conn, &code.id)?;
        return Ok(recorded(&code.id, &result));
    }

    let remainder = (decision.earned_cents - decision.payable_cents).max(0);
    let key = payout::payout_idempotency_key(&code.id, &req.sale_id);

    // No connection is held across the platform call.
    let outcome = payout::execute_payout(
        state.platform.as_ref(),
        &key,
        decision.payable_cents,
        remainder,
        req.referrer_charge_id.as_deref(),
    )
    .await;

    let conn = state.db.get()?;

    if outcome.success {
        if outcome.amount_paid_cents > 0 {
            queries::add_reward_paid(&conn, &code.id, outcome.amount_paid_cents)?;
        }
        if outcome.pending_cents > 0 {
            // Capped remainder: consumes remaining lifetime headroom, never
            // paid later. The query clamps so total + pending stays at or
            // under the lifetime cap.
            queries::add_pending_payout(&conn, &code.id, outcome.pending_cents)?;
        }
    }

    let payout_status = if !outcome.success {
        PayoutStatus::Failed
    } else if outcome.amount_paid_cents > 0 {
        PayoutStatus::Paid
    } else {
        PayoutStatus::Skipped
    };
    let payout_error = if !outcome.success {
        outcome.error.clone()
    } else if payout_status == PayoutStatus::Skipped && decision.earned_cents > 0 {
        Some("cap_exhausted".to_string())
    } else {
        None
    };

    let result = ConversionResult {
        payout_status,
        reward_earned_cents: decision.earned_cents,
        reward_paid_cents: outcome.amount_paid_cents,
        payout_method: outcome.method,
        payout_error,
        refund_id: outcome.refund_id,
    };
    queries::finalize_conversion(&conn, &code.id, &req.sale_id, &result)?;
    codes::record_redemption(&conn, &code.id)?;

    tracing::info!(
        sale_id = %req.sale_id,
        code = %code.code,
        status = %result.payout_status,
        earned_cents = result.reward_earned_cents,
        paid_cents = result.reward_paid_cents,
        "referral conversion recorded"
    );
    Ok(recorded(&code.id, &result))
}

/// Map the applied discount instrument to a known referral code: local
/// lookup first, then the payment platform's owner mapping for instruments
/// registered out-of-band.
async fn resolve_code(state: &EngineState, instrument_id: &str) -> Result<Option<ReferralCode>> {
    {
        let conn = state.db.get()?;
        if let Some(code) = queries::get_code_by_discount_instrument(&conn, instrument_id)? {
            return Ok(Some(code));
        }
    }

    let Some(code_id) = state.platform.lookup_discount_owner(instrument_id).await? else {
        return Ok(None);
    };

    // The owner mapping lives in platform metadata, which is externally
    // writable; reject malformed ids before touching the database.
    if !id::is_valid_prefixed_id(&code_id) {
        tracing::warn!(
            instrument_id = %instrument_id,
            code_id = %code_id,
            "ignoring malformed code id from platform owner lookup"
        );
        return Ok(None);
    }

    let conn = state.db.get()?;
    queries::get_code_by_id(&conn, &code_id)
}

/// The discount the payment platform applied at checkout, derived from the
/// code's terms for record keeping.
fn discount_applied_cents(code: &ReferralCode, sale_amount_cents: i64) -> i64 {
    match code.discount_type {
        DiscountType::Fixed => code
            .discount_amount_cents
            .unwrap_or(0)
            .min(sale_amount_cents)
            .max(0),
        DiscountType::Percent => {
            reward::percent_of(sale_amount_cents, code.discount_percent.unwrap_or(0))
        }
    }
}

fn recorded(code_id: &str, result: &ConversionResult) -> ConversionOutcome {
    ConversionOutcome::Recorded {
        code_id: code_id.to_string(),
        payout_status: result.payout_status,
        reward_earned_cents: result.reward_earned_cents,
        reward_paid_cents: result.reward_paid_cents,
    }
}
