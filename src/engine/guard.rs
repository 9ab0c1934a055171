//! Self-referral detection: a referrer must not earn rewards from their own
//! purchases, whether identified by account or by purchase email.

use crate::models::ReferralCode;

/// Reason string persisted on blocked conversions.
pub const SELF_REFERRAL: &str = "self_referral";

/// Decide whether a conversion must be blocked as a self-referral.
///
/// Blocks when the referee resolves to the code's owning account, or when the
/// referee's purchase email matches the referrer's originating purchase email
/// (case-insensitive). Missing fields never block - absence of identity is
/// not evidence of abuse.
pub fn check_self_referral(
    code: &ReferralCode,
    referee_account_id: Option<&str>,
    referee_email: Option<&str>,
) -> Option<&'static str> {
    if let (Some(lead_id), Some(account_id)) = (code.lead_id.as_deref(), referee_account_id) {
        if lead_id == account_id {
            return Some(SELF_REFERRAL);
        }
    }

    if let (Some(owner_email), Some(email)) = (code.purchase_email.as_deref(), referee_email) {
        if owner_email.eq_ignore_ascii_case(email) {
            return Some(SELF_REFERRAL);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn code_with_owner(lead_id: Option<&str>, email: Option<&str>) -> ReferralCode {
        ReferralCode {
            id: "kb_code_00000000000000000000000000000000".to_string(),
            code: "OWNER".to_string(),
            tier: CodeTier::Standard,
            discount_type: DiscountType::Fixed,
            discount_amount_cents: Some(1000),
            discount_percent: None,
            reward_type: RewardType::Fixed,
            reward_amount_cents: Some(1000),
            reward_percent: None,
            reward_trigger: RewardTrigger::First,
            max_redemptions: None,
            max_reward_total_cents: None,
            max_reward_per_period_cents: None,
            reward_period_days: None,
            period_start_at: None,
            redemption_count: 0,
            total_reward_paid_cents: 0,
            period_reward_paid_cents: 0,
            pending_payout_cents: 0,
            is_active: true,
            sale_id: Some("sale_1".to_string()),
            lead_id: lead_id.map(|s| s.to_string()),
            purchase_email: email.map(|s| s.to_string()),
            discount_instrument_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_same_account_blocked() {
        let code = code_with_owner(Some("acct_1"), None);
        assert_eq!(
            check_self_referral(&code, Some("acct_1"), None),
            Some(SELF_REFERRAL)
        );
    }

    #[test]
    fn test_different_account_allowed() {
        let code = code_with_owner(Some("acct_1"), None);
        assert_eq!(check_self_referral(&code, Some("acct_2"), None), None);
    }

    #[test]
    fn test_same_email_case_insensitive_blocked() {
        let code = code_with_owner(None, Some("owner@example.com"));
        assert_eq!(
            check_self_referral(&code, None, Some("Owner@Example.COM")),
            Some(SELF_REFERRAL)
        );
    }

    #[test]
    fn test_different_email_allowed() {
        let code = code_with_owner(Some("acct_1"), Some("owner@example.com"));
        assert_eq!(
            check_self_referral(&code, Some("acct_2"), Some("friend@example.com")),
            None
        );
    }

    #[test]
    fn test_missing_identity_never_blocks() {
        let code = code_with_owner(None, None);
        assert_eq!(
            check_self_referral(&code, Some("acct_1"), Some("a@b.com")),
            None
        );

        let code = code_with_owner(Some("acct_1"), Some("owner@example.com"));
        assert_eq!(check_self_referral(&code, None, None), None);
    }
}
