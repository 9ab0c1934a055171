//! Code lifecycle tests: generation, creation with tier defaults,
//! activation toggling, redemption ceilings, and the config store.

mod common;

use common::*;
use kickback::config::keys;

// ============ Code generation ============

#[test]
fn test_generate_code_from_seed() {
    let conn = setup_test_db();
    let code = codes::generate_unique_code(&conn, "Acme Corp!!").unwrap();
    assert_eq!(code, "ACMECORP");
}

#[test]
fn test_generate_code_probes_numeric_suffixes() {
    let conn = setup_test_db();
    create_test_code(&conn, "ACMECORP", "promo_0");

    let code = codes::generate_unique_code(&conn, "Acme Corp!!").unwrap();
    assert_eq!(code, "ACMECORP1");
}

#[test]
fn test_generate_code_random_suffix_after_probes() {
    let conn = setup_test_db();
    create_test_code(&conn, "ACMECORP", "promo_0");
    for i in 1..10 {
        create_test_code(&conn, &format!("ACMECORP{}", i), &format!("promo_{}", i));
    }

    // All probed candidates collide; a random 4-char suffix is appended
    // without a further collision check
    let code = codes::generate_unique_code(&conn, "Acme Corp!!").unwrap();
    assert!(code.starts_with("ACMECORP"));
    assert_eq!(code.len(), "ACMECORP".len() + 4);
    assert!(codes::is_valid_display_code(&code));
}

#[test]
fn test_generate_code_empty_seed_falls_back() {
    let conn = setup_test_db();
    let code = codes::generate_unique_code(&conn, "!!! ---").unwrap();
    assert_eq!(code, "FRIEND");
}

#[test]
fn test_generate_code_truncates_long_seed() {
    let conn = setup_test_db();
    let code = codes::generate_unique_code(&conn, "Extremely Long Company Name LLC").unwrap();
    assert_eq!(code, "EXTREMELYLON");
}

// ============ Code creation ============

#[test]
fn test_create_code_rejects_duplicate() {
    let conn = setup_test_db();
    create_test_code(&conn, "TAKEN", "promo_1");

    let result = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "TAKEN".to_string(),
            tier: CodeTier::Standard,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}

#[test]
fn test_create_code_rejects_invalid_format() {
    let conn = setup_test_db();
    for bad in ["ab", "lowercase", "WITH SPACE", "X", "A234567890123456789012"] {
        let result = codes::create_code(
            &conn,
            CreateReferralCode {
                code: bad.to_string(),
                tier: CodeTier::Standard,
                ..Default::default()
            },
        );
        assert!(
            matches!(result, Err(EngineError::InvalidCode(_))),
            "expected rejection for {:?}",
            bad
        );
    }
}

#[test]
fn test_standard_tier_defaults() {
    let conn = setup_test_db();
    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "STD".to_string(),
            tier: CodeTier::Standard,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(code.reward_type, RewardType::Fixed);
    assert_eq!(code.reward_trigger, RewardTrigger::First);
    assert_eq!(code.discount_type, DiscountType::Fixed);
    assert!(code.reward_amount_cents.is_some());
    assert!(code.is_active);
}

#[test]
fn test_friends_family_tier_defaults() {
    let conn = setup_test_db();
    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "FAMILY".to_string(),
            tier: CodeTier::FriendsFamily,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(code.reward_type, RewardType::None);
    assert!(code.reward_amount_cents.is_none());
}

#[test]
fn test_affiliate_tier_defaults() {
    let conn = setup_test_db();
    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "PARTNER".to_string(),
            tier: CodeTier::Affiliate,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(code.reward_type, RewardType::Percent);
    assert_eq!(code.reward_trigger, RewardTrigger::Every);
    assert_eq!(code.discount_type, DiscountType::Percent);
    assert!(code.reward_percent.is_some());
}

#[test]
fn test_tier_defaults_read_config_store() {
    let conn = setup_test_db();
    queries::set_config(&conn, keys::DEFAULT_REWARD_CENTS, "2500").unwrap();

    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "TUNED".to_string(),
            tier: CodeTier::Standard,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(code.reward_amount_cents, Some(2500));
}

#[test]
fn test_explicit_terms_override_tier_defaults() {
    let conn = setup_test_db();
    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "CUSTOM".to_string(),
            tier: CodeTier::FriendsFamily,
            reward_type: Some(RewardType::Fixed),
            reward_amount_cents: Some(777),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(code.reward_type, RewardType::Fixed);
    assert_eq!(code.reward_amount_cents, Some(777));
}

#[test]
fn test_period_cap_sets_period_start() {
    let conn = setup_test_db();
    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "WINDOWED".to_string(),
            tier: CodeTier::Affiliate,
            max_reward_per_period_cents: Some(5000),
            reward_period_days: Some(7),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(code.period_start_at.is_some());

    let uncapped = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "OPEN".to_string(),
            tier: CodeTier::Affiliate,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(uncapped.period_start_at.is_none());
}

#[test]
fn test_issue_code_for_purchase() {
    let conn = setup_test_db();
    let code = codes::issue_code_for_purchase(
        &conn,
        codes::IssueCodeInput {
            buyer_name: "Jane Doe".to_string(),
            sale_id: "sale_42".to_string(),
            lead_id: Some("acct_jane".to_string()),
            purchase_email: Some("jane@example.com".to_string()),
            discount_instrument_id: Some("promo_jane".to_string()),
        },
    )
    .unwrap();

    assert_eq!(code.code, "JANEDOE");
    assert_eq!(code.tier, CodeTier::Standard);
    assert_eq!(code.sale_id.as_deref(), Some("sale_42"));
    assert_eq!(code.lead_id.as_deref(), Some("acct_jane"));
    assert_eq!(code.purchase_email.as_deref(), Some("jane@example.com"));

    // A second purchase by a same-named buyer gets the next candidate
    let second = codes::issue_code_for_purchase(
        &conn,
        codes::IssueCodeInput {
            buyer_name: "Jane Doe".to_string(),
            sale_id: "sale_43".to_string(),
            lead_id: Some("acct_jane2".to_string()),
            purchase_email: Some("jane2@example.com".to_string()),
            discount_instrument_id: None,
        },
    )
    .unwrap();
    assert_eq!(second.code, "JANEDOE1");
}

// ============ Lifecycle ============

#[test]
fn test_toggle_active() {
    let conn = setup_test_db();
    let code = create_test_code(&conn, "FLIPME", "promo_1");
    assert!(code.is_active);

    assert!(codes::toggle_active(&conn, &code.id, false).unwrap());
    assert!(!reload_code(&conn, &code.id).is_active);

    assert!(codes::toggle_active(&conn, &code.id, true).unwrap());
    assert!(reload_code(&conn, &code.id).is_active);

    assert!(!codes::toggle_active(&conn, "kb_code_missing", false).unwrap());
}

#[test]
fn test_redemption_ceiling() {
    let conn = setup_test_db();
    let code = codes::create_code(
        &conn,
        CreateReferralCode {
            code: "LIMITED".to_string(),
            tier: CodeTier::Standard,
            max_redemptions: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(codes::record_redemption(&conn, &code.id).unwrap());
    assert!(codes::record_redemption(&conn, &code.id).unwrap());
    // At the ceiling: the counter must never overshoot
    assert!(!codes::record_redemption(&conn, &code.id).unwrap());
    assert_eq!(reload_code(&conn, &code.id).redemption_count, 2);
}

#[test]
fn test_unlimited_redemptions() {
    let conn = setup_test_db();
    let code = create_test_code(&conn, "OPENEND", "promo_1");

    for _ in 0..5 {
        assert!(codes::record_redemption(&conn, &code.id).unwrap());
    }
    assert_eq!(reload_code(&conn, &code.id).redemption_count, 5);
}

// ============ Config store ============

#[test]
fn test_config_store_roundtrip() {
    let conn = setup_test_db();
    assert_eq!(queries::get_config_i64(&conn, "some_key", 42).unwrap(), 42);

    queries::set_config(&conn, "some_key", "7").unwrap();
    assert_eq!(queries::get_config_i64(&conn, "some_key", 42).unwrap(), 7);

    // Upsert overwrites
    queries::set_config(&conn, "some_key", "9").unwrap();
    assert_eq!(queries::get_config_i64(&conn, "some_key", 42).unwrap(), 9);

    // Non-numeric values fall back to the default
    queries::set_config(&conn, "other_key", "not a number").unwrap();
    assert_eq!(queries::get_config_i64(&conn, "other_key", 5).unwrap(), 5);
}
