//! Test utilities and fixtures for Kickback integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use kickback::db::{init_db, queries};
pub use kickback::engine::{
    codes, process_conversion, ConversionOutcome, ConversionRequest, EngineState,
};
pub use kickback::error::{EngineError, Result};
pub use kickback::models::*;
pub use kickback::payments::{PaymentPlatform, RefundReceipt};

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// A recorded partial-refund call against the mock platform.
#[derive(Debug, Clone)]
pub struct RefundCall {
    pub charge_id: String,
    pub amount_cents: i64,
    pub idempotency_key: String,
}

/// In-memory payment platform: programmable instrument-owner mapping and
/// refund failure, recording every refund call.
#[derive(Default)]
pub struct MockPlatform {
    /// instrument id -> referral code id (out-of-band registrations)
    pub owners: Mutex<HashMap<String, String>>,
    pub refunds: Mutex<Vec<RefundCall>>,
    pub fail_refunds: AtomicBool,
    refund_seq: AtomicU64,
}

impl MockPlatform {
    pub fn register_owner(&self, instrument_id: &str, code_id: &str) {
        self.owners
            .lock()
            .unwrap()
            .insert(instrument_id.to_string(), code_id.to_string());
    }

    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn refund_calls(&self) -> Vec<RefundCall> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PaymentPlatform for MockPlatform {
    async fn lookup_discount_owner(&self, instrument_id: &str) -> Result<Option<String>> {
        Ok(self.owners.lock().unwrap().get(instrument_id).cloned())
    }

    async fn partial_refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> Result<RefundReceipt> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(EngineError::Payment("mock refund failure".to_string()));
        }
        self.refunds.lock().unwrap().push(RefundCall {
            charge_id: charge_id.to_string(),
            amount_cents,
            idempotency_key: idempotency_key.to_string(),
        });
        let seq = self.refund_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RefundReceipt {
            refund_id: format!("re_mock_{}", seq),
        })
    }
}

/// Create an EngineState over a single-connection in-memory pool plus a
/// mock payment platform. max_size(1) keeps every pooled checkout on the
/// same in-memory database.
pub fn create_test_state() -> (EngineState, Arc<MockPlatform>) {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let platform = Arc::new(MockPlatform::default());
    let state = EngineState {
        db: pool,
        platform: platform.clone() as Arc<dyn PaymentPlatform>,
    };
    (state, platform)
}

/// Create a standard-tier test code: fixed $10 discount, fixed $100 reward,
/// trigger=first, no caps, owned by `acct_owner` / owner@example.com.
pub fn create_test_code(conn: &Connection, display_code: &str, instrument_id: &str) -> ReferralCode {
    codes::create_code(
        conn,
        CreateReferralCode {
            code: display_code.to_string(),
            tier: CodeTier::Standard,
            reward_type: Some(RewardType::Fixed),
            reward_amount_cents: Some(10_000),
            reward_trigger: Some(RewardTrigger::First),
            sale_id: Some("sale_referrer".to_string()),
            lead_id: Some("acct_owner".to_string()),
            purchase_email: Some("owner@example.com".to_string()),
            discount_instrument_id: Some(instrument_id.to_string()),
            ..Default::default()
        },
    )
    .expect("Failed to create test code")
}

/// A conversion request from a third-party referee.
pub fn test_request(sale_id: &str, instrument_id: &str, sale_amount_cents: i64) -> ConversionRequest {
    ConversionRequest {
        sale_id: sale_id.to_string(),
        referee_account_id: Some("acct_referee".to_string()),
        referee_email: Some("referee@example.com".to_string()),
        sale_amount_cents,
        discount_instrument_id: instrument_id.to_string(),
        referrer_charge_id: Some("ch_referrer".to_string()),
    }
}

/// Fetch the single conversion row for (code, sale), panicking if missing.
pub fn get_conversion(conn: &Connection, code_id: &str, sale_id: &str) -> ReferralConversion {
    queries::get_conversion(conn, code_id, sale_id)
        .expect("Query failed")
        .expect("Conversion row not found")
}

/// Reload a code by id, panicking if missing.
pub fn reload_code(conn: &Connection, code_id: &str) -> ReferralCode {
    queries::get_code_by_id(conn, code_id)
        .expect("Query failed")
        .expect("Code not found")
}
