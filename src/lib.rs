//! Kickback - referral conversion and reward payout engine
//!
//! This library holds the referral logic a web-layer webhook handler invokes
//! after a purchase completes: resolving an applied discount to a referral
//! code, blocking self-referrals, computing capped rewards, and disbursing
//! payouts exactly once per conversion even under webhook retries.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod id;
pub mod models;
pub mod payments;
