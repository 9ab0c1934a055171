//! Prefixed ID generation for Kickback entities.
//!
//! All IDs use a `kb_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (Stripe's `ch_`, `re_`, `promo_`, etc.).
//!
//! Format: `kb_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["kb_code_", "kb_conv_"];

/// Validate that a string is a valid Kickback prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `kb_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Kickback.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    ReferralCode,
    Conversion,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::ReferralCode => "kb_code",
            Self::Conversion => "kb_conv",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
