mod conversion;
mod referral_code;

pub use conversion::*;
pub use referral_code::*;
