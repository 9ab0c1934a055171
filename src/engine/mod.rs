pub mod codes;
pub mod guard;
pub mod orchestrator;
pub mod payout;
pub mod reward;

pub use orchestrator::{process_conversion, ConversionOutcome, ConversionRequest, EngineState};
