pub mod calculator;
pub mod candle;
pub mod support_resistance;

pub use calculator::{compute_snapshot, IndicatorParams};
pub use support_resistance::find_support_resistance;
