pub mod data_kind;
pub mod records;

pub use data_kind::{Adjust, BarPeriod, DataKind};
pub use records::*;
