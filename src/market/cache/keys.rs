//! 缓存键：`<数据种类>:<代码>:<参数>`，不同参数组合不会冲突

use chrono::NaiveDate;

use crate::market::model::{Adjust, BarPeriod};
use crate::time_util::{self, TimeWindow};

pub fn realtime_key(symbol: &str) -> String {
    format!("realtime:{}", symbol)
}

pub fn info_key(symbol: &str) -> String {
    format!("info:{}", symbol)
}

pub fn bars_key(symbol: &str, period: BarPeriod, adjust: Adjust, window: &TimeWindow) -> String {
    format!(
        "bars:{}:{}:{}:{}:{}",
        symbol,
        period,
        adjust,
        time_util::format_canonical(&window.start),
        time_util::format_canonical(&window.end)
    )
}

pub fn indicators_key(symbol: &str, period: BarPeriod, as_of: NaiveDate) -> String {
    format!("indicators:{}:{}:{}", symbol, period, as_of.format("%Y-%m-%d"))
}

pub fn rank_key() -> String {
    "rank:all".to_string()
}

pub fn board_key() -> String {
    "board:concept".to_string()
}
