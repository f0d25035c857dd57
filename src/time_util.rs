use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

/// 统一的时间文本格式
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEFAULT_START: &str = "1970-01-01";
const DEFAULT_END: &str = "2099-12-31";

/// 解析数据源/调用方给出的时间文本
///
/// 支持 `YYYY-MM-DD HH:MM:SS`、`YYYY-MM-DD HH:MM`、`YYYY-MM-DD`、`YYYYMMDD`，
/// 只有日期时补 `default_time`
pub fn parse_timestamp_or(s: &str, default_time: NaiveTime) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, CANONICAL_FORMAT) {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Some(ts);
    }
    parse_date(s).map(|d| d.and_time(default_time))
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    parse_timestamp_or(s, NaiveTime::MIN)
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}

pub fn format_canonical(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

/// 转为 `YYYYMMDD`
pub fn compact_date(ts: &NaiveDateTime) -> String {
    ts.format("%Y%m%d").to_string()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// 闭区间时间窗口 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// 开始只有日期时取 00:00:00，结束只有日期时取 23:59:59，缺省为 1970-01-01 ~ 2099-12-31
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Result<Self, String> {
        let start_text = start.filter(|s| !s.trim().is_empty()).unwrap_or(DEFAULT_START);
        let end_text = end.filter(|s| !s.trim().is_empty()).unwrap_or(DEFAULT_END);
        let start = parse_timestamp_or(start_text, NaiveTime::MIN)
            .ok_or_else(|| format!("无法解析开始时间: {}", start_text))?;
        let end = parse_timestamp_or(end_text, end_of_day())
            .ok_or_else(|| format!("无法解析结束时间: {}", end_text))?;
        if start > end {
            return Err(format!("开始时间晚于结束时间: {} > {}", start_text, end_text));
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap_or(NaiveDate::MIN)
                .and_time(NaiveTime::MIN),
            end: NaiveDate::from_ymd_opt(2099, 12, 31)
                .unwrap_or(NaiveDate::MAX)
                .and_time(end_of_day()),
        }
    }

    /// 截止 `as_of` 当天的最近 `days` 个自然日
    pub fn trailing_days(as_of: NaiveDate, days: i64) -> Self {
        Self {
            start: (as_of - Duration::days(days)).and_time(NaiveTime::MIN),
            end: as_of.and_time(end_of_day()),
        }
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

/// serde 辅助：以统一格式读写 `NaiveDateTime`
pub mod canonical {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_canonical(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}
