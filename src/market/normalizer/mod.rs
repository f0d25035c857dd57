//! 原始响应 → 标准记录

pub mod coerce;
pub mod kline;
pub mod snapshot;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::market::indicator::{self, IndicatorParams};
use crate::market::model::{Bar, BarPeriod, DataKind, QuoteRecord};
use crate::time_util::TimeWindow;

pub use snapshot::rank_secids;

/// 一次标准化所需的上下文
#[derive(Debug, Clone)]
pub struct NormalizeRequest {
    pub kind: DataKind,
    pub symbol: String,
    /// 超出窗口的记录直接丢弃
    pub window: TimeWindow,
    /// 快照类记录的时间
    pub fetched_at: NaiveDateTime,
}

impl NormalizeRequest {
    pub fn new(kind: DataKind, symbol: impl Into<String>, fetched_at: NaiveDateTime) -> Self {
        Self {
            kind,
            symbol: symbol.into(),
            window: TimeWindow::unbounded(),
            fetched_at,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }
}

pub fn normalize(raw: &Value, request: &NormalizeRequest) -> Result<Vec<QuoteRecord>, NormalizeError> {
    let symbol = request.symbol.as_str();
    match request.kind {
        DataKind::Realtime => snapshot::normalize_realtime(raw, symbol, request.fetched_at),
        DataKind::Info => snapshot::normalize_info(raw, symbol, request.fetched_at),
        DataKind::Bars { period, adjust } => {
            kline::normalize_bars(raw, symbol, period, adjust, &request.window)
        }
        DataKind::Rank => snapshot::normalize_rank(raw, request.fetched_at),
        DataKind::Board => snapshot::normalize_board(raw, request.fetched_at),
        DataKind::Indicator { .. } => Err(NormalizeError::UnexpectedShape(
            "指标由K线计算, 没有对应的原始响应".to_string(),
        )),
    }
}

/// 由K线序列计算最新一根K线上的指标
pub fn normalize_indicators(
    symbol: &str,
    period: BarPeriod,
    bars: &[Bar],
    params: &IndicatorParams,
) -> Result<Vec<QuoteRecord>, NormalizeError> {
    if bars.is_empty() {
        return Err(NormalizeError::NoData(format!("{} 没有可用K线", symbol)));
    }
    match indicator::compute_snapshot(symbol, period, bars, params) {
        Some(snapshot) => Ok(vec![QuoteRecord::Indicator(snapshot)]),
        None => Err(NormalizeError::NoUsableRecords {
            dropped: bars.len(),
        }),
    }
}
