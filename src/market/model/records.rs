//! 标准化后的行情记录
//!
//! 每种数据一个结构体，统一包进 [`QuoteRecord`]。记录构造后不再修改。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::market::model::data_kind::{Adjust, BarPeriod, DataKind};
use crate::time_util::{self, canonical};

/// 盘口一档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Option<f64>,
    /// 股数（已由手换算）
    pub volume: Option<f64>,
}

/// 实时行情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    pub symbol: String,
    /// 抓取时间
    #[serde(with = "canonical")]
    pub ts: NaiveDateTime,
    pub latest: Option<f64>,
    pub average: Option<f64>,
    pub change_pct: Option<f64>,
    pub change_amount: Option<f64>,
    /// 总手
    pub volume: Option<f64>,
    pub amount: Option<f64>,
    pub turnover: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub limit_up: Option<f64>,
    pub limit_down: Option<f64>,
    /// 外盘
    pub outer_volume: Option<f64>,
    /// 内盘
    pub inner_volume: Option<f64>,
    /// 买一 ~ 买五
    pub bids: Vec<BookLevel>,
    /// 卖一 ~ 卖五
    pub asks: Vec<BookLevel>,
}

/// 个股基本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    #[serde(with = "canonical")]
    pub ts: NaiveDateTime,
    pub name: Option<String>,
    pub industry: Option<String>,
    /// SH / SZ
    pub market: String,
    pub total_shares: Option<f64>,
    pub float_shares: Option<f64>,
    pub total_market_value: Option<f64>,
    pub float_market_value: Option<f64>,
    /// YYYY-MM-DD
    pub listing_date: Option<String>,
}

/// K线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub period: BarPeriod,
    pub adjust: Adjust,
    #[serde(with = "canonical")]
    pub ts: NaiveDateTime,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub amount: Option<f64>,
    pub amplitude: Option<f64>,
    pub change_pct: Option<f64>,
    pub change_amount: Option<f64>,
    pub turnover: Option<f64>,
    /// 分时均价，仅 1 分钟数据有
    pub average: Option<f64>,
}

impl Bar {
    /// 开高低收齐全时返回 (open, high, low, close)
    pub fn ohlc(&self) -> Option<(f64, f64, f64, f64)> {
        match (self.open, self.high, self.low, self.close) {
            (Some(o), Some(h), Some(l), Some(c)) => Some((o, h, l, c)),
            _ => None,
        }
    }
}

/// 三态信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageReading {
    pub window: usize,
    pub ema: Option<f64>,
    pub sma: Option<f64>,
}

/// 单个指标的解读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSignal {
    pub name: String,
    pub value: String,
    pub signal: Signal,
}

/// 最新一根K线上的技术指标读数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub period: BarPeriod,
    /// 最新K线时间
    #[serde(with = "canonical")]
    pub ts: NaiveDateTime,
    pub close: f64,
    pub moving_averages: Vec<MovingAverageReading>,
    pub k: Option<f64>,
    pub d: Option<f64>,
    pub j: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    /// 由近到远
    pub supports: Vec<f64>,
    /// 由近到远
    pub resistances: Vec<f64>,
    pub signals: Vec<IndicatorSignal>,
}

/// 人气榜条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    /// 股票代码，不带市场前缀
    pub symbol: String,
    /// 刷新时间
    #[serde(with = "canonical")]
    pub ts: NaiveDateTime,
    pub rank: Option<i64>,
    pub market: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change_amount: Option<f64>,
    pub change_pct: Option<f64>,
}

/// 概念板块概况
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSummary {
    /// 板块代码
    pub symbol: String,
    #[serde(with = "canonical")]
    pub ts: NaiveDateTime,
    pub rank: Option<i64>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change_amount: Option<f64>,
    pub change_pct: Option<f64>,
    pub total_market_value: Option<f64>,
    pub turnover: Option<f64>,
    pub rising_count: Option<i64>,
    pub falling_count: Option<i64>,
    pub leading_stock: Option<String>,
    pub leading_stock_change_pct: Option<f64>,
}

/// 自然键：同一数据种类内唯一
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub symbol: String,
    pub ts: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteRecord {
    Realtime(RealtimeQuote),
    Info(StockInfo),
    Bar(Bar),
    Indicator(IndicatorSnapshot),
    Rank(RankEntry),
    Board(BoardSummary),
}

impl QuoteRecord {
    pub fn symbol(&self) -> &str {
        match self {
            QuoteRecord::Realtime(r) => &r.symbol,
            QuoteRecord::Info(r) => &r.symbol,
            QuoteRecord::Bar(r) => &r.symbol,
            QuoteRecord::Indicator(r) => &r.symbol,
            QuoteRecord::Rank(r) => &r.symbol,
            QuoteRecord::Board(r) => &r.symbol,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            QuoteRecord::Realtime(r) => r.ts,
            QuoteRecord::Info(r) => r.ts,
            QuoteRecord::Bar(r) => r.ts,
            QuoteRecord::Indicator(r) => r.ts,
            QuoteRecord::Rank(r) => r.ts,
            QuoteRecord::Board(r) => r.ts,
        }
    }

    /// 记录所属的数据种类
    pub fn kind(&self) -> DataKind {
        match self {
            QuoteRecord::Realtime(_) => DataKind::Realtime,
            QuoteRecord::Info(_) => DataKind::Info,
            QuoteRecord::Bar(b) => DataKind::Bars {
                period: b.period,
                adjust: b.adjust,
            },
            QuoteRecord::Indicator(i) => DataKind::Indicator { period: i.period },
            QuoteRecord::Rank(_) => DataKind::Rank,
            QuoteRecord::Board(_) => DataKind::Board,
        }
    }

    /// K线和指标按 (symbol, ts)，其余按 symbol
    pub fn natural_key(&self) -> NaturalKey {
        let ts = match self {
            QuoteRecord::Bar(r) => Some(r.ts),
            QuoteRecord::Indicator(r) => Some(r.ts),
            _ => None,
        };
        NaturalKey {
            symbol: self.symbol().to_string(),
            ts,
        }
    }

    /// 落库前的类型校验，必填数值缺失的记录不写入
    pub fn validate_for_storage(&self) -> Result<(), String> {
        if self.symbol().trim().is_empty() {
            return Err("symbol 为空".to_string());
        }
        match self {
            QuoteRecord::Bar(b) if b.ohlc().is_none() => Err(format!(
                "K线开高低收不完整: {} {}",
                b.symbol,
                time_util::format_canonical(&b.ts)
            )),
            QuoteRecord::Realtime(r) if r.latest.is_none() => {
                Err(format!("实时行情缺少最新价: {}", r.symbol))
            }
            QuoteRecord::Rank(r) if r.rank.is_none() => Err(format!("人气榜缺少排名: {}", r.symbol)),
            QuoteRecord::Indicator(i) if !i.close.is_finite() => {
                Err(format!("指标收盘价非法: {}", i.symbol))
            }
            _ => Ok(()),
        }
    }
}

/// 数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Cache,
    Provider,
    Store,
}

/// 一次调用返回的记录集合
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSet {
    pub kind: DataKind,
    pub source: RecordSource,
    pub records: Vec<QuoteRecord>,
}

impl RecordSet {
    pub fn new(kind: DataKind, source: RecordSource, records: Vec<QuoteRecord>) -> Self {
        Self {
            kind,
            source,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.records.iter().filter_map(|r| match r {
            QuoteRecord::Bar(b) => Some(b),
            _ => None,
        })
    }
}
