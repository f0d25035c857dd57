use chrono::NaiveDateTime;
use ta::{Close, High, Low, Open};

use crate::market::model::Bar;

/// 开高低收齐全的K线，供 `ta` 指标使用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub ts: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn from_bar(bar: &Bar) -> Option<Self> {
        let (open, high, low, close) = bar.ohlc()?;
        Some(Candle {
            ts: bar.ts,
            open,
            high,
            low,
            close,
        })
    }
}

impl Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}
