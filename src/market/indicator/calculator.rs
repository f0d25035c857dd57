use ta::indicators::{
    ExponentialMovingAverage, FastStochastic, SimpleMovingAverage,
};
use ta::Next;
use tracing::debug;

use crate::market::indicator::candle::Candle;
use crate::market::indicator::support_resistance::find_support_resistance;
use crate::market::model::{
    Bar, BarPeriod, IndicatorSignal, IndicatorSnapshot, MovingAverageReading, Signal,
};

const STOCH_PERIOD: usize = 14;
const STOCH_SMOOTH: usize = 3;
const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    /// 参与计算的最近K线数
    pub lookback_bars: usize,
    pub ma_windows: Vec<usize>,
    /// 支撑/阻力的局部极值半径
    pub sr_radius: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            lookback_bars: 50,
            ma_windows: vec![5, 10, 20, 30, 40, 50],
            sr_radius: 5,
        }
    }
}

/// K线数不足窗口时返回 None
fn gated(value: f64, available: usize, required: usize) -> Option<f64> {
    (available >= required && value.is_finite()).then_some(value)
}

fn last_ema(closes: &[f64], window: usize) -> Option<f64> {
    let mut ema = ExponentialMovingAverage::new(window).ok()?;
    let value = closes.iter().fold(f64::NAN, |_, c| ema.next(*c));
    gated(value, closes.len(), window)
}

fn last_sma(closes: &[f64], window: usize) -> Option<f64> {
    let mut sma = SimpleMovingAverage::new(window).ok()?;
    let value = closes.iter().fold(f64::NAN, |_, c| sma.next(*c));
    gated(value, closes.len(), window)
}

/// 返回 (K, D, J)，D 为 K 的 3 日均线，J = 3K - 2D
fn last_kdj(candles: &[Candle]) -> (Option<f64>, Option<f64>, Option<f64>) {
    let (Ok(mut stoch), Ok(mut smooth)) = (
        FastStochastic::new(STOCH_PERIOD),
        SimpleMovingAverage::new(STOCH_SMOOTH),
    ) else {
        return (None, None, None);
    };
    let mut k = f64::NAN;
    let mut d = f64::NAN;
    for (i, candle) in candles.iter().enumerate() {
        k = stoch.next(candle);
        // 只用完整窗口的 K 值做平滑
        if i + 1 >= STOCH_PERIOD {
            d = smooth.next(k);
        }
    }
    let k = gated(k, candles.len(), STOCH_PERIOD);
    let d = gated(d, candles.len(), STOCH_PERIOD + STOCH_SMOOTH - 1);
    let j = match (k, d) {
        (Some(k), Some(d)) => Some(3.0 * k - 2.0 * d),
        _ => None,
    };
    (k, d, j)
}

/// 权重为 1/period 的指数平滑（Wilder）
fn wilder(period: usize) -> Option<ExponentialMovingAverage> {
    ExponentialMovingAverage::new(2 * period - 1).ok()
}

/// 涨跌幅分别做 Wilder 平滑，第一根的涨跌按 0 计
fn last_rsi(closes: &[f64]) -> Option<f64> {
    let (mut gain, mut loss) = (wilder(RSI_PERIOD)?, wilder(RSI_PERIOD)?);
    let (mut avg_gain, mut avg_loss) = (f64::NAN, f64::NAN);
    let mut prev: Option<f64> = None;
    for &close in closes {
        let change = prev.map_or(0.0, |p| close - p);
        avg_gain = gain.next(change.max(0.0));
        avg_loss = loss.next((-change).max(0.0));
        prev = Some(close);
    }
    let value = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 * avg_gain / (avg_gain + avg_loss)
    };
    gated(value, closes.len(), RSI_PERIOD)
}

/// 返回 (MACD, signal, histogram)，signal 从第一个完整的 MACD 值开始平滑
fn last_macd(closes: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>) {
    let (Ok(mut fast), Ok(mut slow), Ok(mut smooth)) = (
        ExponentialMovingAverage::new(MACD_FAST),
        ExponentialMovingAverage::new(MACD_SLOW),
        ExponentialMovingAverage::new(MACD_SIGNAL),
    ) else {
        return (None, None, None);
    };
    let mut macd = f64::NAN;
    let mut signal = f64::NAN;
    for (i, &close) in closes.iter().enumerate() {
        macd = fast.next(close) - slow.next(close);
        if i + 1 >= MACD_SLOW {
            signal = smooth.next(macd);
        }
    }
    let signal_ready = MACD_SLOW + MACD_SIGNAL - 1;
    (
        gated(macd, closes.len(), MACD_SLOW),
        gated(signal, closes.len(), signal_ready),
        gated(macd - signal, closes.len(), signal_ready),
    )
}

fn above_below(value: f64, reference: Option<f64>) -> Signal {
    match reference {
        Some(r) if value > r => Signal::Buy,
        Some(r) if value < r => Signal::Sell,
        _ => Signal::Neutral,
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn interpret(snapshot: &IndicatorSnapshot) -> Vec<IndicatorSignal> {
    let mut signals = Vec::with_capacity(snapshot.moving_averages.len() * 2 + 3);
    for ma in &snapshot.moving_averages {
        signals.push(IndicatorSignal {
            name: format!("EMA{}", ma.window),
            value: fmt_opt(ma.ema),
            signal: above_below(snapshot.close, ma.ema),
        });
        signals.push(IndicatorSignal {
            name: format!("SMA{}", ma.window),
            value: fmt_opt(ma.sma),
            signal: above_below(snapshot.close, ma.sma),
        });
    }

    let kdj_signal = match snapshot.k {
        Some(k) => above_below(k, snapshot.d),
        None => Signal::Neutral,
    };
    signals.push(IndicatorSignal {
        name: "KDJ".to_string(),
        value: format!(
            "K:{}, D:{}, J:{}",
            fmt_opt(snapshot.k),
            fmt_opt(snapshot.d),
            fmt_opt(snapshot.j)
        ),
        signal: kdj_signal,
    });

    let rsi_signal = match snapshot.rsi {
        Some(v) if v > RSI_OVERBOUGHT => Signal::Sell,
        Some(v) if v < RSI_OVERSOLD => Signal::Buy,
        _ => Signal::Neutral,
    };
    signals.push(IndicatorSignal {
        name: "RSI".to_string(),
        value: fmt_opt(snapshot.rsi),
        signal: rsi_signal,
    });

    let macd_signal = match (snapshot.macd, snapshot.macd_signal) {
        (Some(m), Some(s)) if m > s => Signal::Buy,
        (Some(_), Some(_)) => Signal::Sell,
        _ => Signal::Neutral,
    };
    signals.push(IndicatorSignal {
        name: "MACD".to_string(),
        value: format!(
            "MACD:{}, Signal:{}, Histogram:{}",
            fmt_opt(snapshot.macd),
            fmt_opt(snapshot.macd_signal),
            fmt_opt(snapshot.macd_histogram)
        ),
        signal: macd_signal,
    });
    signals
}

/// 在最近 `lookback_bars` 根完整K线上计算指标，没有完整K线时返回 None
pub fn compute_snapshot(
    symbol: &str,
    period: BarPeriod,
    bars: &[Bar],
    params: &IndicatorParams,
) -> Option<IndicatorSnapshot> {
    let mut candles: Vec<Candle> = bars.iter().filter_map(Candle::from_bar).collect();
    candles.sort_by_key(|c| c.ts);
    let skip = candles.len().saturating_sub(params.lookback_bars);
    let candles = &candles[skip..];
    let latest = candles.last()?;
    debug!(
        "{} {} 计算指标, 使用 {} 根K线",
        symbol,
        period,
        candles.len()
    );

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();

    let moving_averages = params
        .ma_windows
        .iter()
        .map(|&window| MovingAverageReading {
            window,
            ema: last_ema(&closes, window),
            sma: last_sma(&closes, window),
        })
        .collect();
    let (k, d, j) = last_kdj(candles);
    let (macd, macd_signal, macd_histogram) = last_macd(&closes);
    let (supports, resistances) =
        find_support_resistance(&lows, &highs, latest.close, params.sr_radius);

    let mut snapshot = IndicatorSnapshot {
        symbol: symbol.to_string(),
        period,
        ts: latest.ts,
        close: latest.close,
        moving_averages,
        k,
        d,
        j,
        rsi: last_rsi(&closes),
        macd,
        macd_signal,
        macd_histogram,
        supports,
        resistances,
        signals: Vec::new(),
    };
    snapshot.signals = interpret(&snapshot);
    Some(snapshot)
}
