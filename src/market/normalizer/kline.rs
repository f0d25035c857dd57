use serde_json::Value;
use tracing::{debug, warn};

use crate::error::NormalizeError;
use crate::market::model::{Adjust, Bar, BarPeriod, QuoteRecord};
use crate::market::normalizer::coerce::parse_number;
use crate::time_util::{self, TimeWindow};

/// K线 CSV 行：时间,开盘,收盘,最高,最低,成交量,成交额,振幅,涨跌幅,涨跌额,换手率
/// 分时 CSV 行：时间,开盘,收盘,最高,最低,成交量,成交额,均价
pub fn normalize_bars(
    raw: &Value,
    symbol: &str,
    period: BarPeriod,
    adjust: Adjust,
    window: &TimeWindow,
) -> Result<Vec<QuoteRecord>, NormalizeError> {
    if !raw.is_object() {
        return Err(NormalizeError::UnexpectedShape(
            "K线响应不是 JSON 对象".to_string(),
        ));
    }
    let list_key = if period == BarPeriod::Min1 {
        "trends"
    } else {
        "klines"
    };
    let rows = match raw.get("data") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(data)) => match data.get(list_key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(rows)) => rows,
            Some(_) => {
                return Err(NormalizeError::UnexpectedShape(format!(
                    "data.{} 不是数组",
                    list_key
                )))
            }
        },
        Some(_) => {
            return Err(NormalizeError::UnexpectedShape(
                "data 不是对象".to_string(),
            ))
        }
    };

    let mut bars = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        match row.as_str().and_then(|line| parse_row(line, symbol, period, adjust)) {
            Some(bar) => {
                if window.contains(&bar.ts) {
                    bars.push(QuoteRecord::Bar(bar));
                }
            }
            None => {
                dropped += 1;
                debug!("丢弃无法解析的K线: {}", row);
            }
        }
    }

    if !rows.is_empty() && dropped == rows.len() {
        return Err(NormalizeError::NoUsableRecords { dropped });
    }
    if dropped > 0 {
        warn!("{} {} 丢弃了 {} 条无法解析的K线", symbol, period, dropped);
    }
    Ok(bars)
}

fn parse_row(line: &str, symbol: &str, period: BarPeriod, adjust: Adjust) -> Option<Bar> {
    let cols: Vec<&str> = line.split(',').collect();
    let ts = time_util::parse_timestamp(cols.first()?)?;
    let col = |i: usize| cols.get(i).and_then(|s| parse_number(s));

    let mut bar = Bar {
        symbol: symbol.to_string(),
        period,
        adjust,
        ts,
        open: col(1),
        close: col(2),
        high: col(3),
        low: col(4),
        volume: col(5),
        amount: col(6),
        amplitude: None,
        change_pct: None,
        change_amount: None,
        turnover: None,
        average: None,
    };
    if period == BarPeriod::Min1 {
        bar.average = col(7);
    } else {
        bar.amplitude = col(7);
        bar.change_pct = col(8);
        bar.change_amount = col(9);
        bar.turnover = col(10);
    }
    Some(bar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn daily_payload() -> Value {
        json!({
            "rc": 0,
            "data": {
                "code": "600900",
                "klines": [
                    "2023-07-03,23.10,23.35,23.50,23.00,412345,962345678.00,2.17,1.08,0.25,0.18",
                    "2023-07-04,23.35,23.20,23.40,23.05,398765,925678901.00,1.50,-0.64,-0.15,0.17",
                    "2023-07-05,23.20,-,23.30,23.10,0,0.00,0.86,-,-,0.00"
                ]
            }
        })
    }

    #[test]
    fn test_daily_klines_are_canonicalized() {
        let window = TimeWindow::unbounded();
        let records =
            normalize_bars(&daily_payload(), "600900", BarPeriod::Daily, Adjust::Forward, &window)
                .unwrap();
        assert_eq!(records.len(), 3);
        let QuoteRecord::Bar(first) = &records[0] else {
            panic!("expected bar");
        };
        assert_eq!(time_util::format_canonical(&first.ts), "2023-07-03 00:00:00");
        assert_eq!(first.close, Some(23.35));
        assert_eq!(first.turnover, Some(0.18));
        assert_eq!(first.adjust, Adjust::Forward);

        // 非数值列变成缺失，不影响整行
        let QuoteRecord::Bar(third) = &records[2] else {
            panic!("expected bar");
        };
        assert_eq!(third.close, None);
        assert_eq!(third.change_pct, None);
        assert_eq!(third.open, Some(23.20));
    }

    #[test]
    fn test_window_drops_outside_rows() {
        let window = TimeWindow::from_bounds(Some("2023-07-04"), Some("2023-07-04")).unwrap();
        let records =
            normalize_bars(&daily_payload(), "600900", BarPeriod::Daily, Adjust::None, &window)
                .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol(), "600900");
    }

    #[test]
    fn test_minute_window_uses_time_of_day() {
        let payload = json!({
            "data": {
                "klines": [
                    "2025-07-09 13:00,23.1,23.2,23.3,23.0,100,1000,0.1,0.2,0.3,0.01",
                    "2025-07-09 14:00,23.2,23.3,23.4,23.1,100,1000,0.1,0.2,0.3,0.01",
                    "2025-07-09 15:05,23.3,23.4,23.5,23.2,100,1000,0.1,0.2,0.3,0.01"
                ]
            }
        });
        let window =
            TimeWindow::from_bounds(Some("2025-07-09 13:00:00"), Some("2025-07-09 15:00:00"))
                .unwrap();
        let records =
            normalize_bars(&payload, "600900", BarPeriod::Min15, Adjust::None, &window).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_trends_carry_average_price() {
        let payload = json!({
            "data": {
                "trends": ["2025-07-09 09:31,23.10,23.12,23.15,23.08,1200,2774400.00,23.115"]
            }
        });
        let records = normalize_bars(
            &payload,
            "600900",
            BarPeriod::Min1,
            Adjust::None,
            &TimeWindow::unbounded(),
        )
        .unwrap();
        let QuoteRecord::Bar(bar) = &records[0] else {
            panic!("expected bar");
        };
        assert_eq!(bar.average, Some(23.115));
        assert_eq!(bar.amplitude, None);
    }

    #[test]
    fn test_empty_and_invalid_payloads() {
        let window = TimeWindow::unbounded();
        let empty = json!({"rc": 0, "data": null});
        assert!(normalize_bars(&empty, "600900", BarPeriod::Daily, Adjust::None, &window)
            .unwrap()
            .is_empty());

        let garbage = json!({"data": {"klines": ["not-a-date,1,2,3,4", 42]}});
        assert_eq!(
            normalize_bars(&garbage, "600900", BarPeriod::Daily, Adjust::None, &window),
            Err(NormalizeError::NoUsableRecords { dropped: 2 })
        );

        let wrong = json!({"data": {"klines": "oops"}});
        assert!(matches!(
            normalize_bars(&wrong, "600900", BarPeriod::Daily, Adjust::None, &window),
            Err(NormalizeError::UnexpectedShape(_))
        ));
    }
}
