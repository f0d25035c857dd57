//! 快照类数据：实时行情、个股信息、板块、人气榜

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::NormalizeError;
use crate::market::eastmoney::request::{
    board_fields, info_fields, market_of, realtime_fields, secid_from_market_code, ulist_fields,
};
use crate::market::model::{
    BoardSummary, BookLevel, QuoteRecord, RankEntry, RealtimeQuote, StockInfo,
};
use crate::market::normalizer::coerce::{integer, lots_to_shares, number, text};
use crate::time_util;

/// 取出 `data` 对象，null 或缺失表示该代码没有数据
fn data_object<'a>(raw: &'a Value, what: &str) -> Result<&'a Map<String, Value>, NormalizeError> {
    let Some(root) = raw.as_object() else {
        return Err(NormalizeError::UnexpectedShape(format!(
            "{} 响应不是 JSON 对象",
            what
        )));
    };
    match root.get("data") {
        None | Some(Value::Null) => Err(NormalizeError::NoData(what.to_string())),
        Some(Value::Object(data)) => Ok(data),
        Some(_) => Err(NormalizeError::UnexpectedShape(format!(
            "{} 的 data 不是对象",
            what
        ))),
    }
}

fn book(data: &Map<String, Value>, levels: &[(&str, &str); 5]) -> Vec<BookLevel> {
    levels
        .iter()
        .map(|(price, volume)| BookLevel {
            price: number(data.get(*price)),
            volume: lots_to_shares(number(data.get(*volume))),
        })
        .collect()
}

pub fn normalize_realtime(
    raw: &Value,
    symbol: &str,
    fetched_at: NaiveDateTime,
) -> Result<Vec<QuoteRecord>, NormalizeError> {
    use realtime_fields::*;

    let data = data_object(raw, symbol)?;
    let field = |code: &str| number(data.get(code));
    let quote = RealtimeQuote {
        symbol: symbol.to_string(),
        ts: fetched_at,
        latest: field(LATEST),
        average: field(AVERAGE),
        change_pct: field(CHANGE_PCT),
        change_amount: field(CHANGE_AMOUNT),
        volume: field(VOLUME),
        amount: field(AMOUNT),
        turnover: field(TURNOVER),
        volume_ratio: field(VOLUME_RATIO),
        high: field(HIGH),
        low: field(LOW),
        open: field(OPEN),
        prev_close: field(PREV_CLOSE),
        limit_up: field(LIMIT_UP),
        limit_down: field(LIMIT_DOWN),
        outer_volume: field(OUTER_VOLUME),
        inner_volume: field(INNER_VOLUME),
        bids: book(data, &BIDS),
        asks: book(data, &ASKS),
    };
    Ok(vec![QuoteRecord::Realtime(quote)])
}

pub fn normalize_info(
    raw: &Value,
    symbol: &str,
    fetched_at: NaiveDateTime,
) -> Result<Vec<QuoteRecord>, NormalizeError> {
    use info_fields::*;

    let data = data_object(raw, symbol)?;
    let listing_date = text(data.get(LISTING_DATE))
        .and_then(|s| time_util::parse_date(&s))
        .map(|d| d.format("%Y-%m-%d").to_string());
    let info = StockInfo {
        symbol: text(data.get(CODE)).unwrap_or_else(|| symbol.to_string()),
        ts: fetched_at,
        name: text(data.get(NAME)),
        industry: text(data.get(INDUSTRY)),
        market: market_of(symbol).to_string(),
        total_shares: number(data.get(TOTAL_SHARES)),
        float_shares: number(data.get(FLOAT_SHARES)),
        total_market_value: number(data.get(TOTAL_MARKET_VALUE)),
        float_market_value: number(data.get(FLOAT_MARKET_VALUE)),
        listing_date,
    };
    Ok(vec![QuoteRecord::Info(info)])
}

/// `diff` 可能是数组，也可能是以序号为键的对象
fn diff_rows(data: &Map<String, Value>) -> Result<Vec<&Value>, NormalizeError> {
    match data.get("diff") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(rows)) => Ok(rows.iter().collect()),
        Some(Value::Object(rows)) => {
            let mut indexed: Vec<(u64, &Value)> = rows
                .iter()
                .map(|(k, v)| (k.parse::<u64>().unwrap_or(u64::MAX), v))
                .collect();
            indexed.sort_by_key(|(i, _)| *i);
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        Some(_) => Err(NormalizeError::UnexpectedShape(
            "data.diff 既不是数组也不是对象".to_string(),
        )),
    }
}

pub fn normalize_board(
    raw: &Value,
    fetched_at: NaiveDateTime,
) -> Result<Vec<QuoteRecord>, NormalizeError> {
    use board_fields::*;

    let data = data_object(raw, "概念板块")?;
    let rows = diff_rows(data)?;
    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let Some(code) = text(row.get(CODE)) else {
            continue;
        };
        records.push(QuoteRecord::Board(BoardSummary {
            symbol: code,
            ts: fetched_at,
            rank: Some(i as i64 + 1),
            name: text(row.get(NAME)),
            price: number(row.get(PRICE)),
            change_amount: number(row.get(CHANGE_AMOUNT)),
            change_pct: number(row.get(CHANGE_PCT)),
            total_market_value: number(row.get(TOTAL_MARKET_VALUE)),
            turnover: number(row.get(TURNOVER)),
            rising_count: integer(row.get(RISING)),
            falling_count: integer(row.get(FALLING)),
            leading_stock: text(row.get(LEADING_STOCK)),
            leading_stock_change_pct: number(row.get(LEADING_STOCK_PCT)),
        }));
    }
    if !rows.is_empty() && records.is_empty() {
        return Err(NormalizeError::NoUsableRecords {
            dropped: rows.len(),
        });
    }
    Ok(records)
}

fn rank_rows(ranks: &Value) -> Result<Vec<&Value>, NormalizeError> {
    let Some(root) = ranks.as_object() else {
        return Err(NormalizeError::UnexpectedShape(
            "人气榜响应不是 JSON 对象".to_string(),
        ));
    };
    match root.get("data") {
        None | Some(Value::Null) => Err(NormalizeError::NoData("人气榜".to_string())),
        Some(Value::Array(rows)) => Ok(rows.iter().collect()),
        Some(_) => Err(NormalizeError::UnexpectedShape(
            "人气榜 data 不是数组".to_string(),
        )),
    }
}

/// 从人气榜列表里取出批量报价需要的 secid
pub fn rank_secids(ranks: &Value) -> Result<Vec<String>, NormalizeError> {
    Ok(rank_rows(ranks)?
        .into_iter()
        .filter_map(|row| text(row.get("sc")))
        .filter_map(|sc| secid_from_market_code(&sc))
        .collect())
}

/// 输入为 `{"ranks": 人气榜响应, "quotes": 批量报价响应}`，按代码关联
pub fn normalize_rank(
    raw: &Value,
    fetched_at: NaiveDateTime,
) -> Result<Vec<QuoteRecord>, NormalizeError> {
    let ranks = raw
        .get("ranks")
        .ok_or_else(|| NormalizeError::UnexpectedShape("缺少 ranks".to_string()))?;
    let rows = rank_rows(ranks)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut quotes: HashMap<String, &Value> = HashMap::new();
    if let Some(Value::Object(data)) = raw.get("quotes").and_then(|q| q.get("data")) {
        for row in diff_rows(data)? {
            if let Some(code) = text(row.get(ulist_fields::CODE)) {
                quotes.insert(code, row);
            }
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(sc) = text(row.get("sc")) else {
            continue;
        };
        let (Some(market), Some(symbol)) = (sc.get(..2), sc.get(2..)) else {
            continue;
        };
        if symbol.is_empty() {
            continue;
        }
        let quote = quotes.get(symbol);
        let price = quote.and_then(|q| number(q.get(ulist_fields::PRICE)));
        let change_pct = quote.and_then(|q| number(q.get(ulist_fields::CHANGE_PCT)));
        let change_amount = match (price, change_pct) {
            (Some(p), Some(pct)) => Some(p * pct / 100.0),
            _ => None,
        };
        records.push(QuoteRecord::Rank(RankEntry {
            symbol: symbol.to_string(),
            ts: fetched_at,
            rank: integer(row.get("rk")),
            market: market.to_string(),
            name: quote.and_then(|q| text(q.get(ulist_fields::NAME))),
            price,
            change_amount,
            change_pct,
        }));
    }

    if records.is_empty() {
        return Err(NormalizeError::NoUsableRecords {
            dropped: rows.len(),
        });
    }
    let missing = records
        .iter()
        .filter(|r| matches!(r, QuoteRecord::Rank(e) if e.price.is_none()))
        .count();
    if missing > 0 {
        warn!("人气榜有 {} 只股票没有报价", missing);
    }
    Ok(records)
}
