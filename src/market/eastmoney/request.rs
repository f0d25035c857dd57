//! 东方财富接口的请求构造
//!
//! 地址、参数、字段代码都集中在这里，流水线只看到 [`ProviderRequest`]。

use serde_json::{json, Value};

use crate::market::model::{Adjust, BarPeriod};
use crate::time_util::{self, TimeWindow};

pub const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";
pub const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
pub const TRENDS_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/trends2/get";
pub const BOARD_URL: &str = "https://79.push2.eastmoney.com/api/qt/clist/get";
pub const RANK_URL: &str = "https://emappdata.eastmoney.com/stockrank/getAllCurrentList";
pub const ULIST_URL: &str = "https://push2.eastmoney.com/api/qt/ulist.np/get";

const KLINE_UT: &str = "7eea3edcaed734bea9cbfc24409ed989";
const INFO_UT: &str = "fa5fd1943c7b386f172d6893dbfba10b";
const BOARD_UT: &str = "bd1d9ddb04089700cf9c27f6f7426281";
const ULIST_UT: &str = "f057cbcbce2a86e2866ab8877db1d059";

/// 实时行情字段
pub mod realtime_fields {
    pub const LATEST: &str = "f43";
    pub const AVERAGE: &str = "f71";
    pub const CHANGE_PCT: &str = "f170";
    pub const CHANGE_AMOUNT: &str = "f169";
    pub const VOLUME: &str = "f47";
    pub const AMOUNT: &str = "f48";
    pub const TURNOVER: &str = "f168";
    pub const VOLUME_RATIO: &str = "f50";
    pub const HIGH: &str = "f44";
    pub const LOW: &str = "f45";
    pub const OPEN: &str = "f46";
    pub const PREV_CLOSE: &str = "f60";
    pub const LIMIT_UP: &str = "f51";
    pub const LIMIT_DOWN: &str = "f52";
    pub const OUTER_VOLUME: &str = "f49";
    pub const INNER_VOLUME: &str = "f161";
    /// 买一 ~ 买五 (价, 量)
    pub const BIDS: [(&str, &str); 5] = [
        ("f19", "f20"),
        ("f17", "f18"),
        ("f15", "f16"),
        ("f13", "f14"),
        ("f11", "f12"),
    ];
    /// 卖一 ~ 卖五 (价, 量)
    pub const ASKS: [(&str, &str); 5] = [
        ("f39", "f40"),
        ("f37", "f38"),
        ("f35", "f36"),
        ("f33", "f34"),
        ("f31", "f32"),
    ];
}

/// 个股信息字段
pub mod info_fields {
    pub const CODE: &str = "f57";
    pub const NAME: &str = "f58";
    pub const TOTAL_SHARES: &str = "f84";
    pub const FLOAT_SHARES: &str = "f85";
    pub const INDUSTRY: &str = "f127";
    pub const TOTAL_MARKET_VALUE: &str = "f116";
    pub const FLOAT_MARKET_VALUE: &str = "f117";
    pub const LISTING_DATE: &str = "f189";
}

/// 板块列表字段
pub mod board_fields {
    pub const PRICE: &str = "f2";
    pub const CHANGE_PCT: &str = "f3";
    pub const CHANGE_AMOUNT: &str = "f4";
    pub const TURNOVER: &str = "f8";
    pub const CODE: &str = "f12";
    pub const NAME: &str = "f14";
    pub const TOTAL_MARKET_VALUE: &str = "f20";
    pub const RISING: &str = "f104";
    pub const FALLING: &str = "f105";
    pub const LEADING_STOCK: &str = "f128";
    pub const LEADING_STOCK_PCT: &str = "f136";
}

/// 批量报价字段
pub mod ulist_fields {
    pub const PRICE: &str = "f2";
    pub const CHANGE_PCT: &str = "f3";
    pub const CODE: &str = "f12";
    pub const NAME: &str = "f14";
}

const REALTIME_FIELDS: &str = "f11,f12,f13,f14,f15,f16,f17,f18,f19,f20,f31,f32,f33,f34,f35,f36,\
f37,f38,f39,f40,f43,f44,f45,f46,f47,f48,f49,f50,f51,f52,f57,f58,f60,f71,f161,f168,f169,f170";

/// 一次对数据源的请求
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    /// 有 body 时以 JSON POST 发送
    pub body: Option<Value>,
}

impl ProviderRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            body: Some(body),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 6 开头为沪市
pub fn is_shanghai(symbol: &str) -> bool {
    symbol.starts_with('6')
}

pub fn market_of(symbol: &str) -> &'static str {
    if is_shanghai(symbol) {
        "SH"
    } else {
        "SZ"
    }
}

/// `1.600900` / `0.000001`
pub fn secid(symbol: &str) -> String {
    format!("{}.{}", if is_shanghai(symbol) { 1 } else { 0 }, symbol)
}

/// 人气榜代码 `SZ000001` 转为 secid
pub fn secid_from_market_code(code: &str) -> Option<String> {
    let market = code.get(..2)?;
    let symbol = code.get(2..)?;
    if symbol.is_empty() {
        return None;
    }
    match market {
        "SZ" => Some(format!("0.{}", symbol)),
        "SH" => Some(format!("1.{}", symbol)),
        _ => None,
    }
}

pub fn realtime_request(symbol: &str) -> ProviderRequest {
    ProviderRequest::get(QUOTE_URL)
        .param("fltt", "2")
        .param("invt", "2")
        .param("fields", REALTIME_FIELDS)
        .param("secid", secid(symbol))
}

pub fn info_request(symbol: &str) -> ProviderRequest {
    ProviderRequest::get(QUOTE_URL)
        .param("ut", INFO_UT)
        .param("fltt", "2")
        .param("invt", "2")
        .param("fields", "f57,f58,f84,f85,f127,f116,f117,f189")
        .param("secid", secid(symbol))
}

fn adjust_code(adjust: Adjust) -> &'static str {
    match adjust {
        Adjust::None => "0",
        Adjust::Forward => "1",
        Adjust::Backward => "2",
    }
}

fn klt(period: BarPeriod) -> &'static str {
    match period {
        BarPeriod::Min1 => "1",
        BarPeriod::Min5 => "5",
        BarPeriod::Min15 => "15",
        BarPeriod::Min30 => "30",
        BarPeriod::Min60 => "60",
        BarPeriod::Daily => "101",
        BarPeriod::Weekly => "102",
        BarPeriod::Monthly => "103",
    }
}

/// K线请求。1 分钟走分时接口，其余分钟周期取全部数据后在本地按窗口过滤
pub fn bars_request(
    symbol: &str,
    period: BarPeriod,
    adjust: Adjust,
    window: &TimeWindow,
) -> ProviderRequest {
    if period == BarPeriod::Min1 {
        return ProviderRequest::get(TRENDS_URL)
            .param("fields1", "f1,f2,f3,f4,f5,f6,f7,f8,f9,f10,f11,f12,f13")
            .param("fields2", "f51,f52,f53,f54,f55,f56,f57,f58")
            .param("ut", KLINE_UT)
            .param("ndays", "10")
            .param("iscr", "0")
            .param("secid", secid(symbol));
    }

    let (beg, end) = if period.is_intraday() {
        ("0".to_string(), "20500000".to_string())
    } else {
        (
            time_util::compact_date(&window.start),
            time_util::compact_date(&window.end),
        )
    };
    ProviderRequest::get(KLINE_URL)
        .param("fields1", "f1,f2,f3,f4,f5,f6")
        .param("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61")
        .param("ut", KLINE_UT)
        .param("klt", klt(period))
        .param("fqt", adjust_code(adjust))
        .param("secid", secid(symbol))
        .param("beg", beg)
        .param("end", end)
}

pub fn board_request() -> ProviderRequest {
    ProviderRequest::get(BOARD_URL)
        .param("pn", "1")
        .param("pz", "50000")
        .param("po", "1")
        .param("np", "2")
        .param("ut", BOARD_UT)
        .param("fltt", "2")
        .param("invt", "2")
        .param("fid", "f3")
        .param("fs", "m:90 t:3 f:!50")
        .param("fields", "f2,f3,f4,f8,f12,f14,f20,f104,f105,f128,f136")
}

/// 人气榜前 100
pub fn rank_list_request() -> ProviderRequest {
    ProviderRequest::post_json(
        RANK_URL,
        json!({
            "appId": "appId01",
            "globalId": "786e4c21-70dc-435a-93bb-38",
            "marketType": "",
            "pageNo": 1,
            "pageSize": 100,
        }),
    )
}

pub fn rank_quotes_request(secids: &[String]) -> ProviderRequest {
    ProviderRequest::get(ULIST_URL)
        .param("ut", ULIST_UT)
        .param("fltt", "2")
        .param("invt", "2")
        .param("fields", "f14,f3,f12,f2")
        .param("secids", secids.join(","))
}
