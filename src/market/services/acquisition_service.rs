//! 行情获取流水线
//!
//! 查缓存 → 未命中则请求数据源（带重试）→ 标准化 → 写缓存 → 落库 → 返回。
//! 写缓存和落库失败只记录日志；标准化失败返回给调用方。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::error::PipelineError;
use crate::market::cache::{keys, CacheStore};
use crate::market::eastmoney::{request, ProviderRequest, RawPayload, Transport};
use crate::market::indicator::IndicatorParams;
use crate::market::model::{
    Adjust, BarPeriod, DataKind, QuoteRecord, RecordSet, RecordSource,
};
use crate::market::normalizer::{self, NormalizeRequest};
use crate::market::repository::QuoteStore;
use crate::market::retry::BackoffExecutor;
use crate::time_util::TimeWindow;

/// 每次调用的缓存/落库开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub use_cache: bool,
    pub persist: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub symbol: String,
    pub period: BarPeriod,
    /// `YYYY-MM-DD` 或 `YYYY-MM-DD HH:MM:SS`，缺省为 1970-01-01
    pub start: Option<String>,
    /// 缺省为 2099-12-31
    pub end: Option<String>,
    pub adjust: Adjust,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorQuery {
    pub symbol: String,
    pub period: BarPeriod,
    /// 缺省为今天
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// 单次请求超时
    pub request_timeout: Duration,
    /// 指标取多少个自然日的K线
    pub indicator_lookback_days: i64,
    pub indicator: IndicatorParams,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.api.timeout,
            ..Self::default()
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            indicator_lookback_days: 100,
            indicator: IndicatorParams::default(),
        }
    }
}

fn now_seconds() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn check_symbol(symbol: &str) -> Result<(), PipelineError> {
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PipelineError::InvalidRequest(format!(
            "非法的股票代码: {:?}",
            symbol
        )));
    }
    Ok(())
}

/// 离开作用域时删除没有其他请求在等的锁，调用方中途取消也会执行
struct LockCleanup<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
}

impl Drop for LockCleanup<'_> {
    fn drop(&mut self) {
        // 剩下的引用只有表里的和本次调用的
        self.locks
            .remove_if(self.key, |_, l| Arc::strong_count(l) <= 2);
    }
}

pub struct AcquisitionService {
    transport: Arc<dyn Transport>,
    cache: Arc<CacheStore>,
    store: Arc<dyn QuoteStore>,
    executor: BackoffExecutor,
    settings: ServiceSettings,
    /// 同一缓存键的并发未命中排队，只请求一次
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AcquisitionService {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<CacheStore>,
        store: Arc<dyn QuoteStore>,
        executor: BackoffExecutor,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            transport,
            cache,
            store,
            executor,
            settings,
            fetch_locks: DashMap::new(),
        }
    }

    /// 实时行情
    pub async fn realtime_quote(
        &self,
        symbol: &str,
        opts: FetchOptions,
    ) -> Result<RecordSet, PipelineError> {
        check_symbol(symbol)?;
        let kind = DataKind::Realtime;
        self.acquire(kind, keys::realtime_key(symbol), opts, || async move {
            let raw = self.fetch(request::realtime_request(symbol)).await?;
            let req = NormalizeRequest::new(kind, symbol, now_seconds());
            normalizer::normalize(&raw, &req).map_err(PipelineError::from)
        })
        .await
    }

    /// 个股基本信息
    pub async fn stock_info(
        &self,
        symbol: &str,
        opts: FetchOptions,
    ) -> Result<RecordSet, PipelineError> {
        check_symbol(symbol)?;
        let kind = DataKind::Info;
        self.acquire(kind, keys::info_key(symbol), opts, || async move {
            let raw = self.fetch(request::info_request(symbol)).await?;
            let req = NormalizeRequest::new(kind, symbol, now_seconds());
            normalizer::normalize(&raw, &req).map_err(PipelineError::from)
        })
        .await
    }

    /// 历史K线
    pub async fn history_quote(
        &self,
        query: &HistoryQuery,
        opts: FetchOptions,
    ) -> Result<RecordSet, PipelineError> {
        check_symbol(&query.symbol)?;
        let window = TimeWindow::from_bounds(query.start.as_deref(), query.end.as_deref())
            .map_err(PipelineError::InvalidRequest)?;
        self.bars(&query.symbol, query.period, query.adjust, window, opts)
            .await
    }

    async fn bars(
        &self,
        symbol: &str,
        period: BarPeriod,
        adjust: Adjust,
        window: TimeWindow,
        opts: FetchOptions,
    ) -> Result<RecordSet, PipelineError> {
        let kind = DataKind::Bars { period, adjust };
        let key = keys::bars_key(symbol, period, adjust, &window);
        self.acquire(kind, key, opts, || async move {
            let raw = self
                .fetch(request::bars_request(symbol, period, adjust, &window))
                .await?;
            let req = NormalizeRequest::new(kind, symbol, now_seconds()).with_window(window);
            normalizer::normalize(&raw, &req).map_err(PipelineError::from)
        })
        .await
    }

    /// 技术指标，K线同样经过缓存和落库
    pub async fn indicators(
        &self,
        query: &IndicatorQuery,
        opts: FetchOptions,
    ) -> Result<RecordSet, PipelineError> {
        check_symbol(&query.symbol)?;
        let symbol = query.symbol.as_str();
        let period = query.period;
        let as_of = query.as_of.unwrap_or_else(|| Local::now().date_naive());
        let kind = DataKind::Indicator { period };
        let key = keys::indicators_key(symbol, period, as_of);
        self.acquire(kind, key, opts, || async move {
            let window = TimeWindow::trailing_days(as_of, self.settings.indicator_lookback_days);
            let bars = self.bars(symbol, period, Adjust::None, window, opts).await?;
            let bars: Vec<_> = bars.bars().cloned().collect();
            normalizer::normalize_indicators(symbol, period, &bars, &self.settings.indicator)
                .map_err(PipelineError::from)
        })
        .await
    }

    /// 个股人气榜：先取排名，再批量取报价
    pub async fn hot_rank(&self, opts: FetchOptions) -> Result<RecordSet, PipelineError> {
        let kind = DataKind::Rank;
        self.acquire(kind, keys::rank_key(), opts, || async move {
            let ranks = self.fetch(request::rank_list_request()).await?;
            let secids = normalizer::rank_secids(&ranks)?;
            let quotes = if secids.is_empty() {
                RawPayload::Null
            } else {
                self.fetch(request::rank_quotes_request(&secids)).await?
            };
            let merged = json!({ "ranks": ranks, "quotes": quotes });
            let req = NormalizeRequest::new(kind, "", now_seconds());
            normalizer::normalize(&merged, &req).map_err(PipelineError::from)
        })
        .await
    }

    /// 概念板块行情
    pub async fn board_quote(&self, opts: FetchOptions) -> Result<RecordSet, PipelineError> {
        let kind = DataKind::Board;
        self.acquire(kind, keys::board_key(), opts, || async move {
            let raw = self.fetch(request::board_request()).await?;
            let req = NormalizeRequest::new(kind, "", now_seconds());
            normalizer::normalize(&raw, &req).map_err(PipelineError::from)
        })
        .await
    }

    /// 读取已落库的数据
    pub async fn stored(
        &self,
        kind: DataKind,
        symbol: &str,
        window: &TimeWindow,
    ) -> Result<RecordSet, PipelineError> {
        check_symbol(symbol)?;
        let records = self.store.query(&kind, symbol, window).await;
        Ok(RecordSet::new(kind, RecordSource::Store, records))
    }

    async fn fetch(&self, request: ProviderRequest) -> Result<RawPayload, PipelineError> {
        let timeout = self.settings.request_timeout;
        let transport = &self.transport;
        let request = &request;
        debug!("请求 {}", request.endpoint);
        self.executor
            .execute(|| transport.fetch(request, timeout))
            .await
            .map_err(PipelineError::from)
    }

    async fn cached(&self, key: &str) -> Option<Vec<QuoteRecord>> {
        let hit = self.cache.get::<Vec<QuoteRecord>>(key).await;
        if hit.is_some() {
            info!("缓存命中: {}", key);
        }
        hit
    }

    async fn acquire<F, Fut>(
        &self,
        kind: DataKind,
        key: String,
        opts: FetchOptions,
        produce: F,
    ) -> Result<RecordSet, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<QuoteRecord>, PipelineError>>,
    {
        if !opts.use_cache {
            let records = produce().await?;
            self.persist(&kind, &records, opts).await;
            return Ok(RecordSet::new(kind, RecordSource::Provider, records));
        }

        if let Some(records) = self.cached(&key).await {
            return Ok(RecordSet::new(kind, RecordSource::Cache, records));
        }

        let lock = self
            .fetch_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _cleanup = LockCleanup {
            locks: &self.fetch_locks,
            key: &key,
        };
        let _guard = lock.lock().await;
        // 排队期间可能已被其他请求填充
        match self.cached(&key).await {
            Some(records) => Ok(RecordSet::new(kind, RecordSource::Cache, records)),
            None => self.produce_and_store(kind, &key, opts, produce).await,
        }
    }

    async fn produce_and_store<F, Fut>(
        &self,
        kind: DataKind,
        key: &str,
        opts: FetchOptions,
        produce: F,
    ) -> Result<RecordSet, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<QuoteRecord>, PipelineError>>,
    {
        debug!("缓存未命中: {}", key);
        let records = produce().await?;
        // 空结果不缓存，下次重新请求
        if !records.is_empty() {
            self.cache.set(key, &records, self.cache.default_ttl()).await;
        }
        self.persist(&kind, &records, opts).await;
        Ok(RecordSet::new(kind, RecordSource::Provider, records))
    }

    async fn persist(&self, kind: &DataKind, records: &[QuoteRecord], opts: FetchOptions) {
        if !opts.persist || records.is_empty() {
            return;
        }
        let written = self.store.upsert(kind, records).await;
        if written < records.len() {
            warn!("{} 落库 {}/{} 条", kind, written, records.len());
        } else {
            info!("{} 落库 {} 条", kind, written);
        }
    }
}

/// 结果序列化为 JSON：记录集或 `{"error": {...}}`
pub fn render_json(result: &Result<RecordSet, PipelineError>) -> String {
    let rendered = match result {
        Ok(set) => serde_json::to_string_pretty(set),
        Err(e) => serde_json::to_string_pretty(&e.to_payload()),
    };
    rendered.unwrap_or_else(|e| {
        json!({"error": {"kind": "serialization_failure", "message": e.to_string()}}).to_string()
    })
}
