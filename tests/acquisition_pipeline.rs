use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::{json, Value};

use rust_quote::error::{PipelineError, TransportError};
use rust_quote::market::cache::CacheStore;
use rust_quote::market::eastmoney::request::{KLINE_URL, QUOTE_URL, RANK_URL, ULIST_URL};
use rust_quote::market::eastmoney::{ProviderRequest, RawPayload, Transport};
use rust_quote::market::model::{
    Adjust, BarPeriod, DataKind, QuoteRecord, RecordSource,
};
use rust_quote::market::repository::{MemoryQuoteStore, QuoteStore};
use rust_quote::market::retry::{BackoffExecutor, BackoffPolicy};
use rust_quote::market::services::{
    render_json, AcquisitionService, FetchOptions, HistoryQuery, IndicatorQuery, ServiceSettings,
};
use rust_quote::time_util::TimeWindow;

type Responder = Box<dyn Fn(&ProviderRequest) -> Result<Value, TransportError> + Send + Sync>;

/// 记录调用次数的假数据源
struct FakeTransport {
    calls: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
    responder: Responder,
    delay: Duration,
}

impl FakeTransport {
    fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&ProviderRequest) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self::slow(responder, Duration::ZERO)
    }

    fn slow<F>(responder: F, delay: Duration) -> Arc<Self>
    where
        F: Fn(&ProviderRequest) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay,
        })
    }

    fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(
        &self,
        request: &ProviderRequest,
        _timeout: Duration,
    ) -> Result<RawPayload, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.endpoints
            .lock()
            .unwrap()
            .push(request.endpoint.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(request)
    }
}

fn service(
    transport: Arc<FakeTransport>,
    store: Arc<MemoryQuoteStore>,
    max_retries: usize,
) -> AcquisitionService {
    service_with_ttl(transport, store, max_retries, Duration::from_secs(300))
}

fn service_with_ttl(
    transport: Arc<FakeTransport>,
    store: Arc<MemoryQuoteStore>,
    max_retries: usize,
    ttl: Duration,
) -> AcquisitionService {
    let policy = BackoffPolicy::new(max_retries, Duration::from_millis(10), 2.0).unwrap();
    let transport: Arc<dyn Transport> = transport;
    let store: Arc<dyn QuoteStore> = store;
    AcquisitionService::new(
        transport,
        Arc::new(CacheStore::degraded(ttl)),
        store,
        BackoffExecutor::new(policy),
        ServiceSettings::default(),
    )
}

fn realtime_payload() -> Value {
    json!({
        "rc": 0,
        "data": {"f43": 23.45, "f44": 23.6, "f45": 23.1, "f46": 23.2, "f60": 23.18,
                 "f19": 23.44, "f20": 120, "f39": 23.46, "f40": 35}
    })
}

fn klines(start: NaiveDate, days: usize) -> Value {
    let rows: Vec<String> = (0..days)
        .map(|i| {
            let d = start + chrono::Duration::days(i as i64);
            let close = 20.0 + (i % 7) as f64 * 0.3;
            format!(
                "{},{:.2},{:.2},{:.2},{:.2},10000,230000.00,1.2,0.5,0.1,0.2",
                d.format("%Y-%m-%d"),
                close - 0.1,
                close,
                close + 0.4,
                close - 0.4
            )
        })
        .collect();
    json!({"rc": 0, "data": {"code": "600900", "klines": rows}})
}

fn daily_query(symbol: &str) -> HistoryQuery {
    HistoryQuery {
        symbol: symbol.to_string(),
        period: BarPeriod::Daily,
        start: Some("2023-07-01".into()),
        end: Some("2023-07-10".into()),
        adjust: Adjust::None,
    }
}

const NO_CACHE: FetchOptions = FetchOptions {
    use_cache: false,
    persist: true,
};

#[tokio::test]
async fn test_second_call_within_ttl_hits_cache() {
    let transport = FakeTransport::new(|_| Ok(realtime_payload()));
    let svc = service(transport.clone(), Arc::new(MemoryQuoteStore::new()), 0);

    let first = svc
        .realtime_quote("600900", FetchOptions::default())
        .await
        .unwrap();
    let second = svc
        .realtime_quote("600900", FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(first.source, RecordSource::Provider);
    assert_eq!(second.source, RecordSource::Cache);
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    let transport = FakeTransport::slow(
        |_| Ok(realtime_payload()),
        Duration::from_millis(50),
    );
    let svc = service(transport.clone(), Arc::new(MemoryQuoteStore::new()), 0);

    let results = join_all(
        (0..5).map(|_| svc.realtime_quote("600900", FetchOptions::default())),
    )
    .await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.calls(), 1);
    let from_provider = results
        .iter()
        .filter(|r| matches!(r, Ok(set) if set.source == RecordSource::Provider))
        .count();
    assert_eq!(from_provider, 1);
}

#[tokio::test]
async fn test_bypassing_cache_fetches_every_time() {
    let transport = FakeTransport::new(|_| Ok(realtime_payload()));
    let svc = service(transport.clone(), Arc::new(MemoryQuoteStore::new()), 0);

    svc.realtime_quote("600900", NO_CACHE).await.unwrap();
    svc.realtime_quote("600900", NO_CACHE).await.unwrap();
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_http_404_is_not_retried() {
    let transport = FakeTransport::new(|_| Err(TransportError::HttpStatus { code: 404 }));
    let svc = service(transport.clone(), Arc::new(MemoryQuoteStore::new()), 3);

    let err = svc
        .realtime_quote("600900", FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(transport.calls(), 1);
    assert_eq!(err.kind(), "provider_contract_failure");
    assert_eq!(err.to_payload().error.status, Some(404));
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_exhaust_retries() {
    let transport = FakeTransport::new(|_| Err(TransportError::Timeout("slow".into())));
    let svc = service(transport.clone(), Arc::new(MemoryQuoteStore::new()), 2);

    let err = svc
        .stock_info("600900", FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(transport.calls(), 3);
    assert!(matches!(err, PipelineError::Network(TransportError::Timeout(_))));
}

#[tokio::test]
async fn test_bars_are_persisted_idempotently() {
    let transport = FakeTransport::new(|_| {
        Ok(klines(NaiveDate::from_ymd_opt(2023, 7, 3).unwrap(), 5))
    });
    let store = Arc::new(MemoryQuoteStore::new());
    let svc = service(transport.clone(), store.clone(), 0);

    let set = svc.history_quote(&daily_query("600900"), NO_CACHE).await.unwrap();
    assert_eq!(set.len(), 5);
    svc.history_quote(&daily_query("600900"), NO_CACHE).await.unwrap();

    let kind = DataKind::Bars {
        period: BarPeriod::Daily,
        adjust: Adjust::None,
    };
    assert_eq!(store.persisted(&kind).len(), 5);

    let stored = svc
        .stored(kind, "600900", &TimeWindow::unbounded())
        .await
        .unwrap();
    assert_eq!(stored.source, RecordSource::Store);
    assert_eq!(stored.records, set.records);
}

#[tokio::test]
async fn test_persist_flag_off_leaves_store_empty() {
    let transport = FakeTransport::new(|_| {
        Ok(klines(NaiveDate::from_ymd_opt(2023, 7, 3).unwrap(), 5))
    });
    let store = Arc::new(MemoryQuoteStore::new());
    let svc = service(transport, store.clone(), 0);

    let opts = FetchOptions {
        use_cache: true,
        persist: false,
    };
    svc.history_quote(&daily_query("600900"), opts).await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_missing_data_is_surfaced_and_not_cached() {
    let transport = FakeTransport::new(|_| Ok(json!({"rc": 0, "data": null})));
    let store = Arc::new(MemoryQuoteStore::new());
    let svc = service(transport.clone(), store.clone(), 0);

    let err = svc
        .realtime_quote("999999", FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_failure");
    svc.realtime_quote("999999", FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(transport.calls(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_malformed_shape_is_provider_contract_failure() {
    let transport = FakeTransport::new(|_| Ok(json!({"data": {"klines": "oops"}})));
    let svc = service(transport, Arc::new(MemoryQuoteStore::new()), 0);

    let err = svc
        .history_quote(&daily_query("600900"), FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "provider_contract_failure");
}

#[tokio::test]
async fn test_hot_rank_joins_two_requests() {
    let transport = FakeTransport::new(|req| match req.endpoint.as_str() {
        RANK_URL => Ok(json!({
            "data": [{"sc": "SZ000001", "rk": 1}, {"sc": "SH600519", "rk": 2}]
        })),
        ULIST_URL => {
            assert_eq!(req.param_value("secids"), Some("0.000001,1.600519"));
            Ok(json!({
                "data": {"diff": [
                    {"f2": 10.0, "f3": 1.0, "f12": "000001", "f14": "平安银行"},
                    {"f2": 1500.0, "f3": -2.0, "f12": "600519", "f14": "贵州茅台"}
                ]}
            }))
        }
        other => panic!("unexpected endpoint {}", other),
    });
    let store = Arc::new(MemoryQuoteStore::new());
    let svc = service(transport.clone(), store.clone(), 0);

    let set = svc.hot_rank(FetchOptions::default()).await.unwrap();
    assert_eq!(transport.endpoints(), vec![RANK_URL.to_string(), ULIST_URL.to_string()]);
    assert_eq!(set.len(), 2);
    assert_eq!(store.persisted(&DataKind::Rank).len(), 2);

    svc.hot_rank(FetchOptions::default()).await.unwrap();
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_indicators_flow_through_bars_pipeline() {
    let as_of = NaiveDate::from_ymd_opt(2023, 7, 10).unwrap();
    let first_day = as_of - chrono::Duration::days(59);
    let transport = FakeTransport::new(move |req| {
        assert_eq!(req.endpoint, KLINE_URL);
        Ok(klines(first_day, 60))
    });
    let store = Arc::new(MemoryQuoteStore::new());
    let svc = service(transport.clone(), store.clone(), 0);

    let query = IndicatorQuery {
        symbol: "600900".into(),
        period: BarPeriod::Daily,
        as_of: Some(as_of),
    };
    let set = svc.indicators(&query, FetchOptions::default()).await.unwrap();
    assert_eq!(set.len(), 1);
    let QuoteRecord::Indicator(snapshot) = &set.records[0] else {
        panic!("expected indicator snapshot");
    };
    assert_eq!(snapshot.ts.date(), as_of);
    assert!(snapshot.moving_averages.iter().all(|ma| ma.sma.is_some()));
    assert!(snapshot.rsi.is_some());

    let bars_kind = DataKind::Bars {
        period: BarPeriod::Daily,
        adjust: Adjust::None,
    };
    assert_eq!(store.persisted(&bars_kind).len(), 60);
    assert_eq!(
        store
            .persisted(&DataKind::Indicator {
                period: BarPeriod::Daily
            })
            .len(),
        1
    );

    let again = svc.indicators(&query, FetchOptions::default()).await.unwrap();
    assert_eq!(again.source, RecordSource::Cache);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_invalid_requests_never_reach_transport() {
    let transport = FakeTransport::new(|_| Ok(realtime_payload()));
    let svc = service(transport.clone(), Arc::new(MemoryQuoteStore::new()), 0);

    let err = svc
        .realtime_quote("", FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");

    let mut inverted = daily_query("600900");
    inverted.start = Some("2023-08-01".into());
    let err = svc
        .history_quote(&inverted, FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_render_json_shapes() {
    let transport = FakeTransport::new(|req| {
        assert_eq!(req.endpoint, QUOTE_URL);
        Ok(realtime_payload())
    });
    let svc = service(transport, Arc::new(MemoryQuoteStore::new()), 0);

    let ok = svc.realtime_quote("600900", FetchOptions::default()).await;
    let rendered: Value = serde_json::from_str(&render_json(&ok)).unwrap();
    assert_eq!(rendered["source"], "provider");
    assert_eq!(rendered["records"][0]["kind"], "realtime");
    assert_eq!(rendered["records"][0]["bids"][0]["volume"], 12000.0);

    let err: Result<_, PipelineError> = Err(PipelineError::Validation("没有可用记录".into()));
    let rendered: Value = serde_json::from_str(&render_json(&err)).unwrap();
    assert_eq!(rendered["error"]["kind"], "validation_failure");
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_cache_ttl() {
    let transport = FakeTransport::new(|_| Ok(realtime_payload()));
    let svc = service_with_ttl(
        transport.clone(),
        Arc::new(MemoryQuoteStore::new()),
        0,
        Duration::from_secs(60),
    );

    svc.realtime_quote("600900", FetchOptions::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    let cached = svc
        .realtime_quote("600900", FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(cached.source, RecordSource::Cache);
    assert_eq!(transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    let refreshed = svc
        .realtime_quote("600900", FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(refreshed.source, RecordSource::Provider);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_bad_row_is_skipped_on_write_only() {
    let mut payload = klines(NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(), 10);
    let row = payload["data"]["klines"][4].as_str().unwrap().to_string();
    let mut cols: Vec<&str> = row.split(',').collect();
    cols[2] = "abc";
    payload["data"]["klines"][4] = Value::String(cols.join(","));

    let transport = FakeTransport::new(move |_| Ok(payload.clone()));
    let store = Arc::new(MemoryQuoteStore::new());
    let svc = service(transport, store.clone(), 0);

    let set = svc
        .history_quote(&daily_query("600900"), FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(set.len(), 10);
    let QuoteRecord::Bar(bad) = &set.records[4] else {
        panic!("expected bar");
    };
    assert_eq!(bad.close, None);

    let kind = DataKind::Bars {
        period: BarPeriod::Daily,
        adjust: Adjust::None,
    };
    assert_eq!(store.persisted(&kind).len(), 9);
    assert_eq!(store.upsert(&kind, &set.records).await, 9);
    assert_eq!(store.persisted(&kind).len(), 9);
}
