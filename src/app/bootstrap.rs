use std::sync::Arc;

use tracing::{info, warn};

use crate::app_config::db::connect_db;
use crate::app_config::AppConfig;
use crate::market::cache::{CacheMode, CacheStore};
use crate::market::eastmoney::{HttpTransport, Transport};
use crate::market::repository::{MemoryQuoteStore, MysqlQuoteStore, QuoteStore};
use crate::market::retry::{BackoffExecutor, BackoffPolicy};
use crate::market::services::{AcquisitionService, ServiceSettings};

/// 根据配置选择存储：配置了 DB_HOST 用 MySQL，否则用进程内存储
async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn QuoteStore>> {
    match connect_db(&config.database).await? {
        Some(rb) => {
            let store = MysqlQuoteStore::new(rb);
            store.init_schema().await?;
            info!("使用 MySQL 存储");
            Ok(Arc::new(store))
        }
        None => {
            warn!("未配置 DB_HOST, 使用进程内存储");
            Ok(Arc::new(MemoryQuoteStore::new()))
        }
    }
}

/// 启动时构造一次各组件并注入流水线
pub async fn build_service(config: &AppConfig) -> anyhow::Result<AcquisitionService> {
    let policy = BackoffPolicy::from_settings(&config.api)?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);

    let cache = CacheStore::connect(&config.redis).await;
    if cache.mode() == CacheMode::Degraded {
        warn!("缓存运行在降级模式, 仅本进程可见");
    }

    let store = build_store(config).await?;
    Ok(AcquisitionService::new(
        transport,
        Arc::new(cache),
        store,
        BackoffExecutor::new(policy),
        ServiceSettings::from_config(config),
    ))
}
