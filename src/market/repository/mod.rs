//! 持久化：按自然键幂等写入
//!
//! 两个实现：`MysqlQuoteStore`（rbatis）和 `MemoryQuoteStore`（未配置数据库时及测试使用）。

pub mod memory_store;
pub mod mysql_store;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::StorageError;
use crate::market::model::{DataKind, QuoteRecord};
use crate::time_util::TimeWindow;

pub use memory_store::MemoryQuoteStore;
pub use mysql_store::MysqlQuoteStore;

/// 落库后的行
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRow {
    pub record: QuoteRecord,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// 逐条写入，返回成功写入的条数；单条失败只跳过，不影响其余记录
    async fn upsert(&self, kind: &DataKind, records: &[QuoteRecord]) -> usize;

    /// 按时间升序返回，没有数据时返回空
    async fn query(&self, kind: &DataKind, symbol: &str, window: &TimeWindow) -> Vec<QuoteRecord>;
}

/// 写入前检查记录种类和必填字段
pub(crate) fn check_storable(kind: &DataKind, record: &QuoteRecord) -> Result<(), StorageError> {
    if record.kind() != *kind {
        return Err(StorageError::Validation(format!(
            "记录种类 {} 与目标 {} 不一致",
            record.kind(),
            kind
        )));
    }
    record.validate_for_storage().map_err(StorageError::Validation)
}
