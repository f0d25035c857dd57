use async_trait::async_trait;
use chrono::Local;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::market::model::{DataKind, NaturalKey, QuoteRecord};
use crate::market::repository::{check_storable, PersistedRow, QuoteStore};
use crate::time_util::TimeWindow;

/// 进程内存储，行为与数据库实现一致：同一自然键只有一行，后写覆盖
#[derive(Default)]
pub struct MemoryQuoteStore {
    rows: DashMap<(DataKind, NaturalKey), PersistedRow>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 某种类下的全部行，按自然键排序
    pub fn persisted(&self, kind: &DataKind) -> Vec<PersistedRow> {
        let mut rows: Vec<(NaturalKey, PersistedRow)> = self
            .rows
            .iter()
            .filter(|e| e.key().0 == *kind)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn upsert(&self, kind: &DataKind, records: &[QuoteRecord]) -> usize {
        let mut written = 0;
        for record in records {
            if let Err(e) = check_storable(kind, record) {
                warn!("跳过记录: {}", e);
                continue;
            }
            let now = Local::now().naive_local();
            match self.rows.entry((*kind, record.natural_key())) {
                Entry::Occupied(mut occupied) => {
                    let row = occupied.get_mut();
                    row.record = record.clone();
                    row.updated_at = now;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(PersistedRow {
                        record: record.clone(),
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
            written += 1;
        }
        debug!("{} 写入 {}/{} 条", kind, written, records.len());
        written
    }

    async fn query(&self, kind: &DataKind, symbol: &str, window: &TimeWindow) -> Vec<QuoteRecord> {
        let mut records: Vec<QuoteRecord> = self
            .rows
            .iter()
            .filter(|e| e.key().0 == *kind && e.key().1.symbol == symbol)
            .map(|e| e.value().record.clone())
            .filter(|r| window.contains(&r.timestamp()))
            .collect();
        records.sort_by_key(|r| r.timestamp());
        records
    }
}
