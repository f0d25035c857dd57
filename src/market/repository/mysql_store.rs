use async_trait::async_trait;
use rbatis::RBatis;
use rbs::Value;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::error::StorageError;
use crate::market::model::{BarPeriod, DataKind, QuoteRecord};
use crate::market::repository::{check_storable, QuoteStore};
use crate::time_util::{self, TimeWindow};

const SNAPSHOT_COLUMNS: &str = "
    `id` bigint NOT NULL AUTO_INCREMENT,
    `kind_key` varchar(32) NOT NULL DEFAULT '' COMMENT '周期/复权等参数',
    `symbol` varchar(16) NOT NULL COMMENT '代码',
    `ts_key` varchar(19) NOT NULL DEFAULT '' COMMENT '自然键中的时间，快照类为空',
    `ts` varchar(19) NOT NULL COMMENT 'YYYY-MM-DD HH:MM:SS',
    `payload` json NOT NULL COMMENT '标准记录',
    `created_at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP,
    `updated_at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    PRIMARY KEY (`id`),
    UNIQUE KEY `uk_natural` (`kind_key`, `symbol`, `ts_key`),
    KEY `idx_symbol_ts` (`symbol`, `ts`)";

const BAR_COLUMNS: &str = "
    `id` bigint NOT NULL AUTO_INCREMENT,
    `kind_key` varchar(32) NOT NULL COMMENT '周期:复权',
    `symbol` varchar(16) NOT NULL COMMENT '代码',
    `ts_key` varchar(19) NOT NULL,
    `ts` varchar(19) NOT NULL COMMENT 'K线时间',
    `open` double DEFAULT NULL,
    `high` double DEFAULT NULL,
    `low` double DEFAULT NULL,
    `close` double DEFAULT NULL,
    `volume` double DEFAULT NULL,
    `amount` double DEFAULT NULL,
    `payload` json NOT NULL COMMENT '标准记录',
    `created_at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP,
    `updated_at` datetime NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    PRIMARY KEY (`id`),
    UNIQUE KEY `uk_natural` (`kind_key`, `symbol`, `ts_key`),
    KEY `idx_symbol_ts` (`symbol`, `ts`)";

fn table_name(kind: &DataKind) -> &'static str {
    match kind {
        DataKind::Realtime => "realtime_quotes",
        DataKind::Info => "stock_info",
        DataKind::Bars { .. } => "stock_bars",
        DataKind::Indicator { .. } => "stock_indicators",
        DataKind::Rank => "hot_stocks",
        DataKind::Board => "board_quotes",
    }
}

/// 同一张表里区分不同参数组合
fn kind_key(kind: &DataKind) -> String {
    match kind {
        DataKind::Bars { period, adjust } => format!("{}:{}", period, adjust),
        DataKind::Indicator { period } => period.to_string(),
        _ => String::new(),
    }
}

fn opt_f64(v: Option<f64>) -> Value {
    v.map(Value::F64).unwrap_or(Value::Null)
}

#[derive(Debug, Deserialize)]
struct PayloadRow {
    payload: String,
}

/// MySQL 存储
pub struct MysqlQuoteStore {
    rb: RBatis,
}

impl MysqlQuoteStore {
    pub fn new(rb: RBatis) -> Self {
        Self { rb }
    }

    /// 建表（幂等）
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        let kinds = [
            DataKind::Realtime,
            DataKind::Info,
            DataKind::Rank,
            DataKind::Board,
            DataKind::Indicator {
                period: BarPeriod::Daily,
            },
        ];
        for kind in kinds {
            self.create_table(table_name(&kind), SNAPSHOT_COLUMNS).await?;
        }
        self.create_table("stock_bars", BAR_COLUMNS).await?;
        info!("数据表检查完成");
        Ok(())
    }

    async fn create_table(&self, table: &str, columns: &str) -> Result<(), StorageError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS `{}` ({}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;",
            table, columns
        );
        self.rb.exec(&sql, vec![]).await?;
        Ok(())
    }

    async fn upsert_one(&self, kind: &DataKind, record: &QuoteRecord) -> Result<(), StorageError> {
        check_storable(kind, record)?;
        let payload = serde_json::to_string(record)?;
        let key = record.natural_key();
        let ts_key = key
            .ts
            .map(|ts| time_util::format_canonical(&ts))
            .unwrap_or_default();
        let ts = time_util::format_canonical(&record.timestamp());

        match record {
            QuoteRecord::Bar(bar) => {
                let sql = "INSERT INTO `stock_bars` \
                    (kind_key, symbol, ts_key, ts, open, high, low, close, volume, amount, payload) \
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                    ON DUPLICATE KEY UPDATE \
                    ts = VALUES(ts), open = VALUES(open), high = VALUES(high), low = VALUES(low), \
                    close = VALUES(close), volume = VALUES(volume), amount = VALUES(amount), \
                    payload = VALUES(payload), updated_at = CURRENT_TIMESTAMP";
                let params = vec![
                    Value::String(kind_key(kind)),
                    Value::String(key.symbol),
                    Value::String(ts_key),
                    Value::String(ts),
                    opt_f64(bar.open),
                    opt_f64(bar.high),
                    opt_f64(bar.low),
                    opt_f64(bar.close),
                    opt_f64(bar.volume),
                    opt_f64(bar.amount),
                    Value::String(payload),
                ];
                self.rb.exec(sql, params).await?;
            }
            _ => {
                let sql = format!(
                    "INSERT INTO `{}` (kind_key, symbol, ts_key, ts, payload) VALUES (?, ?, ?, ?, ?) \
                     ON DUPLICATE KEY UPDATE ts = VALUES(ts), payload = VALUES(payload), \
                     updated_at = CURRENT_TIMESTAMP",
                    table_name(kind)
                );
                let params = vec![
                    Value::String(kind_key(kind)),
                    Value::String(key.symbol),
                    Value::String(ts_key),
                    Value::String(ts),
                    Value::String(payload),
                ];
                self.rb.exec(&sql, params).await?;
            }
        }
        Ok(())
    }

    async fn try_query(
        &self,
        kind: &DataKind,
        symbol: &str,
        window: &TimeWindow,
    ) -> Result<Vec<QuoteRecord>, StorageError> {
        let sql = format!(
            "SELECT CAST(payload AS CHAR) AS payload FROM `{}` \
             WHERE kind_key = ? AND symbol = ? AND ts >= ? AND ts <= ? ORDER BY ts ASC",
            table_name(kind)
        );
        let params = vec![
            Value::String(kind_key(kind)),
            Value::String(symbol.to_string()),
            Value::String(time_util::format_canonical(&window.start)),
            Value::String(time_util::format_canonical(&window.end)),
        ];
        let rows: Vec<PayloadRow> = self.rb.query_decode(&sql, params).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<QuoteRecord>(&row.payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{} 无法解析已存记录: {}", table_name(kind), e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl QuoteStore for MysqlQuoteStore {
    async fn upsert(&self, kind: &DataKind, records: &[QuoteRecord]) -> usize {
        let mut written = 0;
        for record in records {
            match self.upsert_one(kind, record).await {
                Ok(()) => written += 1,
                Err(StorageError::Validation(msg)) => warn!("跳过记录: {}", msg),
                Err(e) => error!("写入 {} 失败 {}: {}", table_name(kind), record.symbol(), e),
            }
        }
        debug!("{} 写入 {}/{} 条", kind, written, records.len());
        written
    }

    async fn query(&self, kind: &DataKind, symbol: &str, window: &TimeWindow) -> Vec<QuoteRecord> {
        match self.try_query(kind, symbol, window).await {
            Ok(records) => records,
            Err(e) => {
                error!("查询 {} 失败 {}: {}", table_name(kind), symbol, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::model::Adjust;

    #[test]
    fn test_kind_keys_separate_parameters() {
        let qfq = DataKind::Bars {
            period: BarPeriod::Daily,
            adjust: Adjust::Forward,
        };
        assert_eq!(kind_key(&qfq), "daily:qfq");
        assert_eq!(table_name(&qfq), "stock_bars");
        assert_eq!(kind_key(&DataKind::Rank), "");
        assert_eq!(
            table_name(&DataKind::Indicator {
                period: BarPeriod::Weekly
            }),
            "stock_indicators"
        );
    }
}
