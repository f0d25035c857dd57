use anyhow::{anyhow, Result};
use rbatis::RBatis;
use rbdc_mysql::MysqlDriver;

use crate::app_config::settings::DatabaseSettings;

/// 连接 MySQL，未配置 DB_HOST 时返回 None
pub async fn connect_db(settings: &DatabaseSettings) -> Result<Option<RBatis>> {
    let Some(url) = settings.url.as_deref() else {
        return Ok(None);
    };
    let rb = RBatis::new();
    // link() will set driver and try use acquire() link database
    rb.link(MysqlDriver {}, url)
        .await
        .map_err(|e| anyhow!("failed to connect db: {}", e))?;
    rb.get_pool()
        .map_err(|e| anyhow!("db pool unavailable: {}", e))?
        .set_max_open_conns(settings.max_open_conns)
        .await;
    Ok(Some(rb))
}
