//! 应用配置
//!
//! 启动时从环境变量（以及 `.env`）读取一次，之后以值的形式传递给各组件。

use std::time::Duration;

use crate::app_config::env::{env_is_true, env_opt, env_or_default, env_parse};

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
    /// 默认缓存过期时间（秒）
    pub default_ttl_secs: u64,
    /// 启动探测的超时时间
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// MySQL 连接串，未设置时使用进程内存储
    pub url: Option<String>,
    pub max_open_conns: u64,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// 单次请求超时
    pub timeout: Duration,
    pub retries: usize,
    pub retry_delay: Duration,
    pub backoff_factor: f64,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub app_env: String,
    pub level: String,
    pub dir: String,
    pub db_debug: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis: RedisSettings,
    pub database: DatabaseSettings,
    pub api: ApiSettings,
    pub log: LogSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            redis: RedisSettings {
                url: env_or_default("REDIS_HOST", "redis://127.0.0.1/"),
                default_ttl_secs: env_parse("REDIS_DEFAULT_TTL", 300u64),
                connect_timeout: Duration::from_millis(env_parse(
                    "REDIS_CONNECT_TIMEOUT_MS",
                    2000u64,
                )),
            },
            database: DatabaseSettings {
                url: env_opt("DB_HOST"),
                max_open_conns: env_parse("DB_MAX_CONNS", 32u64),
            },
            api: ApiSettings {
                timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT", 30u64)),
                retries: env_parse("REQUEST_RETRIES", 3usize),
                retry_delay: Duration::from_millis(env_parse("RETRY_DELAY_MS", 1000u64)),
                backoff_factor: env_parse("RETRY_BACKOFF", 2.0f64),
            },
            log: LogSettings {
                app_env: env_or_default("APP_ENV", "LOCAL"),
                level: env_or_default("LOG_LEVEL", "info"),
                dir: env_or_default("LOG_DIR", "log_files"),
                db_debug: env_is_true("DB_DEBUG", false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::from_env();
        // 环境变量可能被外部设置，只校验不受影响的下限
        assert!(config.redis.default_ttl_secs > 0);
        assert!(config.api.backoff_factor >= 1.0);
        assert!(!config.redis.url.is_empty());
    }
}
