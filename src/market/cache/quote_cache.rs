use std::time::Duration;

use dashmap::DashMap;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::app_config::redis as app_redis;
use crate::app_config::settings::RedisSettings;
use crate::error::StorageError;

/// 进程内缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    serialized_value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

enum Backend {
    Connected(MultiplexedConnection),
    Degraded(DashMap<String, CacheEntry>),
}

/// 缓存当前运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Redis 可用
    Connected,
    /// 启动时连不上 Redis，退化为进程内缓存
    Degraded,
}

/// 带过期时间的键值缓存
///
/// 模式在构造时确定一次，之后不再重新探测。所有错误只记录日志，
/// 调用方只会看到 `false` 或空结果。
pub struct CacheStore {
    backend: Backend,
    default_ttl: Duration,
}

impl CacheStore {
    pub async fn connect(settings: &RedisSettings) -> Self {
        let default_ttl = Duration::from_secs(settings.default_ttl_secs);
        match app_redis::connect_redis(&settings.url, settings.connect_timeout).await {
            Ok(conn) => {
                info!("Redis 连接成功: {}", settings.url);
                Self {
                    backend: Backend::Connected(conn),
                    default_ttl,
                }
            }
            Err(e) => {
                warn!("Redis 不可用, 使用进程内缓存: {}", e);
                Self::degraded(default_ttl)
            }
        }
    }

    pub fn degraded(default_ttl: Duration) -> Self {
        Self {
            backend: Backend::Degraded(DashMap::new()),
            default_ttl,
        }
    }

    pub fn mode(&self) -> CacheMode {
        match self.backend {
            Backend::Connected(_) => CacheMode::Connected,
            Backend::Degraded(_) => CacheMode::Degraded,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 写入缓存，ttl 为 0 时拒绝写入
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        if ttl.is_zero() {
            warn!("缓存 {} 的过期时间为 0, 不写入", key);
            return false;
        }
        match self.try_set(key, value, ttl).await {
            Ok(()) => {
                debug!("缓存写入: {} ttl={:?}", key, ttl);
                true
            }
            Err(e) => {
                error!("缓存写入失败 {}: {}", key, e);
                false
            }
        }
    }

    async fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        match &self.backend {
            Backend::Connected(conn) => {
                let mut conn = conn.clone();
                // SETEX 以秒为单位，不足一秒按一秒
                let secs = ttl.as_millis().div_ceil(1000) as u64;
                conn.set_ex::<_, _, ()>(key, bytes, secs).await?;
            }
            Backend::Degraded(map) => {
                map.insert(
                    key.to_string(),
                    CacheEntry {
                        serialized_value: bytes,
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
        }
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                error!("缓存读取失败 {}: {}", key, e);
                None
            }
        }
    }

    async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let bytes = match &self.backend {
            Backend::Connected(conn) => {
                let mut conn = conn.clone();
                conn.get::<_, Option<Vec<u8>>>(key).await?
            }
            Backend::Degraded(map) => live_entry(map, key),
        };
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match &self.backend {
            Backend::Connected(conn) => {
                let mut conn = conn.clone();
                match conn.del::<_, i64>(key).await {
                    Ok(n) => n > 0,
                    Err(e) => {
                        error!("缓存删除失败 {}: {}", key, e);
                        false
                    }
                }
            }
            Backend::Degraded(map) => map
                .remove(key)
                .is_some_and(|(_, entry)| !entry.is_expired(Instant::now())),
        }
    }

    /// 已过期但尚未清理的条目视为不存在
    pub async fn exists(&self, key: &str) -> bool {
        match &self.backend {
            Backend::Connected(conn) => {
                let mut conn = conn.clone();
                match conn.exists::<_, bool>(key).await {
                    Ok(found) => found,
                    Err(e) => {
                        error!("缓存查询失败 {}: {}", key, e);
                        false
                    }
                }
            }
            Backend::Degraded(map) => live_entry(map, key).is_some(),
        }
    }
}

/// 读取未过期的条目，过期的顺手删掉
fn live_entry(map: &DashMap<String, CacheEntry>, key: &str) -> Option<Vec<u8>> {
    let now = Instant::now();
    let removed = map.remove_if(key, |_, entry| entry.is_expired(now));
    if removed.is_some() {
        debug!("缓存过期清理: {}", key);
        return None;
    }
    map.get(key).map(|entry| entry.serialized_value.clone())
}
