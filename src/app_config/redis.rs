use std::time::Duration;

use anyhow::{anyhow, Result};
use redis::aio::MultiplexedConnection;
use redis::Client;

/// Open a multiplexed async connection and make sure the server answers PING
/// within `timeout`.
pub async fn connect_redis(url: &str, timeout: Duration) -> Result<MultiplexedConnection> {
    let client = Client::open(url)?;
    let probe = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok::<_, redis::RedisError>((conn, pong))
    };
    let (conn, pong) = tokio::time::timeout(timeout, probe)
        .await
        .map_err(|_| anyhow!("redis connect timed out after {:?}", timeout))??;
    if pong != "PONG" {
        return Err(anyhow!("unexpected PING reply: {}", pong));
    }
    Ok(conn)
}
