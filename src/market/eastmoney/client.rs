use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::market::eastmoney::request::ProviderRequest;

/// 数据源返回的原始 JSON
pub type RawPayload = Value;

/// 请求/响应交换，只负责分类错误，不缓存也不落库
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<RawPayload, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
            .build()?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::ConnectionFailure(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        request: &ProviderRequest,
        timeout: Duration,
    ) -> Result<RawPayload, TransportError> {
        let builder = match &request.body {
            Some(body) => self
                .client
                .post(&request.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
            None => self.client.get(&request.endpoint),
        };

        let response = builder
            .query(&request.params)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        debug!("{} 响应 {} 字节", request.endpoint, body.len());
        serde_json::from_slice(&body).map_err(|e| TransportError::MalformedPayload(e.to_string()))
    }
}
