use serde::Serialize;
use thiserror::Error;

/// 传输层失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    ConnectionFailure,
    HttpStatus,
    MalformedPayload,
}

/// 传输层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("请求超时: {0}")]
    Timeout(String),

    #[error("连接错误: {0}")]
    ConnectionFailure(String),

    #[error("HTTP错误: {code}")]
    HttpStatus { code: u16 },

    #[error("响应解析失败: {0}")]
    MalformedPayload(String),
}

impl TransportError {
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::Timeout(_) => TransportErrorKind::Timeout,
            TransportError::ConnectionFailure(_) => TransportErrorKind::ConnectionFailure,
            TransportError::HttpStatus { .. } => TransportErrorKind::HttpStatus,
            TransportError::MalformedPayload(_) => TransportErrorKind::MalformedPayload,
        }
    }

    /// 超时和连接失败属于暂时不可用
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            TransportErrorKind::Timeout | TransportErrorKind::ConnectionFailure
        )
    }
}

/// 标准化错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// 数据源返回的结构与约定不符
    #[error("响应结构不符合约定: {0}")]
    UnexpectedShape(String),

    /// 数据源没有该标的的数据
    #[error("未找到数据: {0}")]
    NoData(String),

    /// 有原始数据，但没有一条能通过解析
    #[error("没有可用记录: 丢弃了 {dropped} 条")]
    NoUsableRecords { dropped: usize },
}

/// 存储层错误，只在缓存/持久化内部记录日志，不向调用方传播
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("数据库错误: {0}")]
    Db(#[from] rbatis::rbdc::Error),

    #[error("记录校验失败: {0}")]
    Validation(String),
}

/// 对外暴露的流水线错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// 超时、连接失败，重试耗尽后返回
    #[error("网络错误: {0}")]
    Network(TransportError),

    /// HTTP 状态异常、响应格式不符，说明上游或约定发生变化
    #[error("数据源错误: {message}")]
    ProviderContract { message: String, status: Option<u16> },

    /// 没有留下任何可用记录
    #[error("数据校验失败: {0}")]
    Validation(String),

    /// 调用方传参不合法
    #[error("非法请求: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Network(_) => "network_failure",
            PipelineError::ProviderContract { .. } => "provider_contract_failure",
            PipelineError::Validation(_) => "validation_failure",
            PipelineError::InvalidRequest(_) => "invalid_request",
        }
    }

    fn status(&self) -> Option<u16> {
        match self {
            PipelineError::ProviderContract { status, .. } => *status,
            _ => None,
        }
    }

    /// 转换为结构化错误返回值
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: ErrorBody {
                kind: self.kind(),
                message: self.to_string(),
                status: self.status(),
            },
        }
    }
}

impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::HttpStatus { code } => PipelineError::ProviderContract {
                message: err.to_string(),
                status: Some(code),
            },
            TransportError::MalformedPayload(_) => PipelineError::ProviderContract {
                message: err.to_string(),
                status: None,
            },
            _ => PipelineError::Network(err),
        }
    }
}

impl From<NormalizeError> for PipelineError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::UnexpectedShape(_) => PipelineError::ProviderContract {
                message: err.to_string(),
                status: None,
            },
            NormalizeError::NoData(_) | NormalizeError::NoUsableRecords { .. } => {
                PipelineError::Validation(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorBody,
}
