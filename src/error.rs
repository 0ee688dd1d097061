use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 模型调用错误（来自访问控制器）
    #[error("模型调用错误: {0}")]
    Gateway(#[from] GatewayError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
}

/// 模型访问控制器的终止性错误
///
/// 每个变体都携带请求 ID 和最后一次观察到的诊断信息，
/// 调用方不能假设有任何部分输出。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// 并发限制（429），重试次数已耗尽
    #[error("[API #{request_id}] 模型并发限制 (已尝试 {attempts} 次): {message}")]
    RateLimited {
        request_id: u64,
        attempts: u32,
        message: String,
    },
    /// 账户余额不足，重试无意义
    #[error("[API #{request_id}] API余额不足，请充值后再使用: {message}")]
    QuotaExhausted { request_id: u64, message: String },
    /// 请求超时，重试次数已耗尽
    #[error("[API #{request_id}] 请求超时 (已尝试 {attempts} 次): {message}")]
    Timeout {
        request_id: u64,
        attempts: u32,
        message: String,
    },
    /// 网络错误，重试次数已耗尽
    #[error("[API #{request_id}] 网络错误 (已尝试 {attempts} 次): {message}")]
    Network {
        request_id: u64,
        attempts: u32,
        message: String,
    },
    /// 上游返回了 200 但结构不完整或内容为空
    #[error("[API #{request_id}] 上游响应格式异常 (已尝试 {attempts} 次): {reason}")]
    MalformedUpstreamResponse {
        request_id: u64,
        attempts: u32,
        reason: String,
    },
    /// 其他非 200 状态码
    #[error("[API #{request_id}] 上游返回错误 {status}: {message}")]
    Upstream {
        request_id: u64,
        status: u16,
        message: String,
    },
    /// 请求体构建失败
    #[error("模型请求构建失败: {message}")]
    InvalidRequest { message: String },
}

impl GatewayError {
    /// 该错误类别在尝试层面是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::Network { .. }
                | GatewayError::MalformedUpstreamResponse { .. }
        )
    }

    /// 对应的 HTTP 状态码（用于传输层映射）
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RateLimited { .. } | GatewayError::QuotaExhausted { .. } => 429,
            GatewayError::Timeout { .. } => 504,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::InvalidRequest { .. } => 400,
            GatewayError::Network { .. } | GatewayError::MalformedUpstreamResponse { .. } => 500,
        }
    }

    /// 已进行的尝试次数
    pub fn attempts(&self) -> u32 {
        match self {
            GatewayError::RateLimited { attempts, .. }
            | GatewayError::Timeout { attempts, .. }
            | GatewayError::Network { attempts, .. }
            | GatewayError::MalformedUpstreamResponse { attempts, .. } => *attempts,
            GatewayError::QuotaExhausted { .. } | GatewayError::Upstream { .. } => 1,
            GatewayError::InvalidRequest { .. } => 0,
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// HTTP 客户端创建失败
    #[error("HTTP 客户端创建失败: {0}")]
    HttpClient(String),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 业务逻辑错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusinessError {
    /// 图片数据为空
    #[error("请提供图片数据")]
    EmptyImage,
    /// 学生消息为空
    #[error("消息不能为空")]
    EmptyMessage,
    /// 对话轮数已达上限
    #[error("引导对话已达到 {max_rounds} 轮上限")]
    DialogueLimitReached { max_rounds: u32 },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return AppError::File(FileError::NotFound { path });
        }
        AppError::File(FileError::ReadFailed { path, source })
    }

    /// 面向用户的简短原因
    pub fn user_message(&self) -> String {
        match self {
            AppError::Gateway(GatewayError::QuotaExhausted { .. }) => {
                "⚠️ API余额不足，请充值后再使用".to_string()
            }
            AppError::Gateway(GatewayError::RateLimited { .. }) => {
                "模型服务繁忙，请稍后重试".to_string()
            }
            other => other.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
