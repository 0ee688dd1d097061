//! 模型访问控制器 - 基础设施层
//!
//! 持有通往外部模型的唯一通道，只暴露 `submit` 能力：
//! - 同一时刻最多一个请求在途，排队按提交顺序（FIFO）放行
//! - 每个准入的请求分配严格递增的 ID
//! - 非延迟敏感请求在调度前等待固定间隔
//! - 429 / 超时 / 网络错误 / 格式异常按固定退避表重试，余额不足立即失败

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::infrastructure::upstream::{ChatUpstream, TransportError, UpstreamReply};
use crate::models::{ModelRequest, ModelResponse, TokenUsage};
use crate::utils::truncate_text;

/// 429 错误消息中表示余额耗尽的关键词
const QUOTA_KEYWORDS: [&str; 6] = [
    "余额",
    "充值",
    "资源包",
    "insufficient_quota",
    "balance",
    "recharge",
];

/// 单次等待的上限
const MAX_WAIT: Duration = Duration::from_secs(3600);

/// 重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: u32,
    pub dispatch_delay_units: u64,
    pub rate_limit_backoff: Vec<u64>,
    pub network_backoff: Vec<u64>,
    pub time_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            dispatch_delay_units: 1,
            rate_limit_backoff: vec![3, 6, 12],
            network_backoff: vec![2, 4, 6],
            time_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn dispatch_delay(&self) -> Duration {
        self.scaled(self.dispatch_delay_units)
    }

    /// 第 `retry_index` 次重试前的等待时间，超出退避表时沿用最后一项
    fn backoff(&self, schedule: &[u64], retry_index: usize) -> Duration {
        let units = schedule
            .get(retry_index)
            .or_else(|| schedule.last())
            .copied()
            .unwrap_or(0);
        self.scaled(units)
    }

    /// `units` 个时间单位，溢出或超过上限时取 `MAX_WAIT`
    fn scaled(&self, units: u64) -> Duration {
        u32::try_from(units)
            .ok()
            .and_then(|units| self.time_unit.checked_mul(units))
            .map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
    }
}

/// 单次尝试的失败
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptFailure {
    RateLimited(String),
    QuotaExhausted(String),
    Timeout(String),
    Network(String),
    Malformed(String),
    Upstream { status: u16, message: String },
    InvalidRequest(String),
}

impl AttemptFailure {
    /// 可重试的失败返回对应的退避表
    fn backoff_schedule<'a>(&self, policy: &'a RetryPolicy) -> Option<&'a [u64]> {
        match self {
            AttemptFailure::RateLimited(_) => Some(&policy.rate_limit_backoff),
            AttemptFailure::Timeout(_)
            | AttemptFailure::Network(_)
            | AttemptFailure::Malformed(_) => Some(&policy.network_backoff),
            AttemptFailure::QuotaExhausted(_)
            | AttemptFailure::Upstream { .. }
            | AttemptFailure::InvalidRequest(_) => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            AttemptFailure::RateLimited(_) => "遇到并发限制",
            AttemptFailure::QuotaExhausted(_) => "API余额不足",
            AttemptFailure::Timeout(_) => "请求超时",
            AttemptFailure::Network(_) => "网络错误",
            AttemptFailure::Malformed(_) => "响应格式异常",
            AttemptFailure::Upstream { .. } => "上游返回错误",
            AttemptFailure::InvalidRequest(_) => "请求构建失败",
        }
    }

    fn into_error(self, request_id: u64, attempts: u32) -> GatewayError {
        match self {
            AttemptFailure::RateLimited(message) => GatewayError::RateLimited {
                request_id,
                attempts,
                message,
            },
            AttemptFailure::QuotaExhausted(message) => {
                GatewayError::QuotaExhausted { request_id, message }
            }
            AttemptFailure::Timeout(message) => GatewayError::Timeout {
                request_id,
                attempts,
                message,
            },
            AttemptFailure::Network(message) => GatewayError::Network {
                request_id,
                attempts,
                message,
            },
            AttemptFailure::Malformed(reason) => GatewayError::MalformedUpstreamResponse {
                request_id,
                attempts,
                reason,
            },
            AttemptFailure::Upstream { status, message } => GatewayError::Upstream {
                request_id,
                status,
                message,
            },
            AttemptFailure::InvalidRequest(message) => GatewayError::InvalidRequest { message },
        }
    }
}

impl From<TransportError> for AttemptFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(m) => AttemptFailure::Timeout(m),
            TransportError::Network(m) => AttemptFailure::Network(m),
            TransportError::InvalidRequest(m) => AttemptFailure::InvalidRequest(m),
        }
    }
}

/// 调用统计（只用于观察，不影响正确性）
#[derive(Debug, Default)]
struct GatewayStats {
    admitted: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// 调用统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStatsSnapshot {
    pub admitted: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
}

/// 模型访问控制器
///
/// 职责：
/// - 持有唯一的调用槽位（容量为 1 的互斥锁，同时守护请求计数器）
/// - 暴露 submit() 能力
/// - 不认识题目 / 试卷
/// - 不解析模型输出的内容
pub struct ModelGateway {
    upstream: Arc<dyn ChatUpstream>,
    policy: RetryPolicy,
    slot: Mutex<u64>,
    stats: GatewayStats,
}

impl ModelGateway {
    /// 创建新的访问控制器
    pub fn new(upstream: Arc<dyn ChatUpstream>, policy: RetryPolicy) -> Self {
        Self {
            upstream,
            policy,
            slot: Mutex::new(0),
            stats: GatewayStats::default(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            admitted: self.stats.admitted.load(Ordering::SeqCst),
            succeeded: self.stats.succeeded.load(Ordering::SeqCst),
            retried: self.stats.retried.load(Ordering::SeqCst),
            failed: self.stats.failed.load(Ordering::SeqCst),
        }
    }

    /// 提交一个请求，直到拿到响应或重试耗尽
    ///
    /// 槽位在整个重试序列期间一直持有；tokio 的 `Mutex` 按等待顺序唤醒，
    /// 因此并发调用方按提交顺序被服务。
    pub async fn submit(&self, request: ModelRequest) -> Result<ModelResponse, GatewayError> {
        debug!("等待获取模型调用槽位 (模型: {})", request.model);

        let mut counter = self.slot.lock().await;
        *counter += 1;
        let request_id = *counter;
        self.stats.admitted.fetch_add(1, Ordering::SeqCst);

        info!(
            "[API #{}] 已获取调用槽位，开始调用 (模型: {})",
            request_id, request.model
        );

        if !request.skip_delay {
            tokio::time::sleep(self.policy.dispatch_delay()).await;
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(
                "[API #{}] 发送请求... (尝试 {}/{})",
                request_id, attempt, max_attempts
            );

            let failure = match self.upstream.dispatch(request_id, &request).await {
                Ok(reply) => match validate_reply(&reply) {
                    Ok((content, usage)) => {
                        self.stats.succeeded.fetch_add(1, Ordering::SeqCst);
                        info!(
                            "[API #{}] ✅ 请求成功，内容长度: {} 字符",
                            request_id,
                            content.chars().count()
                        );
                        debug!("[API #{}] 内容预览: {}", request_id, truncate_text(&content, 200));
                        return Ok(ModelResponse {
                            request_id,
                            status: reply.status,
                            content,
                            usage,
                            retries: attempt - 1,
                        });
                    }
                    Err(failure) => failure,
                },
                Err(err) => AttemptFailure::from(err),
            };

            let schedule = match failure.backoff_schedule(&self.policy) {
                Some(schedule) if attempt < max_attempts => schedule,
                _ => {
                    self.stats.failed.fetch_add(1, Ordering::SeqCst);
                    error!(
                        "[API #{}] ❌ {}，放弃 (已尝试 {} 次)",
                        request_id,
                        failure.describe(),
                        attempt
                    );
                    return Err(failure.into_error(request_id, attempt));
                }
            };

            let wait = self.policy.backoff(schedule, (attempt - 1) as usize);
            warn!(
                "[API #{}] ⚠️ {}，等待 {:?} 后重试...",
                request_id,
                failure.describe(),
                wait
            );
            self.stats.retried.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(wait).await;
        }
    }
}

/// 校验上游响应，成功时返回内容和 token 用量
fn validate_reply(reply: &UpstreamReply) -> Result<(String, Option<TokenUsage>), AttemptFailure> {
    if reply.status == 429 {
        let message = error_message(&reply.body).unwrap_or_else(|| "并发请求过多".to_string());
        let lowered = message.to_lowercase();
        if QUOTA_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Err(AttemptFailure::QuotaExhausted(message));
        }
        return Err(AttemptFailure::RateLimited(message));
    }

    if reply.status != 200 {
        let message =
            error_message(&reply.body).unwrap_or_else(|| truncate_text(&reply.body, 200));
        return Err(AttemptFailure::Upstream {
            status: reply.status,
            message,
        });
    }

    let json: JsonValue = serde_json::from_str(&reply.body)
        .map_err(|e| AttemptFailure::Malformed(format!("响应不是合法 JSON: {}", e)))?;

    let choices = json
        .get("choices")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| AttemptFailure::Malformed("缺少choices字段".to_string()))?;

    let first = choices
        .first()
        .ok_or_else(|| AttemptFailure::Malformed("choices为空".to_string()))?;

    let message = first
        .get("message")
        .ok_or_else(|| AttemptFailure::Malformed("缺少message字段".to_string()))?;

    let content = message
        .get("content")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(AttemptFailure::Malformed("返回内容为空".to_string()));
    }

    let usage = json
        .get("usage")
        .cloned()
        .and_then(|u| serde_json::from_value::<TokenUsage>(u).ok());

    Ok((content.to_string(), usage))
}

fn error_message(body: &str) -> Option<String> {
    let json: JsonValue = serde_json::from_str(body).ok()?;
    json.get("error")
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_are_capped_instead_of_overflowing() {
        let policy = RetryPolicy {
            dispatch_delay_units: u64::MAX,
            rate_limit_backoff: vec![u64::from(u32::MAX) + 1],
            network_backoff: vec![u64::from(u32::MAX)],
            time_unit: Duration::from_secs(u64::MAX / 2),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.dispatch_delay(), MAX_WAIT);
        assert_eq!(policy.backoff(&policy.rate_limit_backoff, 0), MAX_WAIT);
        assert_eq!(policy.backoff(&policy.network_backoff, 5), MAX_WAIT);

        let policy = RetryPolicy::default();
        assert_eq!(policy.dispatch_delay(), Duration::from_secs(1));
        assert_eq!(policy.backoff(&policy.rate_limit_backoff, 1), Duration::from_secs(6));
        assert_eq!(policy.backoff(&policy.rate_limit_backoff, 9), Duration::from_secs(12));
    }

    fn ok_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
        .to_string()
    }

    #[test]
    fn test_validate_success_with_usage() {
        let (content, usage) = validate_reply(&UpstreamReply::new(200, ok_body("第4题"))).unwrap();
        assert_eq!(content, "第4题");
        assert_eq!(usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_validate_blank_content_is_malformed() {
        let failure = validate_reply(&UpstreamReply::new(200, ok_body("  \n "))).unwrap_err();
        assert!(matches!(failure, AttemptFailure::Malformed(_)));
    }

    #[test]
    fn test_validate_missing_structure_is_malformed() {
        for body in [r#"{"id": "x"}"#, r#"{"choices": []}"#, r#"{"choices": [{}]}"#, "not json"] {
            let failure = validate_reply(&UpstreamReply::new(200, body)).unwrap_err();
            assert!(matches!(failure, AttemptFailure::Malformed(_)), "body: {}", body);
        }
    }

    #[test]
    fn test_validate_distinguishes_quota_from_rate_limit() {
        let quota = r#"{"error": {"code": "1113", "message": "您的账户已欠费，请充值后重试"}}"#;
        let rate = r#"{"error": {"code": "1302", "message": "您当前使用该API的并发数过高"}}"#;
        assert!(matches!(
            validate_reply(&UpstreamReply::new(429, quota)).unwrap_err(),
            AttemptFailure::QuotaExhausted(_)
        ));
        assert!(matches!(
            validate_reply(&UpstreamReply::new(429, rate)).unwrap_err(),
            AttemptFailure::RateLimited(_)
        ));
        assert_eq!(
            validate_reply(&UpstreamReply::new(429, "")).unwrap_err(),
            AttemptFailure::RateLimited("并发请求过多".to_string())
        );
    }

    #[test]
    fn test_validate_other_status_is_terminal() {
        let failure =
            validate_reply(&UpstreamReply::new(401, r#"{"error": {"message": "令牌无效"}}"#))
                .unwrap_err();
        assert_eq!(
            failure,
            AttemptFailure::Upstream {
                status: 401,
                message: "令牌无效".to_string()
            }
        );
        assert!(failure.backoff_schedule(&RetryPolicy::default()).is_none());
    }

    #[test]
    fn test_backoff_uses_schedule_then_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(&policy.rate_limit_backoff, 0), Duration::from_secs(3));
        assert_eq!(policy.backoff(&policy.rate_limit_backoff, 2), Duration::from_secs(12));
        assert_eq!(policy.backoff(&policy.rate_limit_backoff, 7), Duration::from_secs(12));
        assert_eq!(policy.backoff(&[], 0), Duration::ZERO);
        assert_eq!(policy.dispatch_delay(), Duration::from_secs(1));
    }
}
