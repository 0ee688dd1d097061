use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult, ConfigError};
use crate::infrastructure::RetryPolicy;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 视觉模型（识别试卷图片）
    pub vision_model: String,
    /// 文本模型（解题、诊断、引导）
    pub text_model: String,
    // --- 访问控制 ---
    /// 每个请求的最大尝试次数
    pub max_retries: u32,
    /// 调度前的固定延迟（时间单位）
    pub dispatch_delay_units: u64,
    /// 并发限制的退避表（时间单位）
    pub rate_limit_backoff: Vec<u64>,
    /// 超时/网络错误的退避表（时间单位）
    pub network_backoff: Vec<u64>,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 一个时间单位的毫秒数
    pub time_unit_ms: u64,
    // --- 引导对话 ---
    pub guidance_max_chars: usize,
    pub guidance_history_window: usize,
    pub max_dialogue_rounds: u32,
    // --- 智能分析 ---
    /// 判定为整张试卷的错题/标记数量阈值
    pub full_paper_threshold: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            vision_model: "glm-4v".to_string(),
            text_model: "glm-4-flash".to_string(),
            max_retries: 3,
            dispatch_delay_units: 1,
            rate_limit_backoff: vec![3, 6, 12],
            network_backoff: vec![2, 4, 6],
            request_timeout_secs: 60,
            time_unit_ms: 1000,
            guidance_max_chars: 1500,
            guidance_history_window: 6,
            max_dialogue_rounds: 8,
            full_paper_threshold: 3,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取 TOML 配置文件（如果存在），再应用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let base = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            Self::from_toml_str(&content, &path.display().to_string())?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    /// 解析 TOML 配置内容
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            vision_model: env_string("VISION_MODEL").unwrap_or(self.vision_model),
            text_model: env_string("TEXT_MODEL").unwrap_or(self.text_model),
            max_retries: env_parse("MAX_RETRIES", self.max_retries),
            dispatch_delay_units: env_parse("DISPATCH_DELAY_UNITS", self.dispatch_delay_units),
            rate_limit_backoff: self.rate_limit_backoff,
            network_backoff: self.network_backoff,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", self.request_timeout_secs),
            time_unit_ms: env_parse("TIME_UNIT_MS", self.time_unit_ms),
            guidance_max_chars: env_parse("GUIDANCE_MAX_CHARS", self.guidance_max_chars),
            guidance_history_window: env_parse(
                "GUIDANCE_HISTORY_WINDOW",
                self.guidance_history_window,
            ),
            max_dialogue_rounds: env_parse("MAX_DIALOGUE_ROUNDS", self.max_dialogue_rounds),
            full_paper_threshold: env_parse("FULL_PAPER_THRESHOLD", self.full_paper_threshold),
            verbose_logging: env_parse("VERBOSE_LOGGING", self.verbose_logging),
        }
    }

    /// 访问控制器使用的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            dispatch_delay_units: self.dispatch_delay_units,
            rate_limit_backoff: self.rate_limit_backoff.clone(),
            network_backoff: self.network_backoff.clone(),
            time_unit: Duration::from_millis(self.time_unit_ms),
        }
    }

    /// 单次请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                let err = ConfigError::EnvVarParseFailed {
                    var_name: name.to_string(),
                    value: raw,
                    expected_type: std::any::type_name::<T>().to_string(),
                };
                warn!("{}，使用默认值", err);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_upstream_limits() {
        let config = Config::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.rate_limit_backoff, vec![3, 6, 12]);
        assert_eq!(config.network_backoff, vec![2, 4, 6]);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.guidance_max_chars, 1500);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            "text_model = \"glm-4-air\"\nmax_retries = 5\n",
            "inline",
        )
        .unwrap();
        assert_eq!(config.text_model, "glm-4-air");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.vision_model, "glm-4v");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Config::from_toml_str("max_retries = \"many\"", "bad.toml").unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_retry_policy_never_zero_attempts() {
        let config = Config {
            max_retries: 0,
            ..Config::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 1);
    }
}
