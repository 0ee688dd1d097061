//! 模型请求与响应

use base64::Engine;
use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 消息内容片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// 图片（data URL 或普通 URL）
    Image(String),
}

/// 一轮消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatTurn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// 图片在前、文字在后的用户消息
    pub fn user_with_image(text: impl Into<String>, image: &ImagePayload) -> Self {
        Self {
            role: Role::User,
            parts: vec![
                ContentPart::Image(image.data_url()),
                ContentPart::Text(text.into()),
            ],
        }
    }

    /// 所有文本片段拼接
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_image(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, ContentPart::Image(_)))
    }
}

/// base64 编码后的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime: String,
    base64: String,
}

impl ImagePayload {
    /// 从 base64 字符串创建，会去掉 `data:image/xxx;base64,` 前缀
    pub fn from_base64(data: &str, mime: impl Into<String>) -> Option<Self> {
        let stripped = match data.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };
        let stripped = stripped.trim();
        if stripped.is_empty() {
            return None;
        }
        Some(Self {
            mime: mime.into(),
            base64: stripped.to_string(),
        })
    }

    /// 从原始字节创建
    pub fn from_bytes(bytes: &[u8], mime: impl Into<String>) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(Self {
            mime: mime.into(),
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

/// 发往外部模型的请求
///
/// 构建完成后不再修改；ID 在准入时由访问控制器分配。
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 延迟敏感请求跳过调度前的固定延迟
    pub skip_delay: bool,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatTurn>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 2000,
            skip_delay: false,
        }
    }

    /// 单条用户文本消息
    pub fn user_text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(model, vec![ChatTurn::user(text)])
    }

    /// 图片 + 文本的单条用户消息
    pub fn user_vision(model: impl Into<String>, text: impl Into<String>, image: &ImagePayload) -> Self {
        Self::new(model, vec![ChatTurn::user_with_image(text, image)])
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn skip_delay(mut self, skip: bool) -> Self {
        self.skip_delay = skip;
        self
    }

    /// 最后一条用户消息的文本
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(ChatTurn::text)
    }
}

/// token 用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 外部模型返回的响应
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub request_id: u64,
    pub status: u16,
    pub content: String,
    pub usage: Option<TokenUsage>,
    /// 本次成功前经历的重试次数
    pub retries: u32,
}
