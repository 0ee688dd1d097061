//! 辅导对话

use serde::{Deserialize, Serialize};

use crate::models::question::Diagnosis;
use crate::models::request::{ImagePayload, Role};

/// 调用方保存的一条历史消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 一次对话请求，历史由调用方每次完整提交
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub image: Option<ImagePayload>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }
}

/// 回复模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// 普通的引导式回答
    General,
    /// 识别出错题求助，已诊断并开始引导
    Guidance,
}

/// 对话回复
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub mode: ChatMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
    /// 从图片识别出的题目
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl ChatReply {
    pub fn general(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: ChatMode::General,
            diagnosis: None,
            question: None,
        }
    }
}
