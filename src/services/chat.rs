//! 辅导对话 - 能力层
//!
//! 普通问答也走苏格拉底式引导：只提问，不直接给答案。
//! 会话历史由调用方保存，每次请求完整提交。

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::GatewayError;
use crate::infrastructure::ModelGateway;
use crate::models::{ChatMessage, ChatReply, ChatRequest, ChatTurn, ModelRequest, Role};
use crate::services::prompts;
use crate::utils::text::take_chars;

/// 最多带上的历史条数
const HISTORY_LIMIT: usize = 10;
/// 每条历史的字符上限
const HISTORY_ENTRY_CHARS: usize = 1000;
/// 纯文字提问的字符上限
const TEXT_PROMPT_CHARS: usize = 1000;
/// 回复的字符上限
const REPLY_CHARS: usize = 2000;

/// 学生带图求助时，这些说法会触发诊断
const HELP_KEYWORDS: [&str; 10] = [
    "不会", "错了", "错误", "不懂", "不会做", "做错了", "讲解", "怎么做", "帮我", "请",
];

/// 带图消息是否是错题求助
pub fn wants_diagnosis(message: &str) -> bool {
    HELP_KEYWORDS.iter().any(|k| message.contains(k))
}

/// 对话服务
pub struct ChatService {
    gateway: Arc<ModelGateway>,
    vision_model: String,
    text_model: String,
}

impl ChatService {
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            gateway,
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
        }
    }

    /// 普通的引导式回答
    pub async fn reply(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        let model_request = self.build_request(request);
        info!(
            "[对话] 模型: {}, 历史 {} 条",
            model_request.model,
            model_request.messages.len() - 1
        );
        let content = self.gateway.submit(model_request).await?.content;
        Ok(ChatReply::general(take_chars(content.trim(), REPLY_CHARS)))
    }

    fn build_request(&self, request: &ChatRequest) -> ModelRequest {
        let mut turns = recent_history(&request.history);
        let message = request.message.trim();
        let model = match &request.image {
            Some(image) => {
                turns.push(ChatTurn::user_with_image(prompts::chat_with_image(message), image));
                &self.vision_model
            }
            None => {
                turns.push(ChatTurn::user(take_chars(
                    &prompts::chat_text(message),
                    TEXT_PROMPT_CHARS,
                )));
                &self.text_model
            }
        };
        ModelRequest::new(model, turns)
    }
}

/// 最近的历史消息，跳过空消息，每条截断到上限
fn recent_history(history: &[ChatMessage]) -> Vec<ChatTurn> {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    history[start..]
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| {
            let content = take_chars(&m.content, HISTORY_ENTRY_CHARS);
            match m.role {
                Role::System => ChatTurn::system(content),
                Role::User => ChatTurn::user(content),
                Role::Assistant => ChatTurn::assistant(content),
            }
        })
        .collect()
}
