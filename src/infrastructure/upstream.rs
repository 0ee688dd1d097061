//! 上游模型传输 - 基础设施层
//!
//! 只负责把一个请求发出去并拿回状态码和原始响应体，
//! 不做重试、不做结果校验（这些由 `ModelGateway` 负责）。
//!
//! ## 技术栈
//! - 使用 `async-openai` 的请求类型构建消息（支持图片）
//! - 使用 `reqwest` 发送，以便拿到 429 等状态码和错误消息原文

use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
};
use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{ConfigError, GatewayError};
use crate::models::{ChatTurn, ContentPart, ModelRequest, Role};

/// 上游返回的原始结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

impl UpstreamReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// 传输层失败（没有拿到 HTTP 响应）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Network(String),
    /// 请求体无法构建，重试也没用
    InvalidRequest(String),
}

/// 上游模型接口
///
/// 访问控制器通过它发出每一次尝试；测试里用脚本化的实现替换。
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    async fn dispatch(
        &self,
        request_id: u64,
        request: &ModelRequest,
    ) -> Result<UpstreamReply, TransportError>;
}

/// 兼容 OpenAI Chat Completions 协议的上游（GLM、豆包等）
pub struct OpenAiCompatUpstream {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompatUpstream {
    /// 创建新的上游客户端
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/chat/completions",
                config.llm_api_base_url.trim_end_matches('/')
            ),
            api_key: config.llm_api_key.clone(),
        })
    }

    /// 把内部请求转换成 Chat Completions 请求体
    pub fn build_body(request: &ModelRequest) -> Result<CreateChatCompletionRequest, GatewayError> {
        let messages = request
            .messages
            .iter()
            .map(convert_turn)
            .collect::<Result<Vec<_>, _>>()?;

        CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(invalid_request)
    }
}

#[async_trait]
impl ChatUpstream for OpenAiCompatUpstream {
    async fn dispatch(
        &self,
        request_id: u64,
        request: &ModelRequest,
    ) -> Result<UpstreamReply, TransportError> {
        let body = Self::build_body(request)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        debug!(
            "[API #{}] POST {} (模型: {}, max_tokens: {})",
            request_id, self.endpoint, request.model, request.max_tokens
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        Ok(UpstreamReply { status, body: text })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

fn invalid_request(err: impl std::fmt::Display) -> GatewayError {
    GatewayError::InvalidRequest {
        message: err.to_string(),
    }
}

fn convert_turn(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage, GatewayError> {
    match turn.role {
        Role::System => {
            let msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.text())
                .build()
                .map_err(invalid_request)?;
            Ok(ChatCompletionRequestMessage::System(msg))
        }
        Role::Assistant => {
            let msg = ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text())
                .build()
                .map_err(invalid_request)?;
            Ok(ChatCompletionRequestMessage::Assistant(msg))
        }
        Role::User => {
            let msg = if turn.has_image() {
                // 使用 Vision API：构建包含文本和图片的内容
                let parts = turn
                    .parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => {
                            ChatCompletionRequestUserMessageContentPart::Text(
                                ChatCompletionRequestMessageContentPartText { text: text.clone() },
                            )
                        }
                        ContentPart::Image(url) => {
                            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                                ChatCompletionRequestMessageContentPartImage {
                                    image_url: ImageUrl {
                                        url: url.clone(),
                                        detail: Some(ImageDetail::Auto),
                                    },
                                },
                            )
                        }
                    })
                    .collect();

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(parts))
                    .build()
                    .map_err(invalid_request)?
            } else {
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text())
                    .build()
                    .map_err(invalid_request)?
            };
            Ok(ChatCompletionRequestMessage::User(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImagePayload;

    #[test]
    fn test_build_body_with_image_and_history() {
        let image = ImagePayload::from_base64("QUJD", "image/jpeg").unwrap();
        let request = ModelRequest::new(
            "glm-4v",
            vec![
                ChatTurn::system("你是一位老师"),
                ChatTurn::assistant("请上传试卷"),
                ChatTurn::user_with_image("找出错题", &image),
            ],
        )
        .max_tokens(500);

        let body = OpenAiCompatUpstream::build_body(&request).unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "glm-4v");
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][2]["role"], "user");
        let content = json["messages"][2]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[1]["text"], "找出错题");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = Config {
            llm_api_base_url: "http://localhost:9000/v1/".to_string(),
            ..Config::default()
        };
        let upstream = OpenAiCompatUpstream::new(&config).unwrap();
        assert_eq!(upstream.endpoint, "http://localhost:9000/v1/chat/completions");
    }
}
