//! 试卷识别与单题分析 - 能力层

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppResult, BusinessError};
use crate::extraction::{extract, ShapeHint};
use crate::infrastructure::ModelGateway;
use crate::models::{ImagePayload, ModelRequest, OcrQuestion};
use crate::services::prompts;

/// 试卷 OCR 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamOcr {
    pub questions: Vec<OcrQuestion>,
    /// 是否解析出了结构化题目
    pub parsed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub raw_text: String,
}

pub struct RecognitionService {
    gateway: Arc<ModelGateway>,
    vision_model: String,
    text_model: String,
}

impl RecognitionService {
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            gateway,
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
        }
    }

    /// 识别试卷上的题目和学生作答
    ///
    /// 解析失败不算错误，返回空题目列表和原始回复。
    pub async fn ocr_exam(&self, image: &ImagePayload) -> AppResult<ExamOcr> {
        let request = ModelRequest::user_vision(&self.vision_model, prompts::exam_ocr(), image);
        let raw_text = self.gateway.submit(request).await?.content;

        let questions = extract(&raw_text, ShapeHint::Keyed("questions"))
            .and_then(|r| r.field::<Vec<OcrQuestion>>("questions"));

        match questions {
            Some(questions) => {
                info!("[OCR] 识别到 {} 道题目", questions.len());
                Ok(ExamOcr {
                    questions,
                    parsed: true,
                    note: None,
                    raw_text,
                })
            }
            None => {
                warn!("[OCR] 无法解析 JSON，返回原始识别结果");
                Ok(ExamOcr {
                    questions: Vec::new(),
                    parsed: false,
                    note: Some("无法解析 JSON，以下是原始识别结果".to_string()),
                    raw_text,
                })
            }
        }
    }

    /// 单题分析，返回自然语言结果
    ///
    /// 有图片时用视觉模型，否则只分析题目文字。
    pub async fn analyze_question(
        &self,
        question: &str,
        image: Option<&ImagePayload>,
    ) -> AppResult<String> {
        let prompt = prompts::question_analysis(question);
        let request = match image {
            Some(image) => ModelRequest::user_vision(&self.vision_model, prompt, image),
            None if !question.trim().is_empty() => ModelRequest::user_text(&self.text_model, prompt),
            None => return Err(BusinessError::EmptyMessage.into()),
        };
        Ok(self.gateway.submit(request).await?.content)
    }
}
