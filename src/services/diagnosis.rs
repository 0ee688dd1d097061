//! 错因诊断 - 能力层

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppResult, BusinessError};
use crate::extraction::{extract, ShapeHint};
use crate::infrastructure::ModelGateway;
use crate::models::{Diagnosis, ImagePayload, ModelRequest};
use crate::services::prompts;

/// 诊断结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisReport {
    pub diagnosis: Diagnosis,
    /// 模型输出无法结构化，使用了兜底诊断
    pub degraded: bool,
    /// 诊断所针对的题目文字（来自参数或图片识别）
    pub question: String,
    pub raw_text: String,
}

/// 诊断服务
pub struct DiagnosisService {
    gateway: Arc<ModelGateway>,
    vision_model: String,
    text_model: String,
}

impl DiagnosisService {
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            gateway,
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
        }
    }

    /// 诊断学生的错误
    ///
    /// 题目文字为空时先从图片中识别题目。
    pub async fn diagnose(
        &self,
        question: &str,
        student_answer: &str,
        image: Option<&ImagePayload>,
    ) -> AppResult<DiagnosisReport> {
        let question = match (question.trim(), image) {
            (q, _) if !q.is_empty() => q.to_string(),
            (_, Some(image)) => {
                info!("[诊断] 题目为空，先从图片识别题目");
                let request =
                    ModelRequest::user_vision(&self.vision_model, prompts::question_from_image(), image)
                        .max_tokens(800);
                self.gateway.submit(request).await?.content.trim().to_string()
            }
            (_, None) => return Err(BusinessError::EmptyMessage.into()),
        };

        let request = ModelRequest::user_text(
            &self.text_model,
            prompts::diagnosis(&question, student_answer),
        )
        .max_tokens(1000);
        let raw_text = self.gateway.submit(request).await?.content;

        let parsed = extract(&raw_text, ShapeHint::Object).and_then(|r| r.deserialize::<Diagnosis>());
        let (diagnosis, degraded) = match parsed {
            Some(diagnosis) if !diagnosis.knowledge_point.is_empty() => (diagnosis, false),
            _ => {
                warn!("[诊断] 无法解析诊断结果，使用原始文本");
                (Diagnosis::fallback(raw_text.clone()), true)
            }
        };

        info!("[诊断] 知识点: {}, 错误类型: {}", diagnosis.knowledge_point, diagnosis.error_type);

        Ok(DiagnosisReport {
            diagnosis,
            degraded,
            question,
            raw_text,
        })
    }
}
