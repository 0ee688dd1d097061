//! 错题检测 - 能力层
//!
//! 只负责"看图找错题"，不关心后续的诊断和引导。

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::GatewayError;
use crate::extraction::{extract, ShapeHint};
use crate::infrastructure::ModelGateway;
use crate::models::{FlaggedMistake, ImagePayload, ModelRequest};
use crate::services::prompts;
use crate::utils::truncate_text;

/// 检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionOutcome {
    pub mistakes: Vec<FlaggedMistake>,
    pub summary: String,
    /// 学情分析；生成失败时为 None，不影响检测结果
    pub detailed_analysis: Option<String>,
    /// 需要学生确认检测结果
    pub need_confirmation: bool,
    /// 模型原始回复，便于人工查看
    pub raw_text: String,
}

/// 智能分析第一步的检测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MistakeScan {
    /// 无法从回复中解析出错题列表时为 None，和"没有错题"区分开
    pub mistakes: Option<Vec<FlaggedMistake>>,
    pub raw_text: String,
}

/// 错题检测服务
///
/// 职责：
/// - 自动检测（根据红色 × 找错题）
/// - 分析用户框选的区域
/// - 可选地生成学情分析
pub struct DetectionService {
    gateway: Arc<ModelGateway>,
    vision_model: String,
    text_model: String,
}

impl DetectionService {
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            gateway,
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
        }
    }

    /// 快速检测
    ///
    /// `user_marks` 为 0 时自动检测，否则分析用户框选的区域。
    pub async fn detect(
        &self,
        image: &ImagePayload,
        user_marks: usize,
        with_analysis: bool,
    ) -> Result<DetectionOutcome, GatewayError> {
        let (request, hint) = if user_marks == 0 {
            info!("[错题检测] 自动检测模式");
            (
                ModelRequest::user_vision(&self.vision_model, prompts::detection(), image)
                    .max_tokens(500)
                    .skip_delay(true),
                ShapeHint::MistakeDetection,
            )
        } else {
            info!("[错题检测] 用户标记模式，共 {} 个区域", user_marks);
            (
                ModelRequest::user_vision(&self.vision_model, prompts::marked_regions(user_marks), image)
                    .max_tokens(2000),
                ShapeHint::MistakeList,
            )
        };

        let raw_text = self.gateway.submit(request).await?.content;
        let record = extract(&raw_text, hint);

        let Some(mistakes) = record.as_ref().and_then(|r| r.mistakes()) else {
            warn!("[错题检测] ❌ 无法从回复中解析错题: {}", truncate_text(&raw_text, 100));
            return Ok(degraded_outcome(user_marks, raw_text));
        };

        info!("[错题检测] ✅ 解析成功，共 {} 道错题", mistakes.len());

        if mistakes.is_empty() {
            let summary = record
                .as_ref()
                .and_then(|r| r.get_str("summary"))
                .unwrap_or("未发现错题")
                .to_string();
            return Ok(DetectionOutcome {
                mistakes,
                summary,
                detailed_analysis: None,
                need_confirmation: false,
                raw_text,
            });
        }

        let mut detailed_analysis = record
            .as_ref()
            .and_then(|r| r.get_str("detailed_analysis"))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        if detailed_analysis.is_none() && with_analysis {
            detailed_analysis = match self.analyze_learning(image, &mistakes).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("[错题检测] 学情分析生成失败: {}", e);
                    None
                }
            };
        }

        Ok(DetectionOutcome {
            summary: format!("共找到{}道错题", mistakes.len()),
            mistakes,
            detailed_analysis,
            need_confirmation: true,
            raw_text,
        })
    }

    /// 找错题（智能分析的第一步）
    pub async fn scan(&self, image: &ImagePayload, user_marks: usize) -> Result<MistakeScan, GatewayError> {
        let request = if user_marks == 0 {
            ModelRequest::user_vision(&self.vision_model, prompts::detection(), image).max_tokens(1500)
        } else {
            ModelRequest::user_vision(&self.vision_model, prompts::marked_regions(user_marks), image)
                .max_tokens(2000)
        };

        let raw_text = self.gateway.submit(request).await?.content;
        let mistakes = extract(&raw_text, ShapeHint::Keyed("mistakes")).and_then(|r| r.mistakes());
        if mistakes.is_none() {
            warn!("[错题检测] ❌ 无法从回复中解析错题: {}", truncate_text(&raw_text, 100));
        }
        Ok(MistakeScan { mistakes, raw_text })
    }

    /// 学情分析：先描述试卷，再结合错题写报告
    pub async fn analyze_learning(
        &self,
        image: &ImagePayload,
        mistakes: &[FlaggedMistake],
    ) -> Result<String, GatewayError> {
        let describe = ModelRequest::user_vision(&self.vision_model, prompts::paper_description(), image)
            .max_tokens(1000);
        let paper_content = self.gateway.submit(describe).await?.content;
        info!("[错题检测] 试卷内容识别完成，长度: {} 字符", paper_content.chars().count());

        let analysis = ModelRequest::user_text(
            &self.text_model,
            prompts::learning_analysis_brief(mistakes, &paper_content),
        )
        .max_tokens(2500);
        Ok(self.gateway.submit(analysis).await?.content)
    }
}

/// 解析失败时的降级结果
///
/// 用户框选模式下按区域数量生成占位错题，并把原始回复作为分析内容。
fn degraded_outcome(user_marks: usize, raw_text: String) -> DetectionOutcome {
    if user_marks == 0 {
        return DetectionOutcome {
            mistakes: Vec::new(),
            summary: "识别失败,请重试".to_string(),
            detailed_analysis: None,
            need_confirmation: false,
            raw_text,
        };
    }

    let mistakes = (1..=user_marks)
        .map(|i| FlaggedMistake {
            question: Some("用户框选的题目".to_string()),
            student_answer: Some("见下方分析".to_string()),
            correct_answer: Some("见下方分析".to_string()),
            knowledge_point: Some("综合分析".to_string()),
            suggestion: Some("见下方分析".to_string()),
            ..FlaggedMistake::bare(format!("框选题目{}", i), "需要分析")
        })
        .collect();

    let detailed_analysis = if raw_text.trim().chars().count() > 10 {
        raw_text.clone()
    } else {
        "AI返回的分析内容过短，可能是图片质量不佳，请上传更清晰的图片".to_string()
    };

    DetectionOutcome {
        mistakes,
        summary: format!("已框选{}道题目，解析失败，见详细分析", user_marks),
        detailed_analysis: Some(detailed_analysis),
        need_confirmation: true,
        raw_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_marks_create_placeholders() {
        let outcome = degraded_outcome(2, "第一题学生把符号写反了，第二题漏写单位".to_string());
        assert_eq!(outcome.mistakes.len(), 2);
        assert_eq!(outcome.mistakes[1].question_no, "框选题目2");
        assert_eq!(outcome.detailed_analysis.as_deref(), Some(outcome.raw_text.as_str()));
        assert!(outcome.need_confirmation);
    }

    #[test]
    fn test_degraded_short_reply_gets_note() {
        let outcome = degraded_outcome(1, "看不清".to_string());
        assert!(outcome.detailed_analysis.unwrap().contains("过短"));
    }

    #[test]
    fn test_degraded_auto_mode_is_empty() {
        let outcome = degraded_outcome(0, "图片模糊".to_string());
        assert!(outcome.mistakes.is_empty());
        assert!(!outcome.need_confirmation);
        assert_eq!(outcome.raw_text, "图片模糊");
    }
}
