//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整验证流程
//!
//! 流程顺序：
//! 1. 模型独立解题 → 得到正确答案和对学生答案的判断
//! 2. 与老师批改标记比较 → 得到最终判定
//!
//! 解题失败不会中断流程，只会让模型判断变成"未判断"。

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::extraction::{extract, ShapeHint};
use crate::infrastructure::ModelGateway;
use crate::models::{ModelJudgment, ModelRequest, OcrQuestion, QuestionRecord, SolveResult, TeacherMark, Verdict};
use crate::services::{prompts, verify};
use crate::utils::truncate_text;
use crate::workflow::question_ctx::QuestionCtx;

/// 一道题的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedQuestion {
    pub record: QuestionRecord,
    pub verdict: Verdict,
}

/// 题目处理流程
///
/// - 编排解题和验证
/// - 只依赖访问控制器和纯函数能力
/// - 不关心其他题目
pub struct QuestionFlow {
    gateway: Arc<ModelGateway>,
    text_model: String,
    verbose_logging: bool,
}

impl QuestionFlow {
    /// 创建新的题目处理流程
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            gateway,
            text_model: config.text_model.clone(),
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(&self, question: &OcrQuestion, ctx: &QuestionCtx) -> AnalyzedQuestion {
        if self.verbose_logging {
            info!("{} 题目: {}", ctx, truncate_text(&question.question_content, 60));
        }

        // ========== 步骤 1: 模型解题 ==========
        let solved = self.solve(question, ctx).await;

        // ========== 步骤 2: 与老师批改比较 ==========
        let record = QuestionRecord {
            question_no: question.question_no.clone(),
            question_type: question.question_type.clone(),
            content: question.question_content.clone(),
            student_answer: question.student_answer.clone(),
            teacher_mark: TeacherMark::from_label(&question.teacher_mark),
            correct_answer: solved.correct_answer,
            model_judgment: ModelJudgment::from(solved.is_correct),
            reasoning: solved.reasoning,
        };
        let verdict = verify(&record);

        info!(
            "{} 老师标记: {}, 模型判断: {:?} → {} (置信度 {})",
            ctx,
            record.teacher_mark,
            record.model_judgment,
            verdict.final_status.label(),
            verdict.confidence
        );

        AnalyzedQuestion { record, verdict }
    }

    /// 调用模型解题，任何失败都降级成"未判断"
    async fn solve(&self, question: &OcrQuestion, ctx: &QuestionCtx) -> SolveResult {
        let request = ModelRequest::user_text(&self.text_model, prompts::solve(question)).max_tokens(500);

        let raw_text = match self.gateway.submit(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("{} ⚠️ 解题失败: {}", ctx, e);
                return SolveResult {
                    correct_answer: "解析失败".to_string(),
                    is_correct: None,
                    reasoning: e.to_string(),
                };
            }
        };

        match extract(&raw_text, ShapeHint::Object).and_then(|r| r.deserialize::<SolveResult>()) {
            Some(solved) => solved,
            None => {
                warn!("{} ⚠️ 无法解析解题结果", ctx);
                SolveResult {
                    correct_answer: "无法确定".to_string(),
                    is_correct: None,
                    reasoning: truncate_text(&raw_text, 200),
                }
            }
        }
    }
}
