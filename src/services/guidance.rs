//! 苏格拉底式引导 - 能力层
//!
//! 每次调用根据调用方传入的对话状态生成下一轮提问，自身不保存任何会话。
//! 是否结束引导由调用方决定，这里总会给出下一个问题。

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppResult, BusinessError};
use crate::infrastructure::ModelGateway;
use crate::models::{DialogueState, ModelRequest};
use crate::services::prompts;
use crate::utils::text::{count_questions, redact, retain_first_question, truncate_at_boundary};

/// 答案被替换成的占位文字
const ANSWER_PLACEHOLDER: &str = "（这个留给你自己算出来）";

/// 模型没有提问时补上的问题
const FALLBACK_QUESTION: &str = "你觉得下一步应该怎么做？";

/// 引导阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceStage {
    /// 第一轮，没有任何历史
    Opening,
    /// 已有对话，根据学生回答继续
    Steering,
}

impl GuidanceStage {
    pub fn of(state: &DialogueState, latest: Option<&str>) -> Self {
        let has_latest = latest.is_some_and(|s| !s.trim().is_empty());
        if state.history.is_empty() && !has_latest {
            GuidanceStage::Opening
        } else {
            GuidanceStage::Steering
        }
    }
}

/// 一轮导师回复
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidanceTurn {
    pub text: String,
    pub stage: GuidanceStage,
    /// 本轮之后还能进行的轮数
    pub rounds_remaining: u32,
}

/// 引导服务
pub struct GuidanceEngine {
    gateway: Arc<ModelGateway>,
    text_model: String,
    max_chars: usize,
    history_window: usize,
    max_rounds: u32,
}

impl GuidanceEngine {
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            gateway,
            text_model: config.text_model.clone(),
            max_chars: config.guidance_max_chars,
            history_window: config.guidance_history_window,
            max_rounds: config.max_dialogue_rounds,
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// 生成下一轮提问
    pub async fn next_turn(
        &self,
        state: &DialogueState,
        latest: Option<&str>,
    ) -> AppResult<GuidanceTurn> {
        if state.turn >= self.max_rounds {
            return Err(BusinessError::DialogueLimitReached {
                max_rounds: self.max_rounds,
            }
            .into());
        }

        let stage = GuidanceStage::of(state, latest);
        let prompt = match stage {
            GuidanceStage::Opening => prompts::guidance_opening(&state.question, &state.diagnosis),
            GuidanceStage::Steering => prompts::guidance_steering(
                &state.question,
                &state.diagnosis,
                state.recent(self.history_window),
                latest,
            ),
        };

        info!("[引导] 第 {} 轮 ({:?})", state.turn + 1, stage);

        let request = ModelRequest::user_text(&self.text_model, prompt)
            .max_tokens(800)
            .skip_delay(true);
        let response = self.gateway.submit(request).await?;

        let text = self.polish(&response.content, state.question.correct_answer.as_deref());
        debug!("[引导] 回复长度: {} 字符", text.chars().count());

        Ok(GuidanceTurn {
            text,
            stage,
            rounds_remaining: state.rounds_remaining(self.max_rounds).saturating_sub(1),
        })
    }

    /// 整理模型回复：隐藏答案、只留一个问题、控制长度
    fn polish(&self, raw: &str, correct_answer: Option<&str>) -> String {
        let text = match correct_answer {
            Some(answer) => redact(raw.trim(), answer, ANSWER_PLACEHOLDER),
            None => raw.trim().to_string(),
        };

        let text = truncate_at_boundary(&retain_first_question(&text), self.max_chars);
        if count_questions(&text) > 0 {
            return text;
        }

        let room = self.max_chars.saturating_sub(FALLBACK_QUESTION.chars().count());
        let mut text = truncate_at_boundary(&text, room);
        text.push_str(FALLBACK_QUESTION);
        // 上限比补充问题还短时，补充问题本身也要截断
        truncate_at_boundary(&text, self.max_chars)
    }
}
