//! 引导对话状态
//!
//! 状态完全由调用方持有，每轮请求都要带上完整历史；服务端不保存会话。

use serde::{Deserialize, Serialize};

use crate::error::BusinessError;

/// 发言方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Student,
    Tutor,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Student => "学生",
            Speaker::Tutor => "老师",
        }
    }
}

/// 一条对话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// 题目上下文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionContext {
    pub content: String,
    #[serde(default)]
    pub student_answer: Option<String>,
    /// 只用于过滤输出，不会写进提示词
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl QuestionContext {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// 引导对话状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueState {
    pub question: QuestionContext,
    /// 诊断结论文字
    pub diagnosis: String,
    #[serde(default)]
    pub history: Vec<DialogueEntry>,
    /// 已完成的轮数，只增不减
    #[serde(default)]
    pub turn: u32,
}

impl DialogueState {
    pub fn new(question: QuestionContext, diagnosis: impl Into<String>) -> Self {
        Self {
            question,
            diagnosis: diagnosis.into(),
            history: Vec::new(),
            turn: 0,
        }
    }

    /// 追加一轮（学生一条 + 老师一条），超过上限时拒绝
    pub fn advance(
        mut self,
        student: impl Into<String>,
        tutor: impl Into<String>,
        max_rounds: u32,
    ) -> Result<Self, BusinessError> {
        if self.turn >= max_rounds {
            return Err(BusinessError::DialogueLimitReached { max_rounds });
        }
        self.history.push(DialogueEntry {
            speaker: Speaker::Student,
            text: student.into(),
        });
        self.history.push(DialogueEntry {
            speaker: Speaker::Tutor,
            text: tutor.into(),
        });
        self.turn += 1;
        Ok(self)
    }

    /// 最近 `window` 条历史
    pub fn recent(&self, window: usize) -> &[DialogueEntry] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    pub fn rounds_remaining(&self, max_rounds: u32) -> u32 {
        max_rounds.saturating_sub(self.turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DialogueState {
        DialogueState::new(QuestionContext::new("2x+3=7，求x"), "移项时符号出错")
    }

    #[test]
    fn test_advance_appends_one_pair() {
        let next = state().advance("x=5", "你再看看移项？", 8).unwrap();
        assert_eq!(next.turn, 1);
        assert_eq!(next.history.len(), 2);
        assert_eq!(next.history[0].speaker, Speaker::Student);
        assert_eq!(next.history[1].speaker, Speaker::Tutor);
    }

    #[test]
    fn test_advance_stops_at_limit() {
        let mut current = state();
        for i in 0..2 {
            current = current.advance(format!("回答{}", i), "问题？", 2).unwrap();
        }
        let err = current.clone().advance("再来", "问题？", 2).unwrap_err();
        assert_eq!(err, BusinessError::DialogueLimitReached { max_rounds: 2 });
        assert_eq!(current.turn, 2);
        assert_eq!(current.rounds_remaining(2), 0);
    }

    #[test]
    fn test_recent_window() {
        let mut current = state();
        for i in 0..5 {
            current = current.advance(format!("回答{}", i), format!("提问{}", i), 8).unwrap();
        }
        let recent = current.recent(6);
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].text, "回答2");
        assert_eq!(recent[5].text, "提问4");
    }
}
