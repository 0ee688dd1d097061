use serde::{Deserialize, Serialize};

/// 最终判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// 错题（两方一致）
    ConfirmedMistake,
    /// 正确（两方一致）
    ConfirmedCorrect,
    /// 疑似错题（只有老师标记）
    LikelyMistake,
    /// 需要学生确认
    NeedsConfirmation,
}

impl FinalStatus {
    pub fn label(self) -> &'static str {
        match self {
            FinalStatus::ConfirmedMistake => "错题",
            FinalStatus::ConfirmedCorrect => "正确",
            FinalStatus::LikelyMistake => "疑似错题",
            FinalStatus::NeedsConfirmation => "需要确认",
        }
    }

    /// 是否需要交给人确认
    pub fn needs_human(self) -> bool {
        matches!(self, FinalStatus::LikelyMistake | FinalStatus::NeedsConfirmation)
    }
}

/// 一道题的综合判定结果，不单独持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub final_status: FinalStatus,
    /// 0..=100
    pub confidence: u8,
    /// 按触发顺序排列的原因
    pub rationale: Vec<String>,
}

impl Verdict {
    pub fn reason_text(&self) -> String {
        self.rationale.join("; ")
    }
}
