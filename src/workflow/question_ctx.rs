//! 题目处理上下文
//!
//! 封装"我正在处理试卷上的第几题"这一信息

use std::fmt::Display;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 题目在识别结果中的位置（从1开始）
    pub question_index: usize,

    /// 识别出的题目总数（仅用于日志显示）
    pub total: usize,

    /// 试卷上的题号
    pub question_no: String,
}

impl QuestionCtx {
    /// 创建新的题目上下文
    pub fn new(question_index: usize, total: usize, question_no: impl Into<String>) -> Self {
        Self {
            question_index,
            total,
            question_no: question_no.into(),
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[题目 {}/{} 题号#{}]",
            self.question_index, self.total, self.question_no
        )
    }
}
