//! 错题验证 - 能力层
//!
//! 综合模型判断和老师批改标记，得出一道题的最终判定。
//! 纯函数，不调用模型。

use crate::models::{FinalStatus, ModelJudgment, QuestionRecord, Verdict};

/// 验证一道题
///
/// 规则按顺序匹配，第一条命中的规则决定状态和置信度：
///
/// | 模型判断 | 老师标记 | 结果 | 置信度 |
/// |---|---|---|---|
/// | 错 | × | 错题 | 95 |
/// | 对 | √ | 正确 | 95 |
/// | 对 | × | 需要确认 | 50 |
/// | 未判断 | × | 疑似错题 | 70 |
/// | 其他 | | 需要确认 | 0 |
///
/// 老师打 √ 而模型未判断时没有单独规则，落到默认的需要确认。
pub fn verify(record: &QuestionRecord) -> Verdict {
    let teacher_wrong = record.teacher_mark.says_wrong();
    let teacher_correct = record.teacher_mark.says_correct();

    let (final_status, confidence, reason) = match record.model_judgment {
        ModelJudgment::Incorrect if teacher_wrong => (
            FinalStatus::ConfirmedMistake,
            95,
            "AI和老师都认为是错题".to_string(),
        ),
        ModelJudgment::Correct if teacher_correct => (
            FinalStatus::ConfirmedCorrect,
            95,
            "AI和老师都认为正确".to_string(),
        ),
        ModelJudgment::Correct if teacher_wrong => (
            FinalStatus::NeedsConfirmation,
            50,
            format!("AI认为对,老师标记为{}", record.teacher_mark),
        ),
        ModelJudgment::Undetermined if teacher_wrong => (
            FinalStatus::LikelyMistake,
            70,
            "老师标记为错题,AI未能判断".to_string(),
        ),
        _ => (
            FinalStatus::NeedsConfirmation,
            0,
            "信号不足，需要人工确认".to_string(),
        ),
    };

    Verdict {
        final_status,
        confidence,
        rationale: vec![reason],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeacherMark;

    fn record(judgment: ModelJudgment, mark: TeacherMark) -> QuestionRecord {
        QuestionRecord {
            question_no: "4".to_string(),
            question_type: "选择题".to_string(),
            content: "1+1=?".to_string(),
            student_answer: "3".to_string(),
            teacher_mark: mark,
            correct_answer: "2".to_string(),
            model_judgment: judgment,
            reasoning: String::new(),
        }
    }

    fn status(judgment: ModelJudgment, mark: TeacherMark) -> (FinalStatus, u8) {
        let verdict = verify(&record(judgment, mark));
        (verdict.final_status, verdict.confidence)
    }

    #[test]
    fn test_both_signals_agree_on_mistake() {
        let verdict = verify(&record(ModelJudgment::Incorrect, TeacherMark::Cross));
        assert_eq!(verdict.final_status, FinalStatus::ConfirmedMistake);
        assert_eq!(verdict.confidence, 95);
        assert_eq!(verdict.reason_text(), "AI和老师都认为是错题");
    }

    #[test]
    fn test_both_signals_agree_on_correct() {
        assert_eq!(
            status(ModelJudgment::Correct, TeacherMark::Check),
            (FinalStatus::ConfirmedCorrect, 95)
        );
    }

    #[test]
    fn test_conflict_needs_confirmation() {
        let verdict = verify(&record(ModelJudgment::Correct, TeacherMark::Cross));
        assert_eq!(verdict.final_status, FinalStatus::NeedsConfirmation);
        assert_eq!(verdict.confidence, 50);
        assert_eq!(verdict.rationale, vec!["AI认为对,老师标记为×".to_string()]);
    }

    #[test]
    fn test_teacher_only_is_likely_mistake() {
        assert_eq!(
            status(ModelJudgment::Undetermined, TeacherMark::Cross),
            (FinalStatus::LikelyMistake, 70)
        );
    }

    #[test]
    fn test_teacher_check_with_undetermined_model_falls_through() {
        assert_eq!(
            status(ModelJudgment::Undetermined, TeacherMark::Check),
            (FinalStatus::NeedsConfirmation, 0)
        );
    }

    #[test]
    fn test_neutral_marks_fall_through() {
        for mark in [
            TeacherMark::Circle,
            TeacherMark::Underline,
            TeacherMark::Dot,
            TeacherMark::None,
            TeacherMark::Unknown,
        ] {
            assert_eq!(
                status(ModelJudgment::Incorrect, mark),
                (FinalStatus::NeedsConfirmation, 0)
            );
            assert_eq!(
                status(ModelJudgment::Correct, mark),
                (FinalStatus::NeedsConfirmation, 0)
            );
        }
        // 模型判错但老师打了 √ 也没有专门规则
        assert_eq!(
            status(ModelJudgment::Incorrect, TeacherMark::Check),
            (FinalStatus::NeedsConfirmation, 0)
        );
    }
}
