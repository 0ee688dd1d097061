use serde::{Deserialize, Serialize};

/// 老师批改标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherMark {
    /// ×
    Cross,
    /// √
    Check,
    /// 圈
    Circle,
    /// 线
    Underline,
    /// 点
    Dot,
    /// 未批改
    None,
    /// 无法识别
    Unknown,
}

static MARK_LABELS: phf::Map<&'static str, TeacherMark> = phf::phf_map! {
    "×" => TeacherMark::Cross,
    "x" => TeacherMark::Cross,
    "叉" => TeacherMark::Cross,
    "错" => TeacherMark::Cross,
    "cross" => TeacherMark::Cross,
    "√" => TeacherMark::Check,
    "✓" => TeacherMark::Check,
    "✔" => TeacherMark::Check,
    "对" => TeacherMark::Check,
    "钩" => TeacherMark::Check,
    "check" => TeacherMark::Check,
    "圈" => TeacherMark::Circle,
    "○" => TeacherMark::Circle,
    "circle" => TeacherMark::Circle,
    "线" => TeacherMark::Underline,
    "下划线" => TeacherMark::Underline,
    "underline" => TeacherMark::Underline,
    "点" => TeacherMark::Dot,
    "dot" => TeacherMark::Dot,
    "" => TeacherMark::None,
    "无" => TeacherMark::None,
    "无标记" => TeacherMark::None,
    "未批改" => TeacherMark::None,
    "none" => TeacherMark::None,
};

impl TeacherMark {
    /// 从 OCR 返回的标记文字解析
    pub fn from_label(label: &str) -> Self {
        let key = label.trim().to_lowercase();
        MARK_LABELS.get(key.as_str()).copied().unwrap_or(TeacherMark::Unknown)
    }

    /// 老师认为答错
    pub fn says_wrong(self) -> bool {
        self == TeacherMark::Cross
    }

    /// 老师认为答对
    pub fn says_correct(self) -> bool {
        self == TeacherMark::Check
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TeacherMark::Cross => "×",
            TeacherMark::Check => "√",
            TeacherMark::Circle => "圈",
            TeacherMark::Underline => "线",
            TeacherMark::Dot => "点",
            TeacherMark::None => "无",
            TeacherMark::Unknown => "未知",
        }
    }
}

impl std::fmt::Display for TeacherMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 模型对学生答案的独立判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelJudgment {
    Correct,
    Incorrect,
    /// 没有得到判断（调用失败或无法解析）
    Undetermined,
}

impl From<Option<bool>> for ModelJudgment {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => ModelJudgment::Correct,
            Some(false) => ModelJudgment::Incorrect,
            None => ModelJudgment::Undetermined,
        }
    }
}

/// 一道题的完整信息（OCR + 模型解答）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// 题号，不一定是数字
    pub question_no: String,
    pub question_type: String,
    pub content: String,
    pub student_answer: String,
    pub teacher_mark: TeacherMark,
    /// 模型给出的正确答案
    pub correct_answer: String,
    pub model_judgment: ModelJudgment,
    /// 模型的分析原因
    #[serde(default)]
    pub reasoning: String,
}

/// OCR 识别出的单道题目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrQuestion {
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub question_no: String,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub question_type: String,
    #[serde(default, alias = "question_text", deserialize_with = "deserialize_loose_string")]
    pub question_content: String,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub student_answer: String,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub teacher_mark: String,
}

/// 模型解题结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveResult {
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub correct_answer: String,
    #[serde(default, deserialize_with = "deserialize_loose_bool")]
    pub is_correct: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub reasoning: String,
}

/// 检测阶段标记出的错题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedMistake {
    #[serde(deserialize_with = "deserialize_loose_string")]
    pub question_no: String,
    #[serde(default = "default_reason", deserialize_with = "deserialize_loose_string")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

fn default_reason() -> String {
    "错题".to_string()
}

impl FlaggedMistake {
    /// 只有题号和原因的轻量记录
    pub fn bare(question_no: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            question_no: question_no.into(),
            reason: reason.into(),
            question: None,
            student_answer: None,
            correct_answer: None,
            knowledge_point: None,
            suggestion: None,
            analysis: None,
        }
    }
}

/// 错因诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub knowledge_point: String,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub error_type: String,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub problem_description: String,
    #[serde(default, deserialize_with = "deserialize_loose_string")]
    pub analysis: String,
}

impl Diagnosis {
    /// 模型输出无法结构化时的兜底诊断，保留原始文本
    pub fn fallback(raw_text: impl Into<String>) -> Self {
        Self {
            knowledge_point: "未识别".to_string(),
            error_type: "未分类".to_string(),
            problem_description: "分析失败".to_string(),
            analysis: raw_text.into(),
        }
    }

    /// 供引导提示词使用的一段文字
    pub fn summary(&self) -> String {
        format!(
            "知识点: {}; 错误类型: {}; 问题: {}",
            self.knowledge_point, self.error_type, self.problem_description
        )
    }
}

// 模型返回的字段可能是字符串、数字、布尔或 null，统一转成字符串
fn deserialize_loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct LooseStringVisitor;

    impl<'de> Visitor<'de> for LooseStringVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number, bool or null")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LooseStringVisitor)
}

// is_correct 可能是 true/false，也可能是 "true"/"正确" 之类的字符串
fn deserialize_loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct LooseBoolVisitor;

    impl<'de> Visitor<'de> for LooseBoolVisitor {
        type Value = Option<bool>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a bool, a yes/no string or null")
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(match value.trim().to_lowercase().as_str() {
                "true" | "yes" | "是" | "对" | "正确" => Some(true),
                "false" | "no" | "否" | "错" | "错误" => Some(false),
                _ => None,
            })
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(LooseBoolVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teacher_mark_labels() {
        assert_eq!(TeacherMark::from_label("×"), TeacherMark::Cross);
        assert_eq!(TeacherMark::from_label(" X "), TeacherMark::Cross);
        assert_eq!(TeacherMark::from_label("错"), TeacherMark::Cross);
        assert_eq!(TeacherMark::from_label("√"), TeacherMark::Check);
        assert_eq!(TeacherMark::from_label("对"), TeacherMark::Check);
        assert_eq!(TeacherMark::from_label("圈"), TeacherMark::Circle);
        assert_eq!(TeacherMark::from_label("无"), TeacherMark::None);
        assert_eq!(TeacherMark::from_label("红色波浪"), TeacherMark::Unknown);
        assert!(TeacherMark::Cross.says_wrong());
        assert!(!TeacherMark::Circle.says_wrong());
        assert!(!TeacherMark::Circle.says_correct());
    }

    #[test]
    fn test_question_no_accepts_numbers() {
        let mistake: FlaggedMistake = serde_json::from_str(r#"{"question_no": 12}"#).unwrap();
        assert_eq!(mistake.question_no, "12");
        assert_eq!(mistake.reason, "错题");
    }

    #[test]
    fn test_solve_result_loose_bool() {
        let solved: SolveResult = serde_json::from_str(
            r#"{"correct_answer": "B", "is_correct": "false", "reasoning": "计算失误"}"#,
        )
        .unwrap();
        assert_eq!(solved.is_correct, Some(false));

        let unknown: SolveResult =
            serde_json::from_str(r#"{"correct_answer": "B", "is_correct": "不确定"}"#).unwrap();
        assert_eq!(ModelJudgment::from(unknown.is_correct), ModelJudgment::Undetermined);
    }

    #[test]
    fn test_diagnosis_fallback_keeps_raw_text() {
        let diagnosis = Diagnosis::fallback("模型说了一段话");
        assert_eq!(diagnosis.knowledge_point, "未识别");
        assert_eq!(diagnosis.analysis, "模型说了一段话");
    }
}
