//! 模型输出解析 - 能力层
//!
//! 把模型返回的自然语言文本转换成结构化记录。
//!
//! 解析按固定顺序依次尝试，第一个成功的策略直接返回：
//! 1. ```json 代码块
//! 2. 第一个 `{` 到最后一个 `}`
//! 3. 以字段名为锚点的扫描（只在要求字段时使用）
//! 4. 列表行题号（只用于错题列表）
//! 5. 自然语言关键词（只用于错题检测）
//!
//! 每个策略要么给出完整对象，要么什么都不给，不会合并多个策略的部分结果。
//! 解析失败不是错误：返回 `None`，由调用方降级处理。

mod strategies;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::FlaggedMistake;

/// 调用方期望的结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeHint {
    /// 任意 JSON 对象
    Object,
    /// 必须包含指定字段的对象
    Keyed(&'static str),
    /// 错题列表 `{"mistakes": [...]}`，允许列表行兜底
    MistakeList,
    /// 错题检测，在错题列表的基础上允许自然语言兜底
    MistakeDetection,
}

impl ShapeHint {
    fn required_key(self) -> Option<&'static str> {
        match self {
            ShapeHint::Object => None,
            ShapeHint::Keyed(key) => Some(key),
            ShapeHint::MistakeList | ShapeHint::MistakeDetection => Some("mistakes"),
        }
    }
}

/// 产生记录的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FencedBlock,
    BracketScan,
    KeyAnchored,
    LineHeuristic,
    KeywordFallback,
}

impl Strategy {
    const ORDER: [Strategy; 5] = [
        Strategy::FencedBlock,
        Strategy::BracketScan,
        Strategy::KeyAnchored,
        Strategy::LineHeuristic,
        Strategy::KeywordFallback,
    ];

    fn run(self, text: &str, hint: ShapeHint) -> Option<Map<String, Value>> {
        let key = hint.required_key();
        match self {
            Strategy::FencedBlock => strategies::fenced_block(text, key),
            Strategy::BracketScan => strategies::bracket_scan(text, key),
            Strategy::KeyAnchored => key.and_then(|k| strategies::key_anchored(text, k)),
            Strategy::LineHeuristic => match hint {
                ShapeHint::MistakeList | ShapeHint::MistakeDetection => {
                    strategies::line_heuristic(text)
                }
                _ => None,
            },
            Strategy::KeywordFallback => match hint {
                ShapeHint::MistakeDetection => strategies::keyword_fallback(text),
                _ => None,
            },
        }
    }
}

/// 解析出的结构化记录（完整对象）
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    fields: Map<String, Value>,
    strategy: Strategy,
}

impl ExtractedRecord {
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// 字符串字段，去掉首尾空白
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str).map(str::trim)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// 整个记录反序列化为目标类型
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).ok()
    }

    /// 单个字段反序列化为目标类型
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_value(self.fields.get(key)?.clone()).ok()
    }

    /// `mistakes` 数组；任何一项不合法时整个返回 `None`
    pub fn mistakes(&self) -> Option<Vec<FlaggedMistake>> {
        self.field("mistakes")
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// 从模型输出中解析结构化记录
pub fn extract(text: &str, hint: ShapeHint) -> Option<ExtractedRecord> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    Strategy::ORDER.into_iter().find_map(|strategy| {
        let fields = strategy.run(text, hint)?;
        debug!("[解析] 使用策略 {:?} 得到 {} 个字段", strategy, fields.len());
        Some(ExtractedRecord { fields, strategy })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_round_trip_is_stable() {
        let text = "好的，结果如下：\n```json\n{\"mistakes\": [{\"question_no\": 4, \"reason\": \"计算错误\"}], \"summary\": \"共1道\"}\n```\n希望有帮助";
        let first = extract(text, ShapeHint::MistakeDetection).unwrap();
        assert_eq!(first.strategy(), Strategy::FencedBlock);

        let reserialized = format!(
            "```json\n{}\n```",
            serde_json::to_string_pretty(&first.clone().into_value()).unwrap()
        );
        let second = extract(&reserialized, ShapeHint::MistakeDetection).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_mistake_phrases_give_empty_list() {
        for text in ["没有错题", "未发现错题"] {
            let record = extract(text, ShapeHint::MistakeDetection).unwrap();
            assert_eq!(record.strategy(), Strategy::KeywordFallback);
            assert_eq!(record.mistakes().unwrap(), Vec::new());
        }
    }

    #[test]
    fn test_bullet_lines_give_default_reason() {
        let record = extract("- 第4题\n- 第9题", ShapeHint::MistakeList).unwrap();
        assert_eq!(record.strategy(), Strategy::LineHeuristic);
        let mistakes = record.mistakes().unwrap();
        assert_eq!(mistakes.len(), 2);
        assert_eq!(mistakes[0].question_no, "4");
        assert_eq!(mistakes[1].question_no, "9");
        assert!(mistakes.iter().all(|m| m.reason == "错题"));
    }

    #[test]
    fn test_keyword_fallback_only_for_detection() {
        let text = "我看到第12题和第3题有红叉";
        assert!(extract(text, ShapeHint::MistakeList).is_none());
        let record = extract(text, ShapeHint::MistakeDetection).unwrap();
        let numbers: Vec<_> = record
            .mistakes()
            .unwrap()
            .into_iter()
            .map(|m| m.question_no)
            .collect();
        assert_eq!(numbers, vec!["3", "12"]);
    }

    #[test]
    fn test_object_hint_with_prose() {
        let text = "诊断如下 {\"knowledge_point\": \"一元一次方程\", \"error_type\": \"计算错误\"} 以上";
        let record = extract(text, ShapeHint::Object).unwrap();
        assert_eq!(record.strategy(), Strategy::BracketScan);
        assert_eq!(record.get_str("knowledge_point"), Some("一元一次方程"));
    }

    #[test]
    fn test_keyed_hint_anchors_on_field() {
        let text = r#"格式示例 {"a": 1}，识别结果 {"questions": [{"question_no": "1"}]}"#;
        let record = extract(text, ShapeHint::Keyed("questions")).unwrap();
        assert_eq!(record.strategy(), Strategy::KeyAnchored);
        assert!(record.get("a").is_none());
    }

    #[test]
    fn test_plain_prose_has_no_record() {
        assert!(extract("这道题考查的是方程", ShapeHint::Object).is_none());
        assert!(extract("   ", ShapeHint::MistakeDetection).is_none());
    }

    #[test]
    fn test_invalid_mistake_entry_rejects_whole_list() {
        let record = extract(r#"{"mistakes": [{"reason": "缺题号"}]}"#, ShapeHint::MistakeList).unwrap();
        assert!(record.mistakes().is_none());
    }
}
