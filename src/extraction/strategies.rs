//! 解析策略
//!
//! 每个策略都是纯函数：要么返回一个完整解析的对象，要么什么都不返回。

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

/// 明确表示没有错题的说法
const NO_MISTAKE_PHRASES: [&str; 4] = ["没有错题", "未发现错题", "没有红叉", "全部正确"];

/// 单独出现时含义模糊的否定词，只有找不到题号时才算没有错题
const NEGATION_WORDS: [&str; 3] = ["没有", "未发现", "找不到"];

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```\s*json\s*(.*?)```").unwrap());

/// 列表行里的题号：第4题 / 4题 / 4、 / 4.
static BULLET_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第?\s*(\d+)\s*题|(?:^|\s)(\d+)\s*[、.．,，:：)）]").unwrap()
});

/// 自然语言回复里的题号
static ORDINAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"第?(\d+)题",
        r"(\d+)号",
        r"(?i)question\s*(\d+)",
        r"(?i)NO\.?(\d+)",
        r"(\d+)[、，,]",
        r"是[：:]\s*(\d+)",
        r"题号[：:]\s*(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// 只接受对象；要求字段时字段必须存在
fn accept(value: Value, required_key: Option<&str>) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) if required_key.map_or(true, |k| map.contains_key(k)) => Some(map),
        _ => None,
    }
}

/// 策略 1：```json 代码块
pub(super) fn fenced_block(text: &str, required_key: Option<&str>) -> Option<Map<String, Value>> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|inner| {
            let value = serde_json::from_str::<Value>(inner.as_str().trim()).ok()?;
            accept(value, required_key)
        })
}

/// 策略 2：第一个 `{` 到最后一个 `}`
pub(super) fn bracket_scan(text: &str, required_key: Option<&str>) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value = serde_json::from_str::<Value>(&text[start..=end]).ok()?;
    accept(value, required_key)
}

/// 策略 3：以字段名为锚点，向前寻找能完整解析出包含该字段的对象
///
/// 文本里有多个对象时，不会误取一个无关的对象。
pub(super) fn key_anchored(text: &str, key: &str) -> Option<Map<String, Value>> {
    let needle = format!("\"{}\"", key);

    text.match_indices(&needle).find_map(|(key_pos, _)| {
        text[..key_pos]
            .char_indices()
            .rev()
            .filter(|(_, c)| *c == '{')
            .find_map(|(open, _)| {
                let mut stream =
                    serde_json::Deserializer::from_str(&text[open..]).into_iter::<Value>();
                let value = stream.next()?.ok()?;
                // 对象必须覆盖锚点
                if open + stream.byte_offset() <= key_pos {
                    return None;
                }
                accept(value, Some(key))
            })
    })
}

/// 策略 4：逐行扫描列表项（`-` / `•` / `* `）中的题号
pub(super) fn line_heuristic(text: &str) -> Option<Map<String, Value>> {
    let mut seen = BTreeSet::new();
    let mut mistakes = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        let body = if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('•')) {
            rest
        } else if let Some(rest) = line.strip_prefix("* ") {
            rest
        } else {
            continue;
        };

        let number = BULLET_ORDINAL.captures(body).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
        });

        if let Some(number) = number {
            if seen.insert(number.clone()) {
                mistakes.push(json!({ "question_no": number, "reason": "错题" }));
            }
        }
    }

    if mistakes.is_empty() {
        return None;
    }
    Some(mistake_record(mistakes))
}

/// 策略 5：自然语言关键词兜底（只用于错题检测）
pub(super) fn keyword_fallback(text: &str) -> Option<Map<String, Value>> {
    if NO_MISTAKE_PHRASES.iter().any(|k| text.contains(k)) {
        return Some(no_mistake_record());
    }

    let numbers: BTreeSet<u64> = ORDINAL_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();

    if numbers.is_empty() {
        return NEGATION_WORDS
            .iter()
            .any(|k| text.contains(k))
            .then(no_mistake_record);
    }

    let mistakes = numbers
        .into_iter()
        .map(|n| json!({ "question_no": n.to_string(), "reason": "红叉标记" }))
        .collect();
    Some(mistake_record(mistakes))
}

fn no_mistake_record() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("mistakes".to_string(), Value::Array(Vec::new()));
    map.insert("summary".to_string(), Value::String("未发现错题".to_string()));
    map
}

fn mistake_record(mistakes: Vec<Value>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "summary".to_string(),
        Value::String(format!("共找到{}道错题", mistakes.len())),
    );
    map.insert("mistakes".to_string(), Value::Array(mistakes));
    map
}
