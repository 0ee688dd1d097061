//! 导师回复的文本处理

use regex::{Captures, Regex};

/// 句末标点
const SENTENCE_ENDS: [char; 8] = ['。', '！', '？', '!', '?', '；', ';', '\n'];

/// 问号
const QUESTION_MARKS: [char; 2] = ['？', '?'];

/// 按字符数截断，尽量停在句末标点之后
///
/// 截断范围内找不到句末标点时，直接在上限处截断。
pub fn truncate_at_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    match head.rfind(|c: char| SENTENCE_ENDS.contains(&c)) {
        Some(pos) => {
            let end = pos + head[pos..].chars().next().map_or(0, char::len_utf8);
            head[..end].trim_end().to_string()
        }
        None => head,
    }
}

/// 按字符数硬截断，不加省略号
pub fn take_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// 只保留第一个问题
///
/// 在第一个问号处截断，问号之后的内容全部丢弃。
pub fn retain_first_question(text: &str) -> String {
    match text.find(|c: char| QUESTION_MARKS.contains(&c)) {
        Some(pos) => {
            let end = pos + text[pos..].chars().next().map_or(0, char::len_utf8);
            text[..end].trim_end().to_string()
        }
        None => text.trim_end().to_string(),
    }
}

/// 问题个数（按问号计）
pub fn count_questions(text: &str) -> usize {
    text.chars().filter(|c| QUESTION_MARKS.contains(c)).count()
}

/// 把原文中出现的 `secret` 替换成占位符
///
/// 单个字符的答案（如选项字母、一位数字）只在前后都不是字母数字时替换，
/// 避免误伤 "Because"、"12" 这类普通文字。
pub fn redact(text: &str, secret: &str, placeholder: &str) -> String {
    let secret = secret.trim();
    match secret.chars().count() {
        0 => text.to_string(),
        1 => redact_standalone(text, secret, placeholder),
        _ => text.replace(secret, placeholder),
    }
}

fn redact_standalone(text: &str, secret: &str, placeholder: &str) -> String {
    let pattern = format!(r"(^|[^0-9A-Za-z]){}([^0-9A-Za-z]|$)", regex::escape(secret));
    let Ok(re) = Regex::new(&pattern) else {
        return text.replace(secret, placeholder);
    };

    // 相邻的两处出现共用一个边界字符，第二遍补上第一遍漏掉的
    let mut out = text.to_string();
    for _ in 0..2 {
        out = re
            .replace_all(&out, |caps: &Captures| {
                format!("{}{}{}", &caps[1], placeholder, &caps[2])
            })
            .into_owned();
    }
    out
}
