//! 智能路由 - 编排层
//!
//! 判断一张图片应该走"整张试卷学情分析"还是"单道错题讲解"。

use std::str::FromStr;

use serde::Serialize;

/// 用户强制指定的分析类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    Full,
    Mistakes,
}

impl FromStr for ForceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" | "整体" => Ok(ForceMode::Full),
            "mistakes" | "错题" => Ok(ForceMode::Mistakes),
            other => Err(format!("未知的分析类型: {}", other)),
        }
    }
}

/// 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    FullPaper,
    SingleMistake,
}

impl ContentKind {
    /// 推荐的处理方式
    pub fn recommended_action(self) -> &'static str {
        match self {
            ContentKind::FullPaper => "学情分析",
            ContentKind::SingleMistake => "错题讲解",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteConfidence {
    High,
    Medium,
}

/// 路由结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub kind: ContentKind,
    pub reason: String,
    pub confidence: RouteConfidence,
}

/// 判断内容类型
///
/// 强制类型优先；否则框选数量或错题数量达到阈值时视为整张试卷。
pub fn route_content(
    user_marks: usize,
    mistake_count: usize,
    force: Option<ForceMode>,
    threshold: usize,
) -> RouteDecision {
    match force {
        Some(ForceMode::Full) => {
            return RouteDecision {
                kind: ContentKind::FullPaper,
                reason: "用户选择整体分析".to_string(),
                confidence: RouteConfidence::High,
            }
        }
        Some(ForceMode::Mistakes) => {
            return RouteDecision {
                kind: ContentKind::SingleMistake,
                reason: "用户选择错题分析".to_string(),
                confidence: RouteConfidence::High,
            }
        }
        None => {}
    }

    let (kind, reason) = if user_marks >= threshold {
        (
            ContentKind::FullPaper,
            format!("用户标记了{}个区域，判断为整张试卷分析", user_marks),
        )
    } else if mistake_count >= threshold {
        (
            ContentKind::FullPaper,
            format!("检测到{}道错题，判断为整张试卷分析", mistake_count),
        )
    } else if user_marks > 0 {
        (
            ContentKind::SingleMistake,
            format!("用户标记了{}个区域，判断为单个错题讲解", user_marks),
        )
    } else {
        (
            ContentKind::SingleMistake,
            format!("检测到{}道错题，判断为单个错题讲解", mistake_count),
        )
    };

    let confidence = if user_marks >= threshold || mistake_count >= threshold {
        RouteConfidence::High
    } else {
        RouteConfidence::Medium
    };

    RouteDecision {
        kind,
        reason,
        confidence,
    }
}
