/// 科目枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Subject {
    /// 语文
    Chinese,
    /// 数学
    Math,
    /// 英语
    English,
    /// 物理
    Physics,
    /// 化学
    Chemistry,
    /// 生物
    Biology,
    /// 历史
    History,
    /// 政治
    Politics,
    /// 地理
    Geography,
}

const ALL: [Subject; 9] = [
    Subject::English,
    Subject::Math,
    Subject::Chinese,
    Subject::Physics,
    Subject::Chemistry,
    Subject::Biology,
    Subject::History,
    Subject::Politics,
    Subject::Geography,
];

impl Subject {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Subject::Chinese => "语文",
            Subject::Math => "数学",
            Subject::English => "英语",
            Subject::Physics => "物理",
            Subject::Chemistry => "化学",
            Subject::Biology => "生物",
            Subject::History => "历史",
            Subject::Politics => "政治",
            Subject::Geography => "地理",
        }
    }

    fn english_name(self) -> &'static str {
        match self {
            Subject::Chinese => "chinese",
            Subject::Math => "math",
            Subject::English => "english",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::History => "history",
            Subject::Politics => "politics",
            Subject::Geography => "geography",
        }
    }

    /// 从模型的自由回答中查找科目（中英文名称均可）
    ///
    /// "英语" 包含 "语"，所以按固定顺序用完整名称匹配，英语排在语文前面。
    pub fn find(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        ALL.into_iter()
            .find(|subject| lower.contains(subject.name()) || lower.contains(subject.english_name()))
    }

    /// 试卷标签，例如 "数学试卷"
    pub fn paper_label(self) -> String {
        format!("{}试卷", self.name())
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 把模型的科目回答规整为试卷标签，无法识别时返回 "试卷"
pub fn normalize_paper_label(answer: &str) -> String {
    let answer = answer.trim();
    match Subject::find(answer) {
        Some(subject) => subject.paper_label(),
        None => "试卷".to_string(),
    }
}
