//! 提示词构建
//!
//! 所有发给模型的提示词都在这里拼接，调用方只关心参数。

use crate::models::{DialogueEntry, FlaggedMistake, OcrQuestion, QuestionContext};

const DETECTION: &str = r#"请找出这张试卷上被老师判错的题目。只有答案上有清晰红色 × 的题才算错题。

判断规则：
- 答案打了 √ 的是正确的
- 只有圈、线、点而没有 × 的不算错题
- 题号上的标记不影响判断
- × 模糊或拿不准时不要标记，宁可漏检也不要误判

按下面的 JSON 返回：
```json
{"mistakes": [{"question_no": "题号", "reason": "红叉标记"}], "summary": "共找到X道错题"}
```
没有错题时返回 {"mistakes": [], "summary": "未发现错题"}"#;

const OCR_QUESTIONS: &str = r#"请逐题识别这张试卷，对每道题给出：
1. 题号
2. 题型（选择题/填空题/判断题等）
3. 题目内容
4. 学生作答（选项或填写内容）
5. 老师批改标记：× 表示错，√ 表示对，圈/线/点为其他标记，未批改写"无"

按下面的 JSON 返回：
```json
{
  "questions": [
    {
      "question_no": "题号",
      "question_type": "题型",
      "question_content": "题目内容",
      "student_answer": "学生答案",
      "teacher_mark": "×/√/圈/线/点/无"
    }
  ]
}
```
× 和 √ 一定要区分清楚。"#;

const EXAM_OCR: &str = r#"请识别这张图片中的所有题目内容。

按下面的 JSON 返回：
```json
{
  "questions": [
    {"question_no": "题号", "question_text": "题目内容", "student_answer": "学生答案"}
  ]
}
```"#;

const QUESTION_ANALYSIS: &str = "请分析这道题目，告诉我：\n\
1. 题目内容\n\
2. 学科\n\
3. 知识点\n\
4. 正确答案（能看出来的话）\n\
5. 学生的答案（试卷上有的话）\n\n\
请用简洁的语言回答。";

const PAPER_DESCRIPTION: &str = "请简要描述这张试卷：\n\
1. 学科和年级\n\
2. 主要题目内容，错题优先\n\
3. 学生的作答情况\n\
4. 试卷整体特点";

const SUBJECT_RECOGNITION: &str = "这张试卷属于哪个学科？\n\
可选：数学、语文、英语、物理、化学、生物、历史、地理、政治。\n\
只回答学科名称，无法判断时回答\"未知\"。";

const LEARNING_ANALYSIS_TEMPLATE: &str = r#"你是一位经验丰富的教育专家，请根据学生试卷的错题情况写一份学情分析报告。

一、学习现状分析
从卷面看学生的优势：基础知识、解题能力、学习习惯，以及值得肯定的地方。

二、薄弱点与失分原因
按题型或知识点分组，每组写出题号、正确答案、学生答案，
并深入分析出错环节（概念不清/方法不对/计算失误/审题不清）。

三、学习建议
给出 3-5 条可执行的提升建议，以及每日练习计划（题型和数量）。

四、知识点梳理
列出本次涉及的核心知识点和掌握程度。

五、下次考试目标
目标分数、重点突破的知识点、提分策略。

要求：分析具体不空泛，建议可操作，语气鼓励，适合学生和家长阅读，少用符号。"#;

const MISTAKE_GUIDE_TEMPLATE: &str = r#"你是一位耐心的老师，正在帮学生弄懂一道错题。
请用苏格拉底式提问引导学生自己找到答案，不要直接给出答案或完整步骤。

引导顺序：
1. 理解题目：题目在问什么，已知条件是什么
2. 回顾知识点：相关概念或公式
3. 启发思路：第一步该怎么做
4. 递进提示：答对就肯定并推进，答错就委婉指出再给提示

每次只问一个问题，多用"你觉得……？""你注意到……吗？"这样的问法，多鼓励。"#;

/// 自动检测错题
pub fn detection() -> String {
    DETECTION.to_string()
}

/// 分析用户框选的区域
pub fn marked_regions(count: usize) -> String {
    format!(
        r#"用户在试卷上框选了 {} 个区域，请识别其中的题目，提取题号、题目内容、学生答案、正确答案（能判断时）和错误原因。

必须按下面的 JSON 返回：
{{
  "mistakes": [
    {{
      "question_no": "题号",
      "question": "题目内容",
      "student_answer": "学生答案",
      "correct_answer": "正确答案",
      "reason": "错误原因"
    }}
  ]
}}"#,
        count
    )
}

/// 逐题识别（题目、作答、批改标记）
pub fn ocr_questions() -> String {
    OCR_QUESTIONS.to_string()
}

/// 让模型独立解题并判断学生答案
pub fn solve(question: &OcrQuestion) -> String {
    format!(
        r#"请解答这道题：

题目：{}
学生答案：{}

请给出正确答案，判断学生答案是否正确，并简要说明原因。按下面的 JSON 返回：
```json
{{"correct_answer": "正确答案", "is_correct": true, "reasoning": "分析原因"}}
```
is_correct 只能是 true 或 false。"#,
        question.question_content, question.student_answer
    )
}

/// 从图片中识别单道题目
pub fn question_from_image() -> String {
    "请识别图片中的题目内容，只返回题目本身，不要解答过程。".to_string()
}

/// 错因诊断
pub fn diagnosis(question: &str, student_answer: &str) -> String {
    format!(
        r#"你是一位有二十年教学经验的老师。
学生做错了这道题：{}
学生的答案：{}

请分析：
1. 这道题考查的核心知识点
2. 学生最可能在哪个环节出错（概念不清/方法不对/计算失误）
3. 用一句具体的话告诉学生问题在哪里

只返回下面的 JSON：
```json
{{
  "knowledge_point": "核心知识点",
  "error_type": "概念不清/方法不对/计算失误",
  "problem_description": "一句话描述问题",
  "analysis": "详细分析"
}}
```"#,
        question, student_answer
    )
}

/// 引导第一轮
///
/// 正确答案不会写进提示词。
pub fn guidance_opening(question: &QuestionContext, diagnosis: &str) -> String {
    format!(
        r#"你是一位耐心的老师，正在一对一辅导学生。
学生做错了这道题：{}
{}诊断结果：{}

请围绕诊断结果，用苏格拉底式提问启发学生思考。
规则：
- 只问一个问题
- 不要说出答案
- 问题要具体，能让学生动手想

现在提出第一个问题。"#,
        question.content,
        student_answer_line(question),
        diagnosis
    )
}

/// 引导后续轮次
pub fn guidance_steering(
    question: &QuestionContext,
    diagnosis: &str,
    recent: &[DialogueEntry],
    latest: Option<&str>,
) -> String {
    let history = recent
        .iter()
        .map(|entry| format!("{}：{}", entry.speaker.label(), entry.text))
        .collect::<Vec<_>>()
        .join("\n");
    let latest = latest
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("（学生表示不会或没有回答）");

    format!(
        r#"你是一位耐心的老师，正在一对一辅导学生。

题目：{}
{}诊断结果：{}

对话记录：
{}

学生最新回答：{}

请根据学生的回答继续引导：
- 答对了：肯定他的进展，推进到下一步
- 答错或不确定：委婉指出，给一个小提示
- 说不会：把问题拆小，提示再明显一点

不要说出答案，这一轮只问一个问题。"#,
        question.content,
        student_answer_line(question),
        diagnosis,
        history,
        latest
    )
}

fn student_answer_line(question: &QuestionContext) -> String {
    match question.student_answer.as_deref().map(str::trim) {
        Some(answer) if !answer.is_empty() => format!("学生的答案：{}\n", answer),
        _ => String::new(),
    }
}

/// 描述试卷内容（学情分析的前置步骤）
pub fn paper_description() -> String {
    PAPER_DESCRIPTION.to_string()
}

/// 基于错题题号和试卷描述的简要学情分析
pub fn learning_analysis_brief(mistakes: &[FlaggedMistake], paper_content: &str) -> String {
    let numbers = mistakes
        .iter()
        .map(|m| m.question_no.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"你是经验丰富的老师。试卷内容：{}

检测到的错题：{}（共{}道）

请写一份学情分析报告：
一、学习现状分析：总结学生的三点优势
二、薄弱点与失分原因：针对错题分析失分原因
三、针对性学习建议：给出 3-5 条具体建议

要求专业、详细、有针对性，语气鼓励。"#,
        paper_content,
        numbers,
        mistakes.len()
    )
}

/// 完整模板的学情分析
pub fn learning_analysis(mistakes: &[FlaggedMistake], paper_label: &str) -> String {
    let mut prompt = format!(
        "{}\n\n试卷信息：\n- 错题数量：{}道\n- 试卷：{}\n\n错题详情：\n",
        LEARNING_ANALYSIS_TEMPLATE,
        mistakes.len(),
        if paper_label.is_empty() { "试卷" } else { paper_label }
    );

    for (idx, mistake) in mistakes.iter().enumerate() {
        prompt.push_str(&format!(
            "---\n错题{}：\n- 题号：{}\n- 题目内容：{}\n- 学生答案：{}\n- 正确答案：{}\n- 错误原因：{}\n- 详细分析：{}\n",
            idx + 1,
            mistake.question_no,
            mistake.question.as_deref().unwrap_or("题目内容未识别"),
            mistake.student_answer.as_deref().unwrap_or("未作答"),
            mistake.correct_answer.as_deref().unwrap_or("未知"),
            mistake.reason,
            mistake.analysis.as_deref().unwrap_or(""),
        ));
    }

    prompt.push_str("\n请按上面的结构写出完整的学情分析报告。");
    prompt
}

/// 单道错题的讲解
pub fn mistake_guide(mistake: &FlaggedMistake) -> String {
    format!(
        "{}\n\n题目信息：\n- 题号：{}\n- 题目内容：{}\n- 学生答案：{}\n- 正确答案：{}\n- 错误标记：{}\n\n请开始引导。",
        MISTAKE_GUIDE_TEMPLATE,
        mistake.question_no,
        mistake.question.as_deref().unwrap_or("题目内容未识别"),
        mistake.student_answer.as_deref().unwrap_or("未作答"),
        mistake.correct_answer.as_deref().unwrap_or("未知"),
        mistake.reason,
    )
}

/// 试卷 OCR（只要题目和作答）
pub fn exam_ocr() -> String {
    EXAM_OCR.to_string()
}

/// 单题分析，题目文字可以为空（只看图片）
pub fn question_analysis(question: &str) -> String {
    let question = question.trim();
    if question.is_empty() {
        return QUESTION_ANALYSIS.to_string();
    }
    format!("题目：{}\n\n{}", question, QUESTION_ANALYSIS)
}

/// 带图片的辅导对话
pub fn chat_with_image(message: &str) -> String {
    format!(
        r#"你是一位耐心的老师，正在辅导学生。学生问：{}

请用苏格拉底式引导帮助学生：
1. 不要直接给出答案或详细解题步骤
2. 提出启发性的问题，引导学生自己思考
3. 每次只问一个关键问题
4. 学生需要帮助时给出递进式提示，先浅后深

现在请提出第一个引导问题。"#,
        message
    )
}

/// 纯文字的辅导对话
pub fn chat_text(message: &str) -> String {
    format!(
        "你是一位耐心的老师。学生问：{}\n\n\
请用苏格拉底式引导帮助学生：不要直接给答案或解题步骤，每次只问一个启发性问题，给出递进式提示。\n\n\
请提出第一个引导问题。",
        message
    )
}

/// 识别试卷学科
pub fn subject_recognition() -> String {
    SUBJECT_RECOGNITION.to_string()
}
