//! 分析流水线 - 编排层
//!
//! ## 职责
//!
//! 把能力层组合成面向用户的流程：
//!
//! 1. **快速检测**：看图找错题，可选学情分析
//! 2. **智能检测**：逐题识别 → 模型解题 → 与老师批改交叉验证
//! 3. **错因诊断**
//! 4. **苏格拉底式引导**（每轮调用一次，状态由调用方持有）
//! 5. **智能分析**：检测 → 识别学科 → 路由 → 学情分析或错题讲解
//! 6. **辅导对话**：带图求助时先诊断再引导，否则直接引导式回答
//! 7. **试卷 OCR** 和 **单题分析**
//!
//! 所有模型调用都经过同一个 `ModelGateway`。流式版本先给进度提示，
//! 再逐字输出文字，最后附上结构化结果。

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, BusinessError, GatewayError};
use crate::extraction::{extract, ShapeHint};
use crate::infrastructure::{ModelGateway, OpenAiCompatUpstream};
use crate::models::subject::normalize_paper_label;
use crate::models::{
    ChatMode, ChatReply, ChatRequest, DialogueState, FinalStatus, FlaggedMistake, ImagePayload,
    ModelRequest, OcrQuestion, QuestionContext,
};
use crate::orchestrator::smart_router::{route_content, ContentKind, ForceMode, RouteDecision};
use crate::orchestrator::stream::{stream_report, stream_result, StreamEvent};
use crate::services::{
    prompts, wants_diagnosis, ChatService, DetectionOutcome, DetectionService, DiagnosisReport,
    DiagnosisService, ExamOcr, GuidanceEngine, GuidanceTurn, RecognitionService,
};
use crate::utils::truncate_text;
use crate::workflow::{AnalyzedQuestion, QuestionCtx, QuestionFlow};

/// 智能检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmartDetection {
    /// 两方一致确认的错题
    pub mistakes: Vec<AnalyzedQuestion>,
    /// 疑似错题和需要确认的题
    pub need_confirmation: Vec<AnalyzedQuestion>,
    pub all_questions: Vec<AnalyzedQuestion>,
    pub summary: String,
    /// OCR 无法解析时附上原始回复
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

/// 智能分析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum SmartAnalysis {
    /// 整张试卷的学情分析
    LearningAnalysis {
        analysis: String,
        mistakes: Vec<FlaggedMistake>,
        subject: String,
        route: RouteDecision,
    },
    /// 第一道错题的讲解
    MistakeGuide {
        guide: String,
        mistake: FlaggedMistake,
        total_mistakes: Vec<FlaggedMistake>,
        subject: String,
        route: RouteDecision,
    },
    /// 单题讲解但没有检测到错题
    NoMistakes { reason: String, route: RouteDecision },
    /// 检测回复无法解析，交给人工查看原始回复
    Unparsed { reason: String, raw_text: String },
}

impl SmartAnalysis {
    /// 面向用户的正文
    pub fn text(&self) -> &str {
        match self {
            SmartAnalysis::LearningAnalysis { analysis, .. } => analysis,
            SmartAnalysis::MistakeGuide { guide, .. } => guide,
            SmartAnalysis::NoMistakes { reason, .. } => reason,
            SmartAnalysis::Unparsed { raw_text, .. } => raw_text,
        }
    }
}

/// 分析流水线
pub struct Pipeline {
    gateway: Arc<ModelGateway>,
    detection: DetectionService,
    diagnosis: DiagnosisService,
    guidance: GuidanceEngine,
    chat: ChatService,
    recognition: RecognitionService,
    question_flow: QuestionFlow,
    vision_model: String,
    text_model: String,
    full_paper_threshold: usize,
}

impl Pipeline {
    /// 使用已有的访问控制器创建流水线
    pub fn new(gateway: Arc<ModelGateway>, config: &Config) -> Self {
        Self {
            detection: DetectionService::new(gateway.clone(), config),
            diagnosis: DiagnosisService::new(gateway.clone(), config),
            guidance: GuidanceEngine::new(gateway.clone(), config),
            chat: ChatService::new(gateway.clone(), config),
            recognition: RecognitionService::new(gateway.clone(), config),
            question_flow: QuestionFlow::new(gateway.clone(), config),
            gateway,
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
            full_paper_threshold: config.full_paper_threshold,
        }
    }

    /// 连接真实的模型服务
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let upstream = OpenAiCompatUpstream::new(config)?;
        let gateway = Arc::new(ModelGateway::new(Arc::new(upstream), config.retry_policy()));
        Ok(Self::new(gateway, config))
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// 快速检测错题
    pub async fn detect(
        &self,
        image: &ImagePayload,
        user_marks: usize,
        with_analysis: bool,
    ) -> AppResult<DetectionOutcome> {
        Ok(self.detection.detect(image, user_marks, with_analysis).await?)
    }

    /// 智能检测：OCR + 模型解题 + 老师批改交叉验证
    pub async fn smart_detect(&self, image: &ImagePayload) -> AppResult<SmartDetection> {
        info!("[智能检测] 步骤1: 识别题目和批改标记...");
        let request = ModelRequest::user_vision(&self.vision_model, prompts::ocr_questions(), image)
            .max_tokens(2000);
        let raw_text = self.gateway.submit(request).await?.content;

        let questions = extract(&raw_text, ShapeHint::Keyed("questions"))
            .and_then(|r| r.field::<Vec<OcrQuestion>>("questions"));

        let Some(questions) = questions else {
            warn!("[智能检测] ❌ OCR结果无法解析");
            return Ok(SmartDetection {
                mistakes: Vec::new(),
                need_confirmation: Vec::new(),
                all_questions: Vec::new(),
                summary: "OCR识别失败".to_string(),
                raw_text: Some(raw_text),
            });
        };

        info!("[智能检测] 识别到 {} 道题目，开始逐题验证", questions.len());

        let total = questions.len();
        let mut all_questions = Vec::with_capacity(total);
        for (index, question) in questions.iter().enumerate() {
            let ctx = QuestionCtx::new(index + 1, total, question.question_no.clone());
            all_questions.push(self.question_flow.run(question, &ctx).await);
        }

        let mistakes: Vec<_> = all_questions
            .iter()
            .filter(|q| q.verdict.final_status == FinalStatus::ConfirmedMistake)
            .cloned()
            .collect();
        let need_confirmation: Vec<_> = all_questions
            .iter()
            .filter(|q| q.verdict.final_status.needs_human())
            .cloned()
            .collect();

        let summary = format!(
            "识别到{}道错题,{}道需要确认",
            mistakes.len(),
            need_confirmation.len()
        );
        info!("[智能检测] {}", summary);

        Ok(SmartDetection {
            mistakes,
            need_confirmation,
            all_questions,
            summary,
            raw_text: None,
        })
    }

    /// 错因诊断
    pub async fn diagnose(
        &self,
        question: &str,
        student_answer: &str,
        image: Option<&ImagePayload>,
    ) -> AppResult<DiagnosisReport> {
        self.diagnosis.diagnose(question, student_answer, image).await
    }

    /// 引导的下一轮
    pub async fn guide(
        &self,
        state: &DialogueState,
        latest: Option<&str>,
    ) -> AppResult<GuidanceTurn> {
        self.guidance.next_turn(state, latest).await
    }

    /// 流式输出引导的下一轮
    pub fn guide_stream<'a>(
        &'a self,
        state: &'a DialogueState,
        latest: Option<&'a str>,
    ) -> impl Stream<Item = StreamEvent> + 'a {
        stream_result("thinking", "老师正在思考...", async move {
            self.guide(state, latest)
                .await
                .map(|turn| turn.text)
                .map_err(|e| e.user_message())
        })
    }

    /// 智能分析：自动判断整张试卷还是单道错题
    pub async fn smart_analyze(
        &self,
        image: &ImagePayload,
        user_marks: usize,
        force: Option<ForceMode>,
    ) -> AppResult<SmartAnalysis> {
        info!("[智能分析] 步骤1: 检测错题...");
        let scan = self.detection.scan(image, user_marks).await?;
        let Some(mistakes) = scan.mistakes else {
            return Ok(SmartAnalysis::Unparsed {
                reason: "无法解析错题检测结果，请查看模型原始回复".to_string(),
                raw_text: scan.raw_text,
            });
        };
        info!("[智能分析] 检测到 {} 道错题", mistakes.len());

        info!("[智能分析] 步骤2: 识别试卷学科...");
        let subject = self.recognize_subject(image).await;
        info!("[智能分析] 识别学科: {}", subject);

        let route = route_content(user_marks, mistakes.len(), force, self.full_paper_threshold);
        info!("[智能分析] 步骤3: {} ({})", route.kind.recommended_action(), route.reason);

        match route.kind {
            ContentKind::FullPaper => {
                let request = ModelRequest::user_text(
                    &self.text_model,
                    prompts::learning_analysis(&mistakes, &subject),
                )
                .max_tokens(3000);
                let analysis = self.gateway.submit(request).await?.content;
                Ok(SmartAnalysis::LearningAnalysis {
                    analysis,
                    mistakes,
                    subject,
                    route,
                })
            }
            ContentKind::SingleMistake => {
                let Some(first) = mistakes.first().cloned() else {
                    return Ok(SmartAnalysis::NoMistakes {
                        reason: "未检测到错题，请确保试卷中有明显的错题标记".to_string(),
                        route,
                    });
                };
                let request =
                    ModelRequest::user_text(&self.text_model, prompts::mistake_guide(&first))
                        .max_tokens(2000);
                let guide = self.gateway.submit(request).await?.content;
                Ok(SmartAnalysis::MistakeGuide {
                    guide,
                    mistake: first,
                    total_mistakes: mistakes,
                    subject,
                    route,
                })
            }
        }
    }

    /// 流式智能分析，结束事件携带完整结果
    pub fn smart_analyze_stream<'a>(
        &'a self,
        image: &'a ImagePayload,
        user_marks: usize,
        force: Option<ForceMode>,
    ) -> impl Stream<Item = StreamEvent> + 'a {
        stream_report("detecting", "📋 正在检测试卷中的错题...", async move {
            let analysis = self
                .smart_analyze(image, user_marks, force)
                .await
                .map_err(|e| e.user_message())?;
            report(analysis.text().to_string(), &analysis)
        })
    }

    /// 流式快速检测，逐字输出学情分析（没有时输出摘要）
    pub fn detect_stream<'a>(
        &'a self,
        image: &'a ImagePayload,
        user_marks: usize,
        with_analysis: bool,
    ) -> impl Stream<Item = StreamEvent> + 'a {
        stream_report("analyzing", "AI正在分析中...", async move {
            let outcome = self
                .detect(image, user_marks, with_analysis)
                .await
                .map_err(|e| e.user_message())?;
            let text = outcome
                .detailed_analysis
                .clone()
                .unwrap_or_else(|| outcome.summary.clone());
            report(text, &outcome)
        })
    }

    /// 流式诊断，逐字输出模型原始回复
    pub fn diagnose_stream<'a>(
        &'a self,
        question: &'a str,
        student_answer: &'a str,
        image: Option<&'a ImagePayload>,
    ) -> impl Stream<Item = StreamEvent> + 'a {
        stream_report("analyzing", "🔍 正在分析错误原因...", async move {
            let diagnosis = self
                .diagnose(question, student_answer, image)
                .await
                .map_err(|e| e.user_message())?;
            report(diagnosis.raw_text.clone(), &diagnosis)
        })
    }

    /// 辅导对话
    ///
    /// 带图片且消息像是错题求助时，先识别题目、诊断，再给出第一个引导问题；
    /// 这一路任何一步失败（余额不足除外）都退回普通回答。
    pub async fn chat(&self, request: &ChatRequest) -> AppResult<ChatReply> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(BusinessError::EmptyMessage.into());
        }

        if let Some(image) = request.image.as_ref().filter(|_| wants_diagnosis(message)) {
            info!("[对话] 检测到错题求助，启动诊断流程");
            match self.diagnose_and_open(message, image).await {
                Ok(Some(reply)) => return Ok(reply),
                Ok(None) => warn!("[对话] 诊断结果无法解析，改为普通回答"),
                Err(e @ AppError::Gateway(GatewayError::QuotaExhausted { .. })) => return Err(e),
                Err(e) => warn!("[对话] 诊断失败，改为普通回答: {}", e),
            }
        }

        Ok(self.chat.reply(request).await?)
    }

    /// 流式辅导对话
    pub fn chat_stream<'a>(&'a self, request: &'a ChatRequest) -> impl Stream<Item = StreamEvent> + 'a {
        let starting = stream::iter([StreamEvent::status("starting", "开始分析...")]);
        if request.message.trim().is_empty() {
            let error = StreamEvent::Error(BusinessError::EmptyMessage.to_string());
            return starting.chain(stream::iter([error])).left_stream();
        }

        starting
            .chain(stream_result("analyzing", "AI正在分析中...", async move {
                self.chat(request)
                    .await
                    .map(|reply| reply.text)
                    .map_err(|e| e.user_message())
            }))
            .right_stream()
    }

    /// 试卷 OCR
    pub async fn ocr_exam(&self, image: &ImagePayload) -> AppResult<ExamOcr> {
        self.recognition.ocr_exam(image).await
    }

    /// 单题分析
    pub async fn analyze_question(
        &self,
        question: &str,
        image: Option<&ImagePayload>,
    ) -> AppResult<String> {
        self.recognition.analyze_question(question, image).await
    }

    /// 识别题目 → 诊断 → 第一个引导问题；诊断无法解析时返回 None
    async fn diagnose_and_open(
        &self,
        message: &str,
        image: &ImagePayload,
    ) -> AppResult<Option<ChatReply>> {
        let report = self.diagnosis.diagnose("", message, Some(image)).await?;
        if report.degraded {
            return Ok(None);
        }
        info!("[对话] 题目识别成功: {}", truncate_text(&report.question, 50));

        let state = DialogueState::new(
            QuestionContext::new(report.question.clone()),
            report.diagnosis.problem_description.clone(),
        );
        let turn = self.guidance.next_turn(&state, None).await?;

        Ok(Some(ChatReply {
            text: guidance_intro(&report, &turn.text),
            mode: ChatMode::Guidance,
            diagnosis: Some(report.diagnosis),
            question: Some(report.question),
        }))
    }

    /// 识别试卷学科，失败时返回 "试卷"
    async fn recognize_subject(&self, image: &ImagePayload) -> String {
        let request =
            ModelRequest::user_vision(&self.vision_model, prompts::subject_recognition(), image)
                .max_tokens(50)
                .skip_delay(true);
        match self.gateway.submit(request).await {
            Ok(response) => normalize_paper_label(&response.content),
            Err(e) => {
                warn!("[智能分析] 学科识别失败，使用默认值: {}", e);
                "试卷".to_string()
            }
        }
    }
}

/// 诊断 + 引导的开场回复
fn guidance_intro(report: &DiagnosisReport, opening: &str) -> String {
    format!(
        "📋 **题目分析**\n{}\n\n---\n\n📋 **诊断结果**\n**知识点**: {}\n**问题**: {}\n\n---\n\n👨‍🏫 **开始引导**\n{}\n\n---\n💡 请回答老师的问题，我会一步步引导你找到正确答案。",
        report.question,
        report.diagnosis.knowledge_point,
        report.diagnosis.problem_description,
        opening,
    )
}

/// 流式结果：正文 + 序列化后的完整结果
fn report<T: Serialize>(text: String, value: &T) -> Result<(String, JsonValue), String> {
    serde_json::to_value(value)
        .map(|data| (text, data))
        .map_err(|e| e.to_string())
}
