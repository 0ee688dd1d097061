//! # Exam Tutor
//!
//! 试卷错题分析与苏格拉底式辅导
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（模型调用槽位），只暴露能力
//! - `ModelGateway` - 唯一的模型通道，提供 submit() 能力（串行、限流、重试）
//! - `ChatUpstream` - 上游传输接口，`OpenAiCompatUpstream` 为默认实现
//!
//! ### ② 业务能力层（Capabilities）
//! - `extraction/` - 把模型的自然语言输出解析成结构化记录
//! - `services/` - 描述"我能做什么"
//! - `verify` - 模型判断 + 老师批改 → 最终判定
//! - `DetectionService` / `DiagnosisService` / `GuidanceEngine` / `ChatService` / `RecognitionService`
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的验证流程
//! - `QuestionCtx` - 上下文封装（第几题、题号）
//! - `QuestionFlow` - 流程编排（解题 → 验证）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 面向用户的流程
//! - `orchestrator/smart_router` - 整张试卷 vs 单道错题
//! - `orchestrator/stream` - 逐字流式输出
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod extraction;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, GatewayError};
pub use extraction::{extract, ExtractedRecord, ShapeHint};
pub use infrastructure::{ChatUpstream, ModelGateway, RetryPolicy};
pub use models::{
    ChatRequest, DialogueState, ImagePayload, ModelRequest, ModelResponse, QuestionRecord, Verdict,
};
pub use orchestrator::{ForceMode, Pipeline, SmartAnalysis, StreamEvent};
pub use services::verify;
pub use workflow::{QuestionCtx, QuestionFlow};
