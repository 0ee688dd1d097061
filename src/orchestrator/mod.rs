//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层把各项能力组合成面向用户的流程，只做调度和降级，不做具体判断。
//!
//! ## 模块划分
//!
//! ### `pipeline` - 分析流水线
//! - 快速检测 / 智能检测 / 诊断 / 引导 / 智能分析 / 辅导对话
//! - 各流程的流式版本
//! - 持有共享的 `ModelGateway`
//!
//! ### `smart_router` - 智能路由
//! - 整张试卷 vs 单道错题
//!
//! ### `stream` - 流式输出
//! - 逐字片段 + 结束标记（可附带结构化结果）
//!
//! ## 层次关系
//!
//! ```text
//! pipeline (面向用户的流程)
//!     ↓
//! workflow::QuestionFlow (处理单道题)
//!     ↓
//! services / extraction (能力层：检测 / 诊断 / 引导 / 验证 / 解析)
//!     ↓
//! infrastructure (基础设施：ModelGateway)
//! ```

pub mod pipeline;
pub mod smart_router;
pub mod stream;

// 重新导出主要类型
pub use pipeline::{Pipeline, SmartAnalysis, SmartDetection};
pub use smart_router::{route_content, ContentKind, ForceMode, RouteConfidence, RouteDecision};
pub use stream::{
    char_fragments, into_event_stream, into_report_stream, stream_report, stream_result, StreamEvent,
};
