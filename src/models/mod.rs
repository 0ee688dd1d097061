pub mod chat;
pub mod dialogue;
pub mod question;
pub mod request;
pub mod subject;
pub mod verdict;

pub use chat::{ChatMessage, ChatMode, ChatReply, ChatRequest};
pub use dialogue::{DialogueEntry, DialogueState, QuestionContext, Speaker};
pub use question::{
    Diagnosis, FlaggedMistake, ModelJudgment, OcrQuestion, QuestionRecord, SolveResult,
    TeacherMark,
};
pub use request::{ChatTurn, ContentPart, ImagePayload, ModelRequest, ModelResponse, Role, TokenUsage};
pub use subject::Subject;
pub use verdict::{FinalStatus, Verdict};
