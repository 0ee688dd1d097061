pub mod chat;
pub mod detection;
pub mod diagnosis;
pub mod guidance;
pub mod prompts;
pub mod recognition;
pub mod verification;

pub use chat::{wants_diagnosis, ChatService};
pub use detection::{DetectionOutcome, DetectionService, MistakeScan};
pub use diagnosis::{DiagnosisReport, DiagnosisService};
pub use guidance::{GuidanceEngine, GuidanceStage, GuidanceTurn};
pub use recognition::{ExamOcr, RecognitionService};
pub use verification::verify;
