// Export 모듈
// 상태 머신 + 오케스트레이터(동기 실행) + 백그라운드 작업 핸들

pub mod job;
pub mod orchestrator;
pub mod state;

pub use job::{ExportJob, SourceFactory};
pub use orchestrator::{
    ExportArtifact, ExportOrchestrator, ExportOutcome, ExportProgress, ProgressCallback,
};
pub use state::{ExportState, ExportStatus};
