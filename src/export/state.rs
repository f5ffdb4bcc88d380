// Export 상태 머신
// Idle → Sampling ⇄ Encoding → Finalizing → {Complete | Failed | Cancelled}

use crate::error::{ErrorKind, ExportError};

/// 작업 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportStatus {
    Idle,
    Sampling,
    Encoding,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

impl ExportStatus {
    /// 종료 상태 여부 (이후 전이 불가)
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExportStatus::Complete | ExportStatus::Failed | ExportStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportStatus::Idle => "idle",
            ExportStatus::Sampling => "sampling",
            ExportStatus::Encoding => "encoding",
            ExportStatus::Finalizing => "finalizing",
            ExportStatus::Complete => "complete",
            ExportStatus::Failed => "failed",
            ExportStatus::Cancelled => "cancelled",
        }
    }

    /// FFI용 숫자 코드
    pub fn code(self) -> i32 {
        match self {
            ExportStatus::Idle => 0,
            ExportStatus::Sampling => 1,
            ExportStatus::Encoding => 2,
            ExportStatus::Finalizing => 3,
            ExportStatus::Complete => 4,
            ExportStatus::Failed => 5,
            ExportStatus::Cancelled => 6,
        }
    }

    /// 허용된 전이인지
    /// Sampling/Encoding은 프레임마다 번갈아 나타남
    pub fn can_transition_to(self, next: ExportStatus) -> bool {
        use ExportStatus::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Failed) | (_, Cancelled) => true,
            (Idle, Sampling) => true,
            (Sampling, Encoding) | (Encoding, Sampling) => true,
            (Sampling, Finalizing) | (Encoding, Finalizing) => true,
            (Finalizing, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 오케스트레이터가 소유하는 작업 상태 (외부에는 스냅샷으로만 노출)
#[derive(Debug, Clone, PartialEq)]
pub struct ExportState {
    status: ExportStatus,
    progress: f64,
    error: Option<ErrorKind>,
    message: Option<String>,
}

impl Default for ExportState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportState {
    pub fn new() -> Self {
        Self {
            status: ExportStatus::Idle,
            progress: 0.0,
            error: None,
            message: None,
        }
    }

    pub fn status(&self) -> ExportStatus {
        self.status
    }

    /// 0.0 ~ 100.0
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// 상태 전이 (허용되지 않으면 false, 상태 유지)
    pub fn transition(&mut self, next: ExportStatus) -> bool {
        if self.status == next {
            return true;
        }
        if !self.status.can_transition_to(next) {
            log::error!("[EXPORT] 잘못된 상태 전이: {} → {}", self.status, next);
            return false;
        }
        self.status = next;
        true
    }

    /// 진행률 갱신 (0~100 clamp, 감소 무시, 종료 후 무시)
    /// 반환: 값이 바뀌었는지
    pub fn set_progress(&mut self, progress: f64) -> bool {
        if self.status.is_terminal() || progress.is_nan() {
            return false;
        }
        let clamped = progress.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
            return true;
        }
        false
    }

    /// Finalizing → Complete, 진행률 정확히 100
    pub fn complete(&mut self) -> bool {
        if !self.transition(ExportStatus::Complete) {
            return false;
        }
        self.progress = 100.0;
        true
    }

    /// 실패 기록 (진행률은 그대로)
    pub fn fail(&mut self, error: &ExportError) {
        if self.transition(ExportStatus::Failed) {
            self.error = Some(error.kind());
            self.message = Some(error.to_string());
        }
    }

    pub fn cancel(&mut self) {
        if self.transition(ExportStatus::Cancelled) {
            self.error = Some(ErrorKind::CancelledByCaller);
            self.message = Some(ExportError::Cancelled.to_string());
        }
    }
}
