// Export 에러 타입
// 모든 실패는 ErrorKind 하나 + 사람이 읽을 수 있는 메시지로 호출자에게 전달

use std::fmt;

/// 에러 종류 (호출자가 분기할 때 사용하는 안정적인 분류)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 입력이 디코딩 불가능한 비디오이거나 디코더 초기화 실패
    SourceDecode,
    /// 특정 timestamp 디코딩 실패 (첫 프레임이 아니면 복구 가능)
    Seek,
    /// 오디오 트랙 없음/디코딩 불가 (치명적이지 않음)
    AudioUnavailable,
    /// 필터 적용 실패 (버퍼 계약 위반)
    Filter,
    EncoderInit,
    EncoderWrite,
    /// 호출자가 취소함 (실패가 아닌 별도 종료 상태)
    CancelledByCaller,
    /// 출력 프레임 0개
    EmptyOutput,
    /// Export 설정 검증 실패
    InvalidConfig,
    /// 단계가 데드라인 안에 끝나지 않음
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SourceDecode => "SourceDecodeError",
            ErrorKind::Seek => "SeekError",
            ErrorKind::AudioUnavailable => "AudioUnavailable",
            ErrorKind::Filter => "FilterError",
            ErrorKind::EncoderInit => "EncoderInitError",
            ErrorKind::EncoderWrite => "EncoderWriteError",
            ErrorKind::CancelledByCaller => "CancelledByCaller",
            ErrorKind::EmptyOutput => "EmptyOutput",
            ErrorKind::InvalidConfig => "InvalidConfig",
            ErrorKind::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export 파이프라인 에러
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Source decode error: {message}")]
    SourceDecode { message: String },

    #[error("Seek error at frame {index} ({timestamp:.3}s): {message}")]
    Seek {
        index: u64,
        timestamp: f64,
        message: String,
    },

    #[error("Audio unavailable: {message}")]
    AudioUnavailable { message: String },

    #[error("Filter error: {message}")]
    Filter { message: String },

    #[error("Encoder init error: {message}")]
    EncoderInit { message: String },

    #[error("Encoder write error: {message}")]
    EncoderWrite { message: String },

    #[error("Export cancelled by caller")]
    Cancelled,

    #[error("Export produced no frames: {message}")]
    EmptyOutput { message: String },

    #[error("Invalid export config: {message}")]
    InvalidConfig { message: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },
}

/// Result 별칭
pub type ExportResult<T> = Result<T, ExportError>;

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::SourceDecode { .. } => ErrorKind::SourceDecode,
            ExportError::Seek { .. } => ErrorKind::Seek,
            ExportError::AudioUnavailable { .. } => ErrorKind::AudioUnavailable,
            ExportError::Filter { .. } => ErrorKind::Filter,
            ExportError::EncoderInit { .. } => ErrorKind::EncoderInit,
            ExportError::EncoderWrite { .. } => ErrorKind::EncoderWrite,
            ExportError::Cancelled => ErrorKind::CancelledByCaller,
            ExportError::EmptyOutput { .. } => ErrorKind::EmptyOutput,
            ExportError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            ExportError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn source_decode(msg: impl Into<String>) -> Self {
        Self::SourceDecode { message: msg.into() }
    }

    pub fn seek(index: u64, timestamp: f64, msg: impl Into<String>) -> Self {
        Self::Seek {
            index,
            timestamp,
            message: msg.into(),
        }
    }

    pub fn audio_unavailable(msg: impl Into<String>) -> Self {
        Self::AudioUnavailable { message: msg.into() }
    }

    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter { message: msg.into() }
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInit { message: msg.into() }
    }

    pub fn encoder_write(msg: impl Into<String>) -> Self {
        Self::EncoderWrite { message: msg.into() }
    }

    pub fn empty_output(msg: impl Into<String>) -> Self {
        Self::EmptyOutput { message: msg.into() }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig { message: msg.into() }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout { message: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = ExportError::seek(3, 0.1, "corrupt packet");
        assert_eq!(err.kind(), ErrorKind::Seek);
        assert_eq!(ExportError::audio_unavailable("none").kind(), ErrorKind::AudioUnavailable);
        assert_eq!(ExportError::encoder_init("no vp9").kind(), ErrorKind::EncoderInit);
        assert_eq!(ExportError::Cancelled.kind(), ErrorKind::CancelledByCaller);
    }

    #[test]
    fn test_display_includes_message() {
        let err = ExportError::seek(7, 0.25, "bad frame");
        let text = err.to_string();
        assert!(text.contains("frame 7"));
        assert!(text.contains("bad frame"));
        assert_eq!(ErrorKind::EmptyOutput.to_string(), "EmptyOutput");
    }
}
