// 필터 비디오 Export 엔진
// 입력 비디오 바이트 → 프레임 샘플링 → 픽셀 필터 → VP9/H.264 재인코딩 (+ 원본 오디오)

pub mod audio;
pub mod cancel;
pub mod config;
pub mod encoding;
pub mod error;
pub mod export;
pub mod ffi;
pub mod ffmpeg;
pub mod filter;
pub mod logging;
pub mod media;
pub mod sampling;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cancel::CancellationToken;
pub use config::{ExportConfig, ExportOptions, FilterKind, OutputFormat, Resolution};
pub use error::{ErrorKind, ExportError, ExportResult};
pub use export::{
    ExportArtifact, ExportJob, ExportOrchestrator, ExportOutcome, ExportProgress, ExportStatus,
};
pub use logging::init_logging;

// FFI 함수들을 최상위에서 재export
pub use ffi::*;
