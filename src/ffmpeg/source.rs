// 메모리 바이트 → FFmpeg 소스 핸들
// FFmpeg은 파일 경로 기반이므로 입력을 임시 파일로 기록 후 연다

use super::{AudioDecoder, Decoder};
use crate::cancel::CancellationToken;
use crate::error::{ExportError, ExportResult};
use crate::media::{AudioSource, AudioTrack, DecodeOutcome, FrameSize, SourceInfo, SourceMedia};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// FFmpeg 기반 소스 비디오 (작업당 하나, 작업 스레드 안에서 생성)
pub struct FfmpegSource {
    /// 오디오 핸들과 공유 — 마지막 참조가 사라질 때 임시 파일 삭제
    file: Arc<NamedTempFile>,
    decoder: Decoder,
    info: SourceInfo,
}

impl FfmpegSource {
    /// 컨테이너 바이트로 소스 열기
    pub fn open(bytes: &[u8]) -> ExportResult<Self> {
        if bytes.is_empty() {
            return Err(ExportError::source_decode("Input is empty"));
        }

        let mut file = tempfile::Builder::new()
            .prefix("export-src-")
            .tempfile()
            .map_err(|e| ExportError::source_decode(format!("Failed to create temp file: {}", e)))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ExportError::source_decode(format!("Failed to write temp file: {}", e)))?;

        let decoder = Decoder::open(file.path())?;
        let info = SourceInfo {
            duration_secs: decoder.duration_secs(),
            width: decoder.width(),
            height: decoder.height(),
            has_audio: decoder.has_audio(),
            pixel_aspect: decoder.pixel_aspect(),
        };

        if !(info.duration_secs > 0.0) {
            log::warn!("[SOURCE] duration 메타데이터 없음 ({} bytes)", bytes.len());
        }

        Ok(Self {
            file: Arc::new(file),
            decoder,
            info,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl SourceMedia for FfmpegSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn decode_frame_at(&mut self, timestamp: f64, size: FrameSize) -> ExportResult<DecodeOutcome> {
        self.decoder.decode_frame_at(timestamp, size)
    }

    fn open_audio(&self) -> ExportResult<Option<Box<dyn AudioSource>>> {
        if !self.info.has_audio {
            return Ok(None);
        }
        Ok(Some(Box::new(FfmpegAudioSource {
            file: Arc::clone(&self.file),
        })))
    }
}

/// 오디오 추출 핸들 — 디코더 컨텍스트는 decode_all 호출 스레드에서 연다
pub struct FfmpegAudioSource {
    file: Arc<NamedTempFile>,
}

impl AudioSource for FfmpegAudioSource {
    fn decode_all(&mut self, cancel: &CancellationToken) -> ExportResult<AudioTrack> {
        let mut decoder = AudioDecoder::open(self.file.path())?;
        decoder.decode_all(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_empty_input_rejected() {
        let err = FfmpegSource::open(&[]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::SourceDecode);
    }

    #[test]
    #[ignore] // FFmpeg 런타임 필요
    fn test_garbage_input_is_source_decode_error() {
        let err = FfmpegSource::open(b"definitely not a video container")
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::SourceDecode);
    }
}
