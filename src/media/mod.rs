// 미디어 추상화 - 소스(디코더) 핸들과 파이프라인 데이터 타입
// FFmpeg 구현은 crate::ffmpeg, 테스트용 합성 소스는 crate::test_utils

pub mod audio;
pub mod frame;

pub use audio::AudioTrack;
pub use frame::{FilteredFrame, FrameRequest, FrameSize, RawFrame, BYTES_PER_PIXEL};

use crate::cancel::CancellationToken;
use crate::error::ExportResult;

/// 소스 비디오 정보
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
    /// 픽셀 가로/세로 비 (SAR, 정방형 픽셀이면 1.0)
    pub pixel_aspect: f64,
}

impl SourceInfo {
    /// 화면 표시 비율 = width × SAR / height (크기를 모르면 None)
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let pixel_aspect = if self.pixel_aspect.is_finite() && self.pixel_aspect > 0.0 {
            self.pixel_aspect
        } else {
            1.0
        };
        Some(self.width as f64 * pixel_aspect / self.height as f64)
    }
}

/// seek+decode 결과 (에러와 "스트림 끝"을 구분)
#[derive(Debug)]
pub enum DecodeOutcome {
    /// 요청 크기로 변환된 RGBA 데이터
    Frame(Vec<u8>),
    /// 이 timestamp만 실패 (손상 프레임 등), 다음 요청은 계속 가능
    Skipped(String),
    /// 소스 끝 도달, 이후 요청도 실패
    EndOfStream,
}

/// 디코딩 가능한 소스 비디오 핸들
///
/// seek마다 디코더 위치가 바뀌므로 동시 호출 불가 (`&mut self`).
/// 작업마다 자기 핸들을 소유해야 한다 (스레드 간 이동 불가 - 작업 스레드 안에서 연다).
pub trait SourceMedia {
    fn info(&self) -> SourceInfo;

    /// timestamp(초)로 seek 후 그 위치 또는 직후의 프레임을 `size` RGBA로 디코딩
    fn decode_frame_at(&mut self, timestamp: f64, size: FrameSize) -> ExportResult<DecodeOutcome>;

    /// 비디오 디코더와 독립된 오디오 디코딩 핸들 (오디오 스트림이 없으면 None)
    fn open_audio(&self) -> ExportResult<Option<Box<dyn AudioSource>>>;
}

/// 한 번에 전체 PCM을 디코딩하는 오디오 핸들 (별도 스레드로 이동해서 사용)
pub trait AudioSource: Send {
    /// 전체 오디오를 디코딩 (취소되면 `ExportError::Cancelled`)
    fn decode_all(&mut self, cancel: &CancellationToken) -> ExportResult<AudioTrack>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, pixel_aspect: f64) -> SourceInfo {
        SourceInfo {
            duration_secs: 1.0,
            width,
            height,
            has_audio: false,
            pixel_aspect,
        }
    }

    #[test]
    fn test_aspect_ratio_uses_sample_aspect() {
        // HDV 1440x1080, SAR 4:3 → 16:9 표시
        let anamorphic = info(1440, 1080, 4.0 / 3.0).aspect_ratio().unwrap();
        assert!((anamorphic - 16.0 / 9.0).abs() < 1e-9);
        assert_eq!(info(1920, 1080, 1.0).aspect_ratio(), Some(1920.0 / 1080.0));
    }

    #[test]
    fn test_aspect_ratio_ignores_invalid_sar() {
        assert_eq!(info(640, 480, 0.0).aspect_ratio(), Some(640.0 / 480.0));
        assert_eq!(info(640, 480, f64::NAN).aspect_ratio(), Some(640.0 / 480.0));
        assert_eq!(info(0, 480, 1.0).aspect_ratio(), None);
    }
}
