// FFmpeg 래퍼 모듈
// 소스 비디오 디코딩(seek+decode), 오디오 PCM 디코딩

pub mod audio_decoder;
pub mod decoder;
pub mod source;

pub use audio_decoder::AudioDecoder;
pub use decoder::Decoder;
pub use source::{FfmpegAudioSource, FfmpegSource};

use crate::error::{ExportError, ExportResult};
use ffmpeg_next as ffmpeg;
use std::sync::Once;

static LOG_LEVEL: Once = Once::new();

/// FFmpeg 초기화 (여러 번 호출해도 안전)
/// FFmpeg 자체 로그는 Error 이상만 출력
pub fn init() -> ExportResult<()> {
    ffmpeg::init().map_err(|e| ExportError::source_decode(format!("FFmpeg init failed: {}", e)))?;
    LOG_LEVEL.call_once(|| {
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    });
    Ok(())
}

/// 스트림 time_base 기준 PTS → 초
#[inline]
pub(crate) fn pts_to_secs(pts: i64, time_base: ffmpeg::Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}
