// Export 설정 - 필터/해상도/fps/컨테이너 포맷
// 작업 생성 시 한 번 검증, 이후 변경 없음

use crate::error::{ExportError, ExportResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 원본 비율을 알 수 없을 때 사용하는 기본 비율
pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;

/// 허용 fps 상한
pub const MAX_FPS: u32 = 240;

/// 픽셀 필터 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterKind {
    #[default]
    None,
    Sepia,
    Grayscale,
    Invert,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [
        FilterKind::None,
        FilterKind::Sepia,
        FilterKind::Grayscale,
        FilterKind::Invert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::None => "none",
            FilterKind::Sepia => "sepia",
            FilterKind::Grayscale => "grayscale",
            FilterKind::Invert => "invert",
        }
    }
}

/// 출력 해상도 (세로 픽셀 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    P1080,
    #[default]
    P720,
    P540,
}

impl Resolution {
    pub fn height(self) -> u32 {
        match self {
            Resolution::P1080 => 1080,
            Resolution::P720 => 720,
            Resolution::P540 => 540,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::P1080 => "1080p",
            Resolution::P720 => "720p",
            Resolution::P540 => "540p",
        }
    }

    /// 원본 비율에 맞춘 출력 크기
    /// width = round(height × aspect), YUV420 크로마 서브샘플링 때문에 가장 가까운 짝수로 맞춤
    pub fn output_size(self, aspect_ratio: Option<f64>) -> (u32, u32) {
        let aspect = aspect_ratio
            .filter(|a| a.is_finite() && *a > 0.0)
            .unwrap_or(DEFAULT_ASPECT_RATIO);
        let height = self.height();
        let width = ((height as f64 * aspect) / 2.0).round() as u32 * 2;
        (width.max(2), height)
    }
}

/// 출력 컨테이너 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Webm,
    Mp4,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Webm => "webm",
            OutputFormat::Mp4 => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webm => "video/webm",
            OutputFormat::Mp4 => "video/mp4",
        }
    }

    /// FFmpeg muxer 이름
    pub fn muxer_name(self) -> &'static str {
        match self {
            OutputFormat::Webm => "webm",
            OutputFormat::Mp4 => "mp4",
        }
    }
}

macro_rules! impl_name_traits {
    ($ty:ty, $what:literal, [$($name:literal => $variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ExportError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(ExportError::invalid_config(format!(
                        "unknown {}: '{}'",
                        $what, other
                    ))),
                }
            }
        }
    };
}

impl_name_traits!(FilterKind, "filter", [
    "none" => FilterKind::None,
    "sepia" => FilterKind::Sepia,
    "grayscale" => FilterKind::Grayscale,
    "invert" => FilterKind::Invert,
]);

impl_name_traits!(Resolution, "resolution", [
    "1080p" => Resolution::P1080,
    "720p" => Resolution::P720,
    "540p" => Resolution::P540,
]);

impl_name_traits!(OutputFormat, "format", [
    "webm" => OutputFormat::Webm,
    "mp4" => OutputFormat::Mp4,
]);

/// Export 설정 (불변 값)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConfig {
    pub filter: FilterKind,
    pub resolution: Resolution,
    pub fps: u32,
    pub format: OutputFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filter: FilterKind::None,
            resolution: Resolution::P720,
            fps: 30,
            format: OutputFormat::Webm,
        }
    }
}

impl ExportConfig {
    /// 문자열 옵션에서 설정 생성 (None이면 기본값)
    pub fn from_options(
        filter: Option<&str>,
        resolution: Option<&str>,
        fps: Option<u32>,
        format: Option<&str>,
    ) -> ExportResult<Self> {
        let defaults = Self::default();
        let config = Self {
            filter: filter.map(str::parse).transpose()?.unwrap_or(defaults.filter),
            resolution: resolution
                .map(str::parse)
                .transpose()?
                .unwrap_or(defaults.resolution),
            fps: fps.unwrap_or(defaults.fps),
            format: format.map(str::parse).transpose()?.unwrap_or(defaults.format),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExportResult<()> {
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ExportError::invalid_config(format!(
                "fps must be in 1..={}, got {}",
                MAX_FPS, self.fps
            )));
        }
        Ok(())
    }

    /// 추천 파일명: {filter}-{resolution}-{fps}fps-video.{format}
    pub fn suggested_filename(&self) -> String {
        format!(
            "{}-{}-{}fps-video.{}",
            self.filter, self.resolution, self.fps, self.format
        )
    }
}

/// 파이프라인 튜닝 옵션 (결과물에는 영향 없음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// 필터 워커 응답 대기 데드라인 (프레임당)
    pub frame_timeout: Duration,
    /// N 프레임마다 진행 로그
    pub log_every_frames: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(30),
            log_every_frames: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_size_for_16_9() {
        let aspect = Some(16.0 / 9.0);
        assert_eq!(Resolution::P1080.output_size(aspect), (1920, 1080));
        assert_eq!(Resolution::P720.output_size(aspect), (1280, 720));
        assert_eq!(Resolution::P540.output_size(aspect), (960, 540));
    }

    #[test]
    fn test_output_size_unknown_aspect_defaults_to_16_9() {
        assert_eq!(Resolution::P720.output_size(None), (1280, 720));
        assert_eq!(Resolution::P720.output_size(Some(f64::NAN)), (1280, 720));
        assert_eq!(Resolution::P540.output_size(Some(0.0)), (960, 540));
    }

    #[test]
    fn test_output_size_even_width_for_odd_aspects() {
        // 4:3 → 720 * 1.333 = 960
        assert_eq!(Resolution::P720.output_size(Some(4.0 / 3.0)), (960, 720));
        // 세로 영상 9:16 → 540 * 0.5625 = 303.75 → 304
        let (w, h) = Resolution::P540.output_size(Some(9.0 / 16.0));
        assert_eq!((w, h), (304, 540));
        assert_eq!(w % 2, 0);
        // 540 * 1.35 = 729 → 홀수 폭은 가장 가까운 짝수(730)로
        assert_eq!(Resolution::P540.output_size(Some(1.35)), (730, 540));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Sepia".parse::<FilterKind>().unwrap(), FilterKind::Sepia);
        assert_eq!("1080p".parse::<Resolution>().unwrap(), Resolution::P1080);
        assert_eq!(" mp4 ".parse::<OutputFormat>().unwrap(), OutputFormat::Mp4);
        assert!("blur".parse::<FilterKind>().is_err());
        assert!("4k".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_from_options_defaults() {
        let config = ExportConfig::from_options(None, None, None, None).unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.resolution, Resolution::P720);
        assert_eq!(config.fps, 30);
        assert_eq!(config.format, OutputFormat::Webm);
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let err = ExportConfig::from_options(None, None, Some(0), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_suggested_filename_and_mime() {
        let config =
            ExportConfig::from_options(Some("grayscale"), Some("540p"), Some(60), Some("mp4"))
                .unwrap();
        assert_eq!(config.suggested_filename(), "grayscale-540p-60fps-video.mp4");
        assert_eq!(config.format.mime_type(), "video/mp4");
        assert_eq!(OutputFormat::Webm.mime_type(), "video/webm");
    }
}
