// 인코딩 & 먹싱 모듈
// 필터된 RGBA 프레임 + PCM 오디오 → webm(VP9+Opus) / mp4(H.264+AAC) 컨테이너 바이트

pub mod encoder;

pub use encoder::{FfmpegBackend, FfmpegEncoder};

use crate::config::OutputFormat;
use crate::error::ExportResult;
use crate::media::{AudioTrack, FilteredFrame, FrameSize};

/// 인코더 스트림 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub format: OutputFormat,
    pub size: FrameSize,
    pub fps: u32,
}

/// 완성된 컨테이너
#[derive(Debug)]
pub struct EncodedOutput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// 인코더 팩토리 (작업마다 새 스트림 생성)
pub trait EncoderBackend: Send + Sync {
    fn start(&self, params: &StreamParams) -> ExportResult<Box<dyn StreamEncoder>>;
}

/// 진행 중인 인코딩 스트림
///
/// 프레임은 index가 엄격히 증가하는 순서로만 push.
/// `finish()` 전에 drop하면 부분 출력은 버려진다.
pub trait StreamEncoder {
    fn push_video_frame(&mut self, frame: &FilteredFrame) -> ExportResult<()>;

    /// 오디오 트랙 연결 (finish 전 한 번)
    fn attach_audio(&mut self, track: AudioTrack) -> ExportResult<()>;

    fn finish(self: Box<Self>) -> ExportResult<EncodedOutput>;
}
