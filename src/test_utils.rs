//! 테스트 헬퍼 - FFmpeg 없이 파이프라인을 돌리기 위한 합성 소스/기록 인코더

use crate::cancel::CancellationToken;
use crate::config::OutputFormat;
use crate::encoding::{
    EncodedOutput, EncoderBackend, FfmpegBackend, StreamEncoder, StreamParams,
};
use crate::error::{ExportError, ExportResult};
use crate::media::{
    AudioSource, AudioTrack, DecodeOutcome, FilteredFrame, FrameSize, SourceInfo, SourceMedia,
    BYTES_PER_PIXEL,
};
use std::sync::{Arc, Mutex};

/// timestamp 비교 오차
const TS_EPSILON: f64 = 1e-9;

/// 합성 비디오 소스
///
/// 프레임 내용은 timestamp와 x 좌표로 정해지는 컬러 그라디언트 (행 반복).
pub struct SyntheticSource {
    info: SourceInfo,
    decodable_until: f64,
    corrupt: Vec<f64>,
    seek_log: Vec<f64>,
    audio: Option<SyntheticAudio>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl SyntheticSource {
    pub fn new(duration_secs: f64, width: u32, height: u32) -> Self {
        Self {
            info: SourceInfo {
                duration_secs,
                width,
                height,
                has_audio: false,
                pixel_aspect: 1.0,
            },
            decodable_until: duration_secs,
            corrupt: Vec::new(),
            seek_log: Vec::new(),
            audio: None,
            cancel_after: None,
        }
    }

    /// 이 시각 이후 요청은 EndOfStream (메타데이터보다 짧은 파일)
    pub fn with_decodable_until(mut self, secs: f64) -> Self {
        self.decodable_until = secs;
        self
    }

    /// 해당 timestamp 요청만 디코딩 실패
    pub fn with_corrupt_timestamps(mut self, timestamps: &[f64]) -> Self {
        self.corrupt = timestamps.to_vec();
        self
    }

    /// 48kHz stereo 오디오 트랙
    pub fn with_audio(mut self, duration_secs: f64) -> Self {
        self.info.has_audio = true;
        self.audio = Some(SyntheticAudio::new(duration_secs));
        self
    }

    /// 취소될 때까지 끝나지 않는 오디오 디코딩 (긴 오디오 트랙 재현)
    pub fn with_blocking_audio(mut self) -> Self {
        self.info.has_audio = true;
        self.audio = Some(SyntheticAudio {
            block_until_cancelled: true,
            ..SyntheticAudio::new(0.0)
        });
        self
    }

    /// 오디오 decode_all이 반환했는지 (스레드 종료 확인용)
    pub fn audio_exited(&self) -> Arc<AtomicBool> {
        self.audio
            .as_ref()
            .map(|audio| Arc::clone(&audio.exited))
            .unwrap_or_default()
    }

    /// 비정방형 픽셀 (SAR)
    pub fn with_pixel_aspect(mut self, pixel_aspect: f64) -> Self {
        self.info.pixel_aspect = pixel_aspect;
        self
    }

    /// 오디오 스트림은 있지만 디코딩 실패
    pub fn with_failing_audio(mut self) -> Self {
        self.info.has_audio = true;
        self.audio = Some(SyntheticAudio {
            fail: true,
            ..SyntheticAudio::new(0.0)
        });
        self
    }

    /// n번째 디코딩 후 토큰 취소 (작업 중간 취소 재현)
    pub fn with_cancel_after(mut self, decodes: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((decodes, token));
        self
    }

    /// 지금까지 요청된 timestamp
    pub fn seek_log(&self) -> &[f64] {
        &self.seek_log
    }

    fn render(timestamp: f64, size: FrameSize) -> Vec<u8> {
        let shade = ((timestamp * 37.0) as u64 % 256) as u8;
        let row: Vec<u8> = (0..size.width)
            .flat_map(|x| {
                let x = (x % 256) as u8;
                [x.wrapping_add(shade), x.wrapping_mul(3), 255 - x, 255]
            })
            .collect();
        debug_assert_eq!(row.len(), size.width as usize * BYTES_PER_PIXEL);
        row.repeat(size.height as usize)
    }
}

impl SourceMedia for SyntheticSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn decode_frame_at(&mut self, timestamp: f64, size: FrameSize) -> ExportResult<DecodeOutcome> {
        self.seek_log.push(timestamp);

        if let Some((after, token)) = &self.cancel_after {
            if self.seek_log.len() >= *after {
                token.cancel();
            }
        }

        if self.corrupt.iter().any(|c| (c - timestamp).abs() < TS_EPSILON) {
            return Ok(DecodeOutcome::Skipped(format!("corrupt frame at {:.3}s", timestamp)));
        }
        if timestamp > self.decodable_until + TS_EPSILON {
            return Ok(DecodeOutcome::EndOfStream);
        }
        Ok(DecodeOutcome::Frame(Self::render(timestamp, size)))
    }

    fn open_audio(&self) -> ExportResult<Option<Box<dyn AudioSource>>> {
        Ok(self
            .audio
            .clone()
            .map(|audio| Box::new(audio) as Box<dyn AudioSource>))
    }
}

/// 합성 오디오 (440Hz 사인파)
#[derive(Debug, Clone)]
pub struct SyntheticAudio {
    duration_secs: f64,
    fail: bool,
    block_until_cancelled: bool,
    exited: Arc<AtomicBool>,
}

impl SyntheticAudio {
    fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            fail: false,
            block_until_cancelled: false,
            exited: Arc::new(AtomicBool::new(false)),
        }
    }

    fn decode(&self, cancel: &CancellationToken) -> ExportResult<AudioTrack> {
        if self.block_until_cancelled {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            return Err(ExportError::Cancelled);
        }
        if self.fail {
            return Err(ExportError::audio_unavailable("unsupported codec"));
        }
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let rate = 48000u32;
        let frames = (self.duration_secs * rate as f64).round() as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let v = (i as f32 * 440.0 * std::f32::consts::TAU / rate as f32).sin() * 0.25;
                [v, v]
            })
            .collect();
        Ok(AudioTrack::new(samples, rate, 2))
    }
}

impl AudioSource for SyntheticAudio {
    fn decode_all(&mut self, cancel: &CancellationToken) -> ExportResult<AudioTrack> {
        let result = self.decode(cancel);
        self.exited.store(true, Ordering::SeqCst);
        result
    }
}

/// RecordingBackend가 기록한 내용
#[derive(Debug, Clone)]
pub struct Recording {
    pub started: Option<StreamParams>,
    pub indices: Vec<u64>,
    pub sizes: Vec<FrameSize>,
    /// 모든 프레임의 모든 픽셀이 R == G == B
    pub all_gray: bool,
    pub audio_secs: Option<f64>,
    pub finished: bool,
}

impl Default for Recording {
    fn default() -> Self {
        Self {
            started: None,
            indices: Vec::new(),
            sizes: Vec::new(),
            all_gray: true,
            audio_secs: None,
            finished: false,
        }
    }
}

/// push된 프레임을 기록만 하는 인코더 (실패 주입 가능)
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    recording: Arc<Mutex<Recording>>,
    fail_init: bool,
    fail_push_at: Option<u64>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_push_at(mut self, index: u64) -> Self {
        self.fail_push_at = Some(index);
        self
    }

    pub fn snapshot(&self) -> Recording {
        self.recording.lock().unwrap().clone()
    }
}

impl EncoderBackend for RecordingBackend {
    fn start(&self, params: &StreamParams) -> ExportResult<Box<dyn StreamEncoder>> {
        if self.fail_init {
            return Err(ExportError::encoder_init("no encoder for test"));
        }
        self.recording.lock().unwrap().started = Some(*params);
        Ok(Box::new(RecordingEncoder {
            params: *params,
            recording: Arc::clone(&self.recording),
            fail_push_at: self.fail_push_at,
        }))
    }
}

struct RecordingEncoder {
    params: StreamParams,
    recording: Arc<Mutex<Recording>>,
    fail_push_at: Option<u64>,
}

fn frame_is_gray(frame: &FilteredFrame) -> bool {
    frame
        .data
        .chunks_exact(BYTES_PER_PIXEL)
        .all(|px| px[0] == px[1] && px[1] == px[2])
}

impl StreamEncoder for RecordingEncoder {
    fn push_video_frame(&mut self, frame: &FilteredFrame) -> ExportResult<()> {
        if self.fail_push_at == Some(frame.index()) {
            return Err(ExportError::encoder_write("injected write failure"));
        }
        let mut recording = self.recording.lock().unwrap();
        if recording.indices.last().is_some_and(|&last| frame.index() <= last) {
            return Err(ExportError::encoder_write("frames out of order"));
        }
        recording.indices.push(frame.index());
        recording.sizes.push(frame.size);
        let gray = frame_is_gray(frame);
        recording.all_gray &= gray;
        Ok(())
    }

    fn attach_audio(&mut self, track: AudioTrack) -> ExportResult<()> {
        self.recording.lock().unwrap().audio_secs = Some(track.duration_secs());
        Ok(())
    }

    fn finish(self: Box<Self>) -> ExportResult<EncodedOutput> {
        let mut recording = self.recording.lock().unwrap();
        recording.finished = true;
        Ok(EncodedOutput {
            bytes: format!("{} frames", recording.indices.len()).into_bytes(),
            mime_type: self.params.format.mime_type(),
        })
    }
}

/// 프레임 index가 밝기로 인코딩된 회색 클립 (FFmpeg 인코더 필요)
///
/// frame i의 모든 픽셀 = `clip_shade(i)`. 디코딩 결과에서 `shade_to_index`로 역추적.
pub fn encode_test_clip(
    format: OutputFormat,
    size: FrameSize,
    fps: u32,
    frames: u64,
    audio_secs: Option<f64>,
) -> ExportResult<Vec<u8>> {
    let mut encoder = FfmpegBackend.start(&StreamParams { format, size, fps })?;
    for index in 0..frames {
        let shade = clip_shade(index);
        let data = [shade, shade, shade, 255].repeat(size.width as usize * size.height as usize);
        encoder.push_video_frame(&FilteredFrame {
            request: FrameRequest::new(index, fps),
            size,
            data,
        })?;
    }
    if let Some(secs) = audio_secs {
        let mut audio = SyntheticAudio::new(secs);
        encoder.attach_audio(audio.decode_all(&CancellationToken::new())?)?;
    }
    Ok(encoder.finish()?.bytes)
}

/// 클립 프레임 밝기 (손실 압축 오차보다 충분히 큰 간격)
pub fn clip_shade(index: u64) -> u8 {
    (16 + index * 10).min(255) as u8
}

/// 디코딩된 RGBA 중앙 픽셀 → 클립 프레임 index
pub fn shade_to_index(rgba: &[u8], size: FrameSize) -> u64 {
    let center = ((size.height / 2) * size.width + size.width / 2) as usize * BYTES_PER_PIXEL;
    let shade = f64::from(rgba[center]);
    ((shade - 16.0) / 10.0).round().max(0.0) as u64
}
