// FFmpeg 비디오 디코더 (ffmpeg-next)
// 아키텍처: 상태 머신 기반 seek+decode, 요청 timestamp "이후 첫 프레임" 반환

use super::pts_to_secs;
use crate::error::{ExportError, ExportResult};
use crate::media::{DecodeOutcome, FrameSize, BYTES_PER_PIXEL};
use ffmpeg_next as ffmpeg;
use std::path::Path;

/// 현재 위치에서 이 범위 내의 미래 timestamp는 seek 없이 forward decode (초)
const FORWARD_THRESHOLD_SECS: f64 = 2.0;

/// 요청 하나에 읽을 최대 패킷 수 (긴 GOP 안전장치)
const MAX_PACKETS_PER_REQUEST: usize = 3000;

/// avg_frame_rate를 알 수 없을 때 가정하는 원본 fps
const FALLBACK_SOURCE_FPS: f64 = 30.0;

/// 디코더 상태 머신
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Ready,       // 정상 동작 가능
    EndOfStream, // 파일 끝 도달 (seek으로 복구 가능)
    Error,       // seek 실패 (다음 요청에서 seek 재시도)
}

/// 디코딩된 원본 프레임 + 소스 기준 시간(초)
struct DecodedFrame {
    pts_secs: f64,
    frame: ffmpeg::frame::Video,
}

/// 목표 PTS 탐색 결과
enum SearchResult {
    Found(DecodedFrame),
    /// 패킷 소진 (EOF) + 탐색 중 마지막으로 본 프레임
    Exhausted(Option<DecodedFrame>),
    /// 패킷 상한 도달
    GaveUp,
}

/// RGBA 스케일러 (입력 포맷/크기 또는 출력 크기가 바뀌면 재생성)
struct ScalerCache {
    ctx: ffmpeg::software::scaling::Context,
    src_format: ffmpeg::format::Pixel,
    src_width: u32,
    src_height: u32,
    dst: FrameSize,
}

/// 비디오 디코더 (export용 seek+decode)
pub struct Decoder {
    input_ctx: ffmpeg::format::context::Input,
    video_stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<ScalerCache>,
    time_base: ffmpeg::Rational,
    /// 스트림 시작 시간 (초) — 요청 timestamp는 0 기준이므로 보정에 사용
    start_secs: f64,
    width: u32,
    height: u32,
    fps: f64,
    duration_secs: f64,
    has_audio: bool,
    /// SAR (픽셀 가로/세로 비)
    pixel_aspect: f64,
    state: DecoderState,
    /// 마지막으로 반환한 프레임 (export fps > 원본 fps일 때 재사용)
    current: Option<DecodedFrame>,
    last_request_secs: Option<f64>,
    /// EOF가 발생한 timestamp — 이 이후 timestamp에 대해 seek+전패킷읽기 반복 방지
    eof_at_secs: Option<f64>,
}

impl Decoder {
    /// Decoder 생성 (Multi-threading)
    fn create_decoder(
        codec_params: ffmpeg::codec::Parameters,
    ) -> ExportResult<ffmpeg::codec::decoder::Video> {
        let mut context = ffmpeg::codec::context::Context::from_parameters(codec_params)
            .map_err(|e| ExportError::source_decode(format!("Failed to create context: {}", e)))?;

        // 디코더당 최대 4스레드 (export는 필터 워커/rayon과 코어를 나눠 씀)
        if let Ok(parallelism) = std::thread::available_parallelism() {
            context.set_threading(ffmpeg::threading::Config {
                kind: ffmpeg::threading::Type::Frame,
                count: parallelism.get().min(4),
            });
        }

        context
            .decoder()
            .video()
            .map_err(|e| ExportError::source_decode(format!("Failed to get video decoder: {}", e)))
    }

    /// 비디오 파일 열기
    pub fn open(file_path: &Path) -> ExportResult<Self> {
        super::init()?;

        // 1차 시도: 기본 오픈
        // 2차 시도: moov atom이 파일 끝에 있는 경우 (카메라 녹화본 등) — probesize 확장
        let input_ctx = ffmpeg::format::input(&file_path)
            .or_else(|_| {
                let mut opts = ffmpeg::Dictionary::new();
                opts.set("probesize", "100000000"); // 100MB
                opts.set("analyzeduration", "30000000"); // 30초
                ffmpeg::format::input_with_dictionary(&file_path, opts)
            })
            .map_err(|e| ExportError::source_decode(format!("Failed to open input: {}", e)))?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| ExportError::source_decode("No video stream found"))?;

        let video_stream_index = video_stream.index();
        let time_base = video_stream.time_base();
        let start_pts = video_stream.start_time();
        let start_secs = if start_pts > 0 {
            pts_to_secs(start_pts, time_base)
        } else {
            0.0
        };

        let fps = [
            f64::from(video_stream.avg_frame_rate()),
            f64::from(video_stream.rate()),
        ]
        .into_iter()
        .find(|f| f.is_finite() && *f > 0.0)
        .unwrap_or(FALLBACK_SOURCE_FPS);

        let duration_secs = if video_stream.duration() > 0 {
            pts_to_secs(video_stream.duration(), time_base)
        } else if input_ctx.duration() > 0 {
            input_ctx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let has_audio = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .is_some();

        let decoder = Self::create_decoder(video_stream.parameters())?;
        let width = decoder.width();
        let height = decoder.height();
        let pixel_aspect = pixel_aspect(decoder.aspect_ratio());

        log::info!(
            "[DECODER] 열기: {}x{} (SAR {:.3}) @ {:.2}fps, {:.3}s, codec={:?}",
            width,
            height,
            pixel_aspect,
            fps,
            duration_secs,
            decoder.id()
        );

        Ok(Self {
            input_ctx,
            video_stream_index,
            decoder,
            scaler: None,
            time_base,
            start_secs,
            width,
            height,
            fps,
            duration_secs,
            has_audio,
            pixel_aspect,
            state: DecoderState::Ready,
            current: None,
            last_request_secs: None,
            eof_at_secs: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    pub fn pixel_aspect(&self) -> f64 {
        self.pixel_aspect
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// 원본 프레임 간격 (초)
    fn frame_duration_secs(&self) -> f64 {
        1.0 / self.fps
    }

    /// 특정 시간(초)의 프레임을 `size` RGBA로 디코딩
    /// - 재사용: 마지막 프레임이 이미 목표 이후 → 다시 변환만
    /// - Forward decode (threshold 이내 전진): seek 없이 PTS 확인하며 전진
    /// - 랜덤 접근 (threshold 초과 또는 역방향): seek + PTS 확인
    /// - EOF/에러: DecodeOutcome으로 구분하여 안전 처리
    pub fn decode_frame_at(&mut self, timestamp: f64, size: FrameSize) -> ExportResult<DecodeOutcome> {
        // EOF 캐싱: 이미 EOF에 도달한 위치 이후의 timestamp는 즉시 반환
        if let Some(eof) = self.eof_at_secs {
            if timestamp >= eof {
                return Ok(DecodeOutcome::EndOfStream);
            }
            // 역방향 요청 시 EOF 마커 초기화
            self.eof_at_secs = None;
        }

        // 원본 프레임 절반 이내면 같은 위치로 간주 (최근접 프레임 선택)
        let tolerance = self.frame_duration_secs() / 2.0;
        let target = timestamp - tolerance;

        let is_ahead = self.state == DecoderState::Ready
            && self.last_request_secs.is_some_and(|last| timestamp >= last);

        if is_ahead {
            if let Some(current) = &self.current {
                if current.pts_secs >= target {
                    self.last_request_secs = Some(timestamp);
                    let data = convert_frame(&mut self.scaler, &current.frame, size)?;
                    return Ok(DecodeOutcome::Frame(data));
                }
            }
        }

        let current_pts = self.current.as_ref().map(|c| c.pts_secs);
        let is_forward = is_ahead
            && current_pts.map_or(true, |pts| timestamp - pts <= FORWARD_THRESHOLD_SECS);

        if !is_forward {
            if let Err(e) = self.seek(timestamp) {
                let reason = seek_skip_reason(timestamp, &e);
                log::warn!("[DECODER] {}", reason);
                return Ok(DecodeOutcome::Skipped(reason));
            }
        }
        self.last_request_secs = Some(timestamp);

        match self.search(target) {
            SearchResult::Found(decoded) => {
                let data = convert_frame(&mut self.scaler, &decoded.frame, size)?;
                self.current = Some(decoded);
                self.state = DecoderState::Ready;
                Ok(DecodeOutcome::Frame(data))
            }
            SearchResult::GaveUp => Ok(DecodeOutcome::Skipped(format!(
                "no frame reached {:.3}s within {} packets",
                timestamp, MAX_PACKETS_PER_REQUEST
            ))),
            SearchResult::Exhausted(latest) => {
                self.state = DecoderState::EndOfStream;

                // 목표 프레임은 없지만 한 프레임 간격 이내의 마지막 프레임이 있으면 그것을 사용
                // (요청 timestamp가 마지막 프레임 PTS 직후에 떨어지는 경우)
                let candidate = latest.or_else(|| self.current.take());
                if let Some(decoded) = candidate {
                    if timestamp - decoded.pts_secs <= self.frame_duration_secs() {
                        let data = convert_frame(&mut self.scaler, &decoded.frame, size)?;
                        self.current = Some(decoded);
                        return Ok(DecodeOutcome::Frame(data));
                    }
                }

                self.eof_at_secs = Some(timestamp);
                Ok(DecodeOutcome::EndOfStream)
            }
        }
    }

    /// 목표 시간(초) 이후 첫 프레임까지 디코딩
    fn search(&mut self, target: f64) -> SearchResult {
        let mut latest: Option<DecodedFrame> = None;

        // Step 1: 디코더 버퍼에서 프레임 확인
        if let Some(found) = receive_until(&mut self.decoder, self.time_base, self.start_secs, target, &mut latest) {
            return SearchResult::Found(found);
        }

        // Step 2: 패킷 읽으며 디코딩 (목표 PTS 도달까지)
        let mut packet_count = 0;
        for (stream, packet) in self.input_ctx.packets() {
            if stream.index() != self.video_stream_index {
                continue;
            }

            // send_packet (EAGAIN 시 drain 후 재시도)
            if self.decoder.send_packet(&packet).is_err() {
                if let Some(found) = receive_until(&mut self.decoder, self.time_base, self.start_secs, target, &mut latest) {
                    return SearchResult::Found(found);
                }
                // 손상 패킷은 버림
                let _ = self.decoder.send_packet(&packet);
            }

            // 디코딩된 프레임 수신 (B-frame 재정렬 대응)
            if let Some(found) = receive_until(&mut self.decoder, self.time_base, self.start_secs, target, &mut latest) {
                return SearchResult::Found(found);
            }

            packet_count += 1;
            if packet_count > MAX_PACKETS_PER_REQUEST {
                return SearchResult::GaveUp;
            }
        }

        // 패킷 소진 = EOF → 디코더 내부 재정렬 버퍼 비우기
        let _ = self.decoder.send_eof();
        if let Some(found) = receive_until(&mut self.decoder, self.time_base, self.start_secs, target, &mut latest) {
            return SearchResult::Found(found);
        }

        SearchResult::Exhausted(latest)
    }

    /// 특정 시간(초)으로 seek (EOF/Error 상태에서 자동 복구)
    fn seek(&mut self, timestamp: f64) -> Result<(), ffmpeg::Error> {
        // input_ctx.seek()는 stream_index=-1 → AV_TIME_BASE(μs) 단위
        let timestamp_us =
            ((timestamp + self.start_secs) * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;

        let result = self
            .input_ctx
            .seek(timestamp_us, ..timestamp_us)
            .or_else(|_| {
                // seek 실패 → flush 후 재시도 1회
                self.decoder.flush();
                self.input_ctx.seek(timestamp_us, ..timestamp_us)
            });

        self.decoder.flush();
        self.current = None;

        match result {
            Ok(()) => {
                self.state = DecoderState::Ready;
                self.eof_at_secs = None;
            }
            Err(_) => self.state = DecoderState::Error,
        }
        result
    }
}

/// SAR → f64 (0/미지정이면 정방형 픽셀)
fn pixel_aspect(sar: ffmpeg::Rational) -> f64 {
    if sar.numerator() <= 0 || sar.denominator() <= 0 {
        return 1.0;
    }
    f64::from(sar.numerator()) / f64::from(sar.denominator())
}

/// seek 실패 사유 (프레임 index는 샘플러가 붙인다)
fn seek_skip_reason(timestamp: f64, error: &ffmpeg::Error) -> String {
    format!("seek to {:.3}s failed after retry: {}", timestamp, error)
}

/// 디코더 버퍼에서 목표 이후 프레임이 나올 때까지 수신
/// (모듈 레벨 함수 - input_ctx.packets() borrow와 충돌 방지)
/// 목표 전 프레임은 `latest`에 보관 (EOF 시 fallback)
fn receive_until(
    decoder: &mut ffmpeg::codec::decoder::Video,
    time_base: ffmpeg::Rational,
    start_secs: f64,
    target: f64,
    latest: &mut Option<DecodedFrame>,
) -> Option<DecodedFrame> {
    loop {
        let mut frame = ffmpeg::frame::Video::empty();
        if decoder.receive_frame(&mut frame).is_err() {
            return None;
        }

        // PTS 정보 없으면 목표 위치로 간주하고 수락
        let pts_secs = match frame.timestamp().or_else(|| frame.pts()) {
            Some(pts) => pts_to_secs(pts, time_base) - start_secs,
            None => target,
        };

        let decoded = DecodedFrame { pts_secs, frame };
        if pts_secs >= target {
            return Some(decoded);
        }
        *latest = Some(decoded);
    }
}

/// 디코딩된 프레임 → `size` RGBA 버퍼 (LANCZOS 리사이즈)
fn convert_frame(
    scaler: &mut Option<ScalerCache>,
    frame: &ffmpeg::frame::Video,
    size: FrameSize,
) -> ExportResult<Vec<u8>> {
    let stale = scaler.as_ref().map_or(true, |s| {
        s.src_format != frame.format()
            || s.src_width != frame.width()
            || s.src_height != frame.height()
            || s.dst != size
    });

    if stale {
        let ctx = ffmpeg::software::scaling::Context::get(
            frame.format(),
            frame.width(),
            frame.height(),
            ffmpeg::format::Pixel::RGBA,
            size.width,
            size.height,
            ffmpeg::software::scaling::Flags::LANCZOS,
        )
        .map_err(|e| ExportError::source_decode(format!("Failed to create scaler: {}", e)))?;

        *scaler = Some(ScalerCache {
            ctx,
            src_format: frame.format(),
            src_width: frame.width(),
            src_height: frame.height(),
            dst: size,
        });
    }

    let cache = scaler
        .as_mut()
        .ok_or_else(|| ExportError::source_decode("Scaler missing"))?;

    let mut scaled = ffmpeg::frame::Video::empty();
    cache
        .ctx
        .run(frame, &mut scaled)
        .map_err(|e| ExportError::source_decode(format!("Failed to scale frame: {}", e)))?;

    extract_rgba(&scaled, size)
}

/// stride 제거하며 RGBA 복사
/// bounds check: FFmpeg이 손상된 프레임을 반환해도 panic 대신 Err 반환
fn extract_rgba(frame: &ffmpeg::frame::Video, size: FrameSize) -> ExportResult<Vec<u8>> {
    let row_size = size.width as usize * BYTES_PER_PIXEL;
    let height = size.height as usize;
    let src_data = frame.data(0);
    let linesize = frame.stride(0);

    if linesize < row_size {
        return Err(ExportError::source_decode(format!(
            "Invalid stride: {} < {} (width * 4)",
            linesize, row_size
        )));
    }

    let required = (height.saturating_sub(1)) * linesize + row_size;
    if src_data.len() < required {
        return Err(ExportError::source_decode(format!(
            "Frame data too small: got {} bytes, need {} ({}x{}, stride={})",
            src_data.len(),
            required,
            size.width,
            size.height,
            linesize
        )));
    }

    let mut data = vec![0u8; size.rgba_len()];
    for (y, dst_row) in data.chunks_exact_mut(row_size).enumerate() {
        let src_offset = y * linesize;
        dst_row.copy_from_slice(&src_data[src_offset..src_offset + row_size]);
    }
    Ok(data)
}
