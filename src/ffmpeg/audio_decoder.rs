// 오디오 디코더 - FFmpeg으로 오디오 스트림 전체를 f32 PCM으로 디코딩
// Export 오디오 트랙 추출용 (비디오 디코더와 독립된 컨텍스트)

use crate::cancel::CancellationToken;
use crate::error::{ExportError, ExportResult};
use crate::media::AudioTrack;
use ffmpeg_next as ffmpeg;
use std::path::Path;

/// 출력 포맷 상수
pub const OUTPUT_SAMPLE_RATE: u32 = 48000;
pub const OUTPUT_CHANNELS: u32 = 2;

/// 취소 확인 간격 (패킷 수)
const CANCEL_CHECK_PACKETS: usize = 64;

/// 오디오 디코더 (f32 stereo 48kHz 출력)
pub struct AudioDecoder {
    input_ctx: ffmpeg::format::context::Input,
    audio_stream_index: usize,
    decoder: ffmpeg::codec::decoder::Audio,
    /// 첫 프레임을 받은 뒤 생성 (일부 코덱은 디코더 파라미터에 레이아웃이 비어 있음)
    resampler: Option<ffmpeg::software::resampling::Context>,
    duration_secs: f64,
}

impl AudioDecoder {
    /// 오디오 파일 열기 (오디오 스트림이 없으면 AudioUnavailable)
    pub fn open(file_path: &Path) -> ExportResult<Self> {
        super::init()?;

        let input_ctx = ffmpeg::format::input(&file_path)
            .map_err(|e| ExportError::audio_unavailable(format!("Failed to open audio file: {}", e)))?;

        let audio_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .ok_or_else(|| ExportError::audio_unavailable("No audio stream found"))?;

        let audio_stream_index = audio_stream.index();
        let time_base = audio_stream.time_base();

        let duration_secs = if audio_stream.duration() > 0 {
            super::pts_to_secs(audio_stream.duration(), time_base)
        } else if input_ctx.duration() > 0 {
            input_ctx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(audio_stream.parameters())
            .map_err(|e| ExportError::audio_unavailable(format!("Failed to create audio context: {}", e)))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| ExportError::audio_unavailable(format!("Failed to get audio decoder: {}", e)))?;

        log::info!(
            "[AUDIO_DECODER] 열기: {}Hz, {}ch, {:.3}s, codec={:?}",
            decoder.rate(),
            decoder.channels(),
            duration_secs,
            decoder.id()
        );

        Ok(Self {
            input_ctx,
            audio_stream_index,
            decoder,
            resampler: None,
            duration_secs,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// 전체 오디오를 f32 interleaved stereo 48kHz로 디코딩
    pub fn decode_all(&mut self, cancel: &CancellationToken) -> ExportResult<AudioTrack> {
        let estimated = (self.duration_secs.max(0.0) * OUTPUT_SAMPLE_RATE as f64) as usize
            * OUTPUT_CHANNELS as usize;
        let mut samples: Vec<f32> = Vec::with_capacity(estimated);

        let mut packet_count = 0usize;
        for (stream, packet) in self.input_ctx.packets() {
            if stream.index() != self.audio_stream_index {
                continue;
            }

            packet_count += 1;
            if packet_count % CANCEL_CHECK_PACKETS == 0 && cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            // 손상 패킷은 버리고 계속 (오디오는 best-effort)
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("[AUDIO_DECODER] send_packet 실패 (무시): {}", e);
            }
            drain_decoder(&mut self.decoder, &mut self.resampler, &mut samples)?;
        }

        // EOF → 디코더/리샘플러 내부 버퍼 비우기
        let _ = self.decoder.send_eof();
        drain_decoder(&mut self.decoder, &mut self.resampler, &mut samples)?;
        if let Some(resampler) = self.resampler.as_mut() {
            flush_resampler(resampler, &mut samples)?;
        }

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        if samples.is_empty() {
            return Err(ExportError::audio_unavailable("Audio stream decoded to zero samples"));
        }

        let track = AudioTrack::new(samples, OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS);
        log::info!(
            "[AUDIO_DECODER] 디코딩 완료: {} packets, {:.3}s",
            packet_count,
            track.duration_secs()
        );
        Ok(track)
    }
}

/// 디코더 버퍼의 모든 프레임을 리샘플링하여 누적
/// (모듈 레벨 함수 - input_ctx.packets() borrow와 충돌 방지)
fn drain_decoder(
    decoder: &mut ffmpeg::codec::decoder::Audio,
    resampler: &mut Option<ffmpeg::software::resampling::Context>,
    out: &mut Vec<f32>,
) -> ExportResult<()> {
    let mut decoded = ffmpeg::frame::Audio::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        if resampler.is_none() {
            *resampler = Some(create_resampler(&decoded)?);
        }
        if let Some(ctx) = resampler.as_mut() {
            let mut resampled = ffmpeg::frame::Audio::empty();
            ctx.run(&decoded, &mut resampled)
                .map_err(|e| ExportError::audio_unavailable(format!("Resample failed: {}", e)))?;
            append_packed(&resampled, out);
        }
    }
    Ok(())
}

/// 리샘플러 지연 버퍼 비우기
fn flush_resampler(
    resampler: &mut ffmpeg::software::resampling::Context,
    out: &mut Vec<f32>,
) -> ExportResult<()> {
    // 지연은 보통 한두 번이면 소진됨
    for _ in 0..8 {
        let mut resampled = ffmpeg::frame::Audio::empty();
        match resampler.flush(&mut resampled) {
            Ok(_) if resampled.samples() > 0 => append_packed(&resampled, out),
            Ok(_) => break,
            Err(e) => {
                log::debug!("[AUDIO_DECODER] resampler flush 실패 (무시): {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// 입력 프레임 포맷 → f32 packed stereo 48kHz
fn create_resampler(
    frame: &ffmpeg::frame::Audio,
) -> ExportResult<ffmpeg::software::resampling::Context> {
    let mut layout = frame.channel_layout();
    if layout.is_empty() {
        layout = ffmpeg::ChannelLayout::default(i32::from(frame.channels()));
    }

    ffmpeg::software::resampling::Context::get(
        frame.format(),
        layout,
        frame.rate(),
        ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
        ffmpeg::ChannelLayout::STEREO,
        OUTPUT_SAMPLE_RATE,
    )
    .map_err(|e| ExportError::audio_unavailable(format!("Failed to create resampler: {}", e)))
}

/// packed f32 프레임의 샘플을 누적 (plane 0만 사용)
fn append_packed(frame: &ffmpeg::frame::Audio, out: &mut Vec<f32>) {
    let sample_count = frame.samples() * OUTPUT_CHANNELS as usize;
    if sample_count == 0 {
        return;
    }
    let data = frame.data(0);
    let available = data.len() / std::mem::size_of::<f32>();
    out.extend(
        data.chunks_exact(std::mem::size_of::<f32>())
            .take(sample_count.min(available))
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::error::ErrorKind;
    use crate::ffmpeg::FfmpegSource;
    use crate::media::{FrameSize, SourceMedia};
    use crate::test_utils::encode_test_clip;

    fn clip_with_audio(format: OutputFormat, audio_secs: Option<f64>) -> FfmpegSource {
        let bytes = encode_test_clip(format, FrameSize::new(160, 120), 10, 20, audio_secs).unwrap();
        FfmpegSource::open(&bytes).unwrap()
    }

    #[test]
    #[ignore] // FFmpeg 인코더/디코더 필요
    fn test_decode_all_matches_track_duration() {
        for format in [OutputFormat::Mp4, OutputFormat::Webm] {
            let source = clip_with_audio(format, Some(2.0));
            assert!(source.info().has_audio);
            let opened = AudioDecoder::open(source.path()).unwrap();
            assert!((opened.duration_secs() - 2.0).abs() <= 0.1);

            let mut audio = source.open_audio().unwrap().unwrap();
            let track = audio.decode_all(&CancellationToken::new()).unwrap();
            assert_eq!(track.sample_rate, OUTPUT_SAMPLE_RATE);
            assert_eq!(track.channels, OUTPUT_CHANNELS);
            // 코덱 priming/패딩 허용
            assert!((track.duration_secs() - 2.0).abs() <= 0.1, "{}: {}", format, track.duration_secs());
        }
    }

    #[test]
    #[ignore] // FFmpeg 인코더/디코더 필요
    fn test_cancelled_decode_returns_cancelled() {
        let source = clip_with_audio(OutputFormat::Mp4, Some(2.0));
        let mut audio = source.open_audio().unwrap().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = audio.decode_all(&cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CancelledByCaller);
    }

    #[test]
    #[ignore] // FFmpeg 인코더/디코더 필요
    fn test_video_only_clip_has_no_audio() {
        let source = clip_with_audio(OutputFormat::Mp4, None);
        assert!(!source.info().has_audio);
        assert!(source.open_audio().unwrap().is_none());

        // 직접 열면 AudioUnavailable
        let err = AudioDecoder::open(source.path()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::AudioUnavailable);
    }
}
