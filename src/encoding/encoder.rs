// 비디오/오디오 인코더 - FFmpeg 기반 VP9/H.264 + Opus/AAC 인코딩
// RGBA 프레임 → YUV420P 변환 → 비디오 인코딩 (패킷 버퍼링)
// finish 시점에 오디오 스트림 추가 → 헤더 → 시간순 interleave 먹싱 → 임시 파일 바이트 반환

use super::{EncodedOutput, EncoderBackend, StreamEncoder, StreamParams};
use crate::config::OutputFormat;
use crate::error::{ExportError, ExportResult};
use crate::media::{AudioTrack, FilteredFrame, BYTES_PER_PIXEL};
use ffmpeg::codec;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg_next as ffmpeg;
use tempfile::TempPath;

/// 오디오 비트레이트 힌트 (bps)
const AUDIO_BIT_RATE: usize = 128_000;

/// 선호 오디오 샘플레이트
const PREFERRED_SAMPLE_RATE: i32 = 48000;

/// 코덱이 frame_size를 알려주지 않을 때 (가변 프레임 코덱)
const DEFAULT_AUDIO_FRAME_SIZE: usize = 1024;

/// 코덱 후보: 이름(외부 라이브러리) 우선, 없으면 코덱 ID
enum CodecCandidate {
    Name(&'static str),
    Id(codec::Id),
}

fn video_candidates(format: OutputFormat) -> &'static [CodecCandidate] {
    match format {
        OutputFormat::Webm => &[
            CodecCandidate::Name("libvpx-vp9"),
            CodecCandidate::Id(codec::Id::VP9),
            CodecCandidate::Name("libvpx"),
            CodecCandidate::Id(codec::Id::VP8),
        ],
        OutputFormat::Mp4 => &[
            CodecCandidate::Name("libx264"),
            CodecCandidate::Id(codec::Id::H264),
            CodecCandidate::Id(codec::Id::MPEG4),
        ],
    }
}

fn audio_candidates(format: OutputFormat) -> &'static [CodecCandidate] {
    match format {
        OutputFormat::Webm => &[
            CodecCandidate::Name("libopus"),
            CodecCandidate::Id(codec::Id::OPUS),
            CodecCandidate::Name("libvorbis"),
            CodecCandidate::Id(codec::Id::VORBIS),
        ],
        OutputFormat::Mp4 => &[CodecCandidate::Id(codec::Id::AAC)],
    }
}

/// 빌드된 FFmpeg에 있는 첫 번째 후보 인코더
fn find_encoder(candidates: &[CodecCandidate]) -> Option<ffmpeg::Codec> {
    candidates.iter().find_map(|candidate| match candidate {
        CodecCandidate::Name(name) => ffmpeg::encoder::find_by_name(name),
        CodecCandidate::Id(id) => ffmpeg::encoder::find(*id),
    })
}

/// 비디오 코덱별 품질 옵션 + 비트레이트 (0 = CRF 품질 모드)
fn video_options(codec_name: &str, size_pixels: u64) -> (ffmpeg::Dictionary<'static>, usize) {
    let mut opts = ffmpeg::Dictionary::new();
    match codec_name {
        "libvpx-vp9" => {
            opts.set("crf", "32");
            opts.set("deadline", "good");
            opts.set("cpu-used", "4");
            opts.set("row-mt", "1");
            (opts, 0)
        }
        "libx264" => {
            opts.set("crf", "23");
            opts.set("preset", "medium");
            (opts, 0)
        }
        "libvpx" => {
            opts.set("crf", "10");
            opts.set("deadline", "good");
            opts.set("cpu-used", "4");
            // VP8은 CRF 모드에서도 상한 비트레이트 필요
            (opts, (size_pixels * 4) as usize)
        }
        // 내장 인코더 (mpeg4 등): 해상도 비례 비트레이트
        _ => (opts, (size_pixels * 5) as usize),
    }
}

/// 인코더 시간축 기준 패킷 목록
struct EncodedStream {
    stream_index: usize,
    time_base: ffmpeg::Rational,
    packets: Vec<ffmpeg::Packet>,
}

/// FFmpeg 인코더 팩토리
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl EncoderBackend for FfmpegBackend {
    fn start(&self, params: &StreamParams) -> ExportResult<Box<dyn StreamEncoder>> {
        Ok(Box::new(FfmpegEncoder::new(params)?))
    }
}

/// 비디오 인코더 + 컨테이너 먹서
pub struct FfmpegEncoder {
    params: StreamParams,
    output_path: TempPath,
    output_ctx: ffmpeg::format::context::Output,
    needs_global_header: bool,
    encoder: ffmpeg::encoder::Video,
    scaler: scaling::Context,
    video: EncodedStream,
    last_index: Option<u64>,
    audio: Option<AudioTrack>,
}

impl FfmpegEncoder {
    /// 비디오 인코더 생성
    /// - 출력: 임시 파일 (finish에서 읽어서 반환)
    /// - time_base: 1/fps, PTS = 프레임 요청 index
    pub fn new(params: &StreamParams) -> ExportResult<Self> {
        let StreamParams { format, size, fps } = *params;
        if size.width == 0 || size.height == 0 || size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(ExportError::encoder_init(format!(
                "YUV420P requires non-zero even dimensions, got {}x{}",
                size.width, size.height
            )));
        }
        if fps == 0 {
            return Err(ExportError::encoder_init("fps must be positive"));
        }

        crate::ffmpeg::init().map_err(|e| ExportError::encoder_init(e.to_string()))?;

        let output_path = tempfile::Builder::new()
            .prefix("export-out-")
            .suffix(&format!(".{}", format.as_str()))
            .tempfile()
            .map_err(|e| ExportError::encoder_init(format!("Failed to create temp output: {}", e)))?
            .into_temp_path();

        let mut output_ctx = ffmpeg::format::output_as(&output_path, format.muxer_name())
            .map_err(|e| ExportError::encoder_init(format!("Failed to create output: {}", e)))?;

        let codec = find_encoder(video_candidates(format)).ok_or_else(|| {
            ExportError::encoder_init(format!("No video encoder available for {}", format))
        })?;

        // 글로벌 헤더 플래그 사전 확인 (borrow 충돌 방지)
        let needs_global_header = output_ctx
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let mut video_stream = output_ctx
            .add_stream(codec)
            .map_err(|e| ExportError::encoder_init(format!("Failed to add video stream: {}", e)))?;
        let video_stream_index = video_stream.index();

        let time_base = ffmpeg::Rational::new(1, fps as i32);
        video_stream.set_time_base(time_base);

        let mut encoder = codec::context::Context::from_parameters(video_stream.parameters())
            .map_err(|e| ExportError::encoder_init(format!("Failed to create encoder context: {}", e)))?
            .encoder()
            .video()
            .map_err(|e| ExportError::encoder_init(format!("Failed to get video encoder: {}", e)))?;

        let (opts, bit_rate) = video_options(codec.name(), u64::from(size.width) * u64::from(size.height));

        encoder.set_width(size.width);
        encoder.set_height(size.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps as i32, 1)));
        encoder.set_bit_rate(bit_rate);

        // 글로벌 헤더 플래그 (MP4/WebM 컨테이너 호환)
        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |= codec::flag::Flags::GLOBAL_HEADER.bits() as i32;
            }
        }

        let encoder = encoder
            .open_as_with(codec, opts)
            .map_err(|e| ExportError::encoder_init(format!("Failed to open {} encoder: {}", codec.name(), e)))?;

        video_stream.set_parameters(&encoder);

        // RGBA → YUV420P 스케일러 (크기 동일, 색공간 변환만)
        let scaler = scaling::Context::get(
            Pixel::RGBA,
            size.width,
            size.height,
            Pixel::YUV420P,
            size.width,
            size.height,
            scaling::Flags::FAST_BILINEAR,
        )
        .map_err(|e| ExportError::encoder_init(format!("Failed to create scaler: {}", e)))?;

        log::info!(
            "[ENCODER] 시작: {} {}x{} @ {}fps, codec={}",
            format,
            size.width,
            size.height,
            fps,
            codec.name()
        );

        Ok(Self {
            params: *params,
            output_path,
            output_ctx,
            needs_global_header,
            encoder,
            scaler,
            video: EncodedStream {
                stream_index: video_stream_index,
                time_base,
                packets: Vec::new(),
            },
            last_index: None,
            audio: None,
        })
    }

    /// 인코더에서 패킷 수신 → 버퍼에 보관 (헤더는 finish에서 기록)
    fn receive_video_packets(&mut self) {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.video.stream_index);
            self.video.packets.push(packet);
            packet = ffmpeg::Packet::empty();
        }
    }

    /// 오디오 스트림 추가 + 전체 트랙 인코딩 (write_header 전에 호출)
    fn encode_audio(&mut self, track: &AudioTrack) -> ExportResult<EncodedStream> {
        let codec = find_encoder(audio_candidates(self.params.format)).ok_or_else(|| {
            ExportError::encoder_init(format!("No audio encoder available for {}", self.params.format))
        })?;
        let audio_codec = codec
            .audio()
            .map_err(|e| ExportError::encoder_init(format!("{} is not an audio codec: {}", codec.name(), e)))?;

        // 샘플레이트: 48kHz 지원 시 사용, 아니면 코덱 첫 번째 지원 값
        let rate = match audio_codec.rates() {
            Some(rates) => {
                let supported: Vec<i32> = rates.collect();
                if supported.is_empty() || supported.contains(&PREFERRED_SAMPLE_RATE) {
                    PREFERRED_SAMPLE_RATE
                } else {
                    supported[0]
                }
            }
            None => PREFERRED_SAMPLE_RATE,
        };

        // 샘플 포맷: float 우선 (packed → planar), 없으면 첫 번째
        let sample_format = match audio_codec.formats() {
            Some(formats) => {
                let supported: Vec<ffmpeg::format::Sample> = formats.collect();
                [
                    ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
                    ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar),
                ]
                .into_iter()
                .find(|f| supported.contains(f))
                .or_else(|| supported.first().copied())
                .ok_or_else(|| ExportError::encoder_init("Audio encoder reports no sample formats"))?
            }
            None => ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar),
        };

        let mut audio_stream = self
            .output_ctx
            .add_stream(codec)
            .map_err(|e| ExportError::encoder_init(format!("Failed to add audio stream: {}", e)))?;
        let stream_index = audio_stream.index();
        let time_base = ffmpeg::Rational::new(1, rate);
        audio_stream.set_time_base(time_base);

        let mut encoder = codec::context::Context::from_parameters(audio_stream.parameters())
            .map_err(|e| ExportError::encoder_init(format!("Failed to create audio context: {}", e)))?
            .encoder()
            .audio()
            .map_err(|e| ExportError::encoder_init(format!("Failed to get audio encoder: {}", e)))?;

        encoder.set_rate(rate);
        encoder.set_channel_layout(ffmpeg::ChannelLayout::STEREO);
        encoder.set_format(sample_format);
        encoder.set_bit_rate(AUDIO_BIT_RATE);
        encoder.set_time_base(time_base);

        if self.needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |= codec::flag::Flags::GLOBAL_HEADER.bits() as i32;
            }
        }

        // 내장 opus/vorbis는 experimental
        let mut opts = ffmpeg::Dictionary::new();
        opts.set("strict", "experimental");

        let mut encoder = encoder
            .open_as_with(codec, opts)
            .map_err(|e| ExportError::encoder_init(format!("Failed to open {} encoder: {}", codec.name(), e)))?;
        audio_stream.set_parameters(&encoder);

        let pcm = resample_track(track, sample_format, rate as u32)?;

        let capabilities = codec.capabilities();
        let variable_tail = capabilities.contains(codec::capabilities::Capabilities::VARIABLE_FRAME_SIZE)
            || capabilities.contains(codec::capabilities::Capabilities::SMALL_LAST_FRAME);
        let frame_size = match encoder.frame_size() {
            0 => DEFAULT_AUDIO_FRAME_SIZE,
            n => n as usize,
        };

        let mut packets = Vec::new();
        let mut offset = 0usize;
        while offset < pcm.samples {
            let n = frame_size.min(pcm.samples - offset);
            // 마지막 짧은 프레임을 받지 않는 코덱은 무음 패딩
            let alloc = if variable_tail { n } else { frame_size };

            let mut frame = ffmpeg::frame::Audio::new(sample_format, alloc, ffmpeg::ChannelLayout::STEREO);
            frame.set_rate(rate as u32);
            frame.set_pts(Some(offset as i64));
            for (plane, src) in pcm.planes.iter().enumerate() {
                let dst = frame.data_mut(plane);
                let start = offset * pcm.stride;
                let len = n * pcm.stride;
                dst[..len].copy_from_slice(&src[start..start + len]);
                dst[len..alloc * pcm.stride].fill(0);
            }

            encoder
                .send_frame(&frame)
                .map_err(|e| ExportError::encoder_write(format!("Failed to send audio frame: {}", e)))?;
            drain_audio_packets(&mut encoder, stream_index, &mut packets);
            offset += n;
        }

        encoder
            .send_eof()
            .map_err(|e| ExportError::encoder_write(format!("Failed to flush audio encoder: {}", e)))?;
        drain_audio_packets(&mut encoder, stream_index, &mut packets);

        log::info!(
            "[ENCODER] 오디오 인코딩: codec={}, {}Hz, {} samples → {} packets",
            codec.name(),
            rate,
            pcm.samples,
            packets.len()
        );

        Ok(EncodedStream {
            stream_index,
            time_base,
            packets,
        })
    }
}

impl StreamEncoder for FfmpegEncoder {
    /// RGBA 프레임 인코딩 → 패킷 버퍼
    fn push_video_frame(&mut self, frame: &FilteredFrame) -> ExportResult<()> {
        let index = frame.index();
        if self.last_index.is_some_and(|last| index <= last) {
            return Err(ExportError::encoder_write(format!(
                "Frame index {} pushed after {}",
                index,
                self.last_index.unwrap_or_default()
            )));
        }

        let size = self.params.size;
        if frame.size != size || frame.data.len() != size.rgba_len() {
            return Err(ExportError::encoder_write(format!(
                "Invalid frame: {}x{} ({} bytes), expected {}x{}",
                frame.size.width,
                frame.size.height,
                frame.data.len(),
                size.width,
                size.height
            )));
        }

        // RGBA 데이터 → ffmpeg Video 프레임 (stride 맞춰 행 단위 복사)
        let mut src_frame = ffmpeg::frame::Video::new(Pixel::RGBA, size.width, size.height);
        {
            let row_size = size.width as usize * BYTES_PER_PIXEL;
            let linesize = src_frame.stride(0);
            let dst = src_frame.data_mut(0);
            for (y, src_row) in frame.data.chunks_exact(row_size).enumerate() {
                let dst_offset = y * linesize;
                dst[dst_offset..dst_offset + row_size].copy_from_slice(src_row);
            }
        }

        let mut yuv_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&src_frame, &mut yuv_frame)
            .map_err(|e| ExportError::encoder_write(format!("Scaler failed: {}", e)))?;

        // PTS = 요청 index (건너뛴 프레임은 앞 프레임이 길게 표시됨)
        yuv_frame.set_pts(Some(index as i64));

        self.encoder
            .send_frame(&yuv_frame)
            .map_err(|e| ExportError::encoder_write(format!("Failed to send frame {}: {}", index, e)))?;
        self.receive_video_packets();

        self.last_index = Some(index);
        Ok(())
    }

    fn attach_audio(&mut self, track: AudioTrack) -> ExportResult<()> {
        if self.audio.is_some() {
            return Err(ExportError::encoder_write("Audio track already attached"));
        }
        if !track.is_empty() {
            self.audio = Some(track);
        }
        Ok(())
    }

    /// 인코딩 완료 (flush + 오디오 + 헤더 + interleave + trailer)
    fn finish(mut self: Box<Self>) -> ExportResult<EncodedOutput> {
        // flush: EOF 전송
        self.encoder
            .send_eof()
            .map_err(|e| ExportError::encoder_write(format!("Failed to send EOF: {}", e)))?;
        self.receive_video_packets();

        if self.video.packets.is_empty() {
            return Err(ExportError::empty_output("Video encoder produced no packets"));
        }

        let audio = match self.audio.take() {
            Some(track) => Some(self.encode_audio(&track)?),
            None => None,
        };

        let mut header_opts = ffmpeg::Dictionary::new();
        if self.params.format == OutputFormat::Mp4 {
            // moov atom을 파일 앞에 (스트리밍 재생)
            header_opts.set("movflags", "+faststart");
        }
        self.output_ctx
            .write_header_with(header_opts)
            .map_err(|e| ExportError::encoder_write(format!("Failed to write header: {}", e)))?;

        let this = *self;
        let FfmpegEncoder {
            params,
            output_path,
            mut output_ctx,
            video,
            ..
        } = this;

        let streams: Vec<EncodedStream> = std::iter::once(video).chain(audio).collect();
        write_interleaved(&mut output_ctx, streams)?;

        // 파일 트레일러 작성 후 컨텍스트 닫기
        output_ctx
            .write_trailer()
            .map_err(|e| ExportError::encoder_write(format!("Failed to write trailer: {}", e)))?;
        drop(output_ctx);

        let bytes = std::fs::read(&output_path)
            .map_err(|e| ExportError::encoder_write(format!("Failed to read encoded output: {}", e)))?;

        log::info!("[ENCODER] 완료: {} bytes ({})", bytes.len(), params.format);

        Ok(EncodedOutput {
            bytes,
            mime_type: params.format.mime_type(),
        })
    }
}

fn drain_audio_packets(
    encoder: &mut ffmpeg::encoder::Audio,
    stream_index: usize,
    packets: &mut Vec<ffmpeg::Packet>,
) {
    let mut packet = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packets.push(packet);
        packet = ffmpeg::Packet::empty();
    }
}

/// 패킷 시작 시각 (초, 인코더 time_base 기준)
fn packet_secs(packet: &ffmpeg::Packet, time_base: ffmpeg::Rational) -> f64 {
    let ts = packet.dts().or_else(|| packet.pts()).unwrap_or(0);
    crate::ffmpeg::pts_to_secs(ts, time_base)
}

/// 스트림별 패킷을 시간순으로 섞어서 기록
fn write_interleaved(
    output_ctx: &mut ffmpeg::format::context::Output,
    streams: Vec<EncodedStream>,
) -> ExportResult<()> {
    // (인코더 time_base, 스트림 time_base, 남은 패킷)
    let mut queues = Vec::with_capacity(streams.len());
    for stream in streams {
        let stream_tb = output_ctx
            .stream(stream.stream_index)
            .ok_or_else(|| ExportError::encoder_write("Output stream not found"))?
            .time_base();
        queues.push((stream.time_base, stream_tb, stream.packets.into_iter().peekable()));
    }

    loop {
        let next = queues
            .iter_mut()
            .enumerate()
            .filter_map(|(i, (tb, _, packets))| packets.peek().map(|p| (i, packet_secs(p, *tb))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        let Some(i) = next else {
            break;
        };
        let (encoder_tb, stream_tb, packets) = &mut queues[i];
        if let Some(mut packet) = packets.next() {
            // time_base 변환 (인코더 → 스트림)
            packet.rescale_ts(*encoder_tb, *stream_tb);
            packet
                .write_interleaved(output_ctx)
                .map_err(|e| ExportError::encoder_write(format!("Failed to write packet: {}", e)))?;
        }
    }
    Ok(())
}

/// 리샘플 결과 (plane별 바이트)
struct PcmPlanes {
    planes: Vec<Vec<u8>>,
    /// 채널당 샘플 수
    samples: usize,
    /// plane 내 샘플 하나의 바이트 수 (packed면 채널 수 포함)
    stride: usize,
}

/// f32 interleaved 트랙 → 인코더 포맷/샘플레이트 (한 번에 변환)
fn resample_track(
    track: &AudioTrack,
    target_format: ffmpeg::format::Sample,
    target_rate: u32,
) -> ExportResult<PcmPlanes> {
    let channels = 2usize;
    let stride = if target_format.is_planar() {
        target_format.bytes()
    } else {
        target_format.bytes() * channels
    };
    let plane_count = if target_format.is_planar() { channels } else { 1 };
    let mut pcm = PcmPlanes {
        planes: vec![Vec::new(); plane_count],
        samples: 0,
        stride,
    };

    let input_samples = track.frame_count();
    if input_samples == 0 {
        return Ok(pcm);
    }

    let input_layout = if track.channels == 2 {
        ffmpeg::ChannelLayout::STEREO
    } else {
        ffmpeg::ChannelLayout::default(track.channels as i32)
    };
    let input_format = ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed);

    let mut resampler = ffmpeg::software::resampling::Context::get(
        input_format,
        input_layout,
        track.sample_rate,
        target_format,
        ffmpeg::ChannelLayout::STEREO,
        target_rate,
    )
    .map_err(|e| ExportError::encoder_init(format!("Failed to create audio resampler: {}", e)))?;

    let mut input = ffmpeg::frame::Audio::new(input_format, input_samples, input_layout);
    input.set_rate(track.sample_rate);
    {
        let dst = input.data_mut(0);
        for (bytes, sample) in dst.chunks_exact_mut(4).zip(&track.samples) {
            bytes.copy_from_slice(&sample.to_ne_bytes());
        }
    }

    let capacity = (input_samples as u64 * u64::from(target_rate) / u64::from(track.sample_rate.max(1))) as usize + 256;
    let mut output = ffmpeg::frame::Audio::new(target_format, capacity, ffmpeg::ChannelLayout::STEREO);
    output.set_rate(target_rate);
    resampler
        .run(&input, &mut output)
        .map_err(|e| ExportError::encoder_write(format!("Audio resample failed: {}", e)))?;
    append_planes(&output, &mut pcm);

    // 리샘플러 지연분
    for _ in 0..8 {
        let mut tail = ffmpeg::frame::Audio::new(target_format, 4096, ffmpeg::ChannelLayout::STEREO);
        tail.set_rate(target_rate);
        match resampler.flush(&mut tail) {
            Ok(_) if tail.samples() > 0 => append_planes(&tail, &mut pcm),
            _ => break,
        }
    }

    Ok(pcm)
}

fn append_planes(frame: &ffmpeg::frame::Audio, pcm: &mut PcmPlanes) {
    let len = frame.samples() * pcm.stride;
    if len == 0 {
        return;
    }
    for (plane, buf) in pcm.planes.iter_mut().enumerate() {
        let data = frame.data(plane);
        buf.extend_from_slice(&data[..len.min(data.len())]);
    }
    pcm.samples += frame.samples();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FrameRequest, FrameSize};

    fn gray_frame(index: u64, size: FrameSize, fps: u32) -> FilteredFrame {
        FilteredFrame {
            request: FrameRequest::new(index, fps),
            size,
            data: vec![128; size.rgba_len()],
        }
    }

    #[test]
    fn test_video_options_by_codec() {
        let (_, vp9_rate) = video_options("libvpx-vp9", 960 * 540);
        assert_eq!(vp9_rate, 0);
        let (_, x264_rate) = video_options("libx264", 960 * 540);
        assert_eq!(x264_rate, 0);
        let (_, mpeg4_rate) = video_options("mpeg4", 960 * 540);
        assert!(mpeg4_rate > 0);
    }

    #[test]
    fn test_candidate_order_prefers_external_libraries() {
        assert!(matches!(
            video_candidates(OutputFormat::Webm)[0],
            CodecCandidate::Name("libvpx-vp9")
        ));
        assert!(matches!(
            audio_candidates(OutputFormat::Webm)[0],
            CodecCandidate::Name("libopus")
        ));
        assert!(matches!(
            audio_candidates(OutputFormat::Mp4)[0],
            CodecCandidate::Id(codec::Id::AAC)
        ));
    }

    #[test]
    #[ignore] // FFmpeg 인코더 필요
    fn test_webm_with_audio_produces_container() {
        let size = FrameSize::new(64, 36);
        let params = StreamParams {
            format: OutputFormat::Webm,
            size,
            fps: 10,
        };
        let mut encoder = FfmpegBackend.start(&params).unwrap();
        for i in 0..10 {
            encoder.push_video_frame(&gray_frame(i, size, 10)).unwrap();
        }
        encoder
            .attach_audio(AudioTrack::new(vec![0.0; 48000 * 2], 48000, 2))
            .unwrap();
        let output = encoder.finish().unwrap();
        assert_eq!(output.mime_type, "video/webm");
        // EBML magic
        assert_eq!(&output.bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
    }

    #[test]
    #[ignore] // FFmpeg 인코더 필요
    fn test_mp4_rejects_out_of_order_frames() {
        let size = FrameSize::new(64, 36);
        let params = StreamParams {
            format: OutputFormat::Mp4,
            size,
            fps: 30,
        };
        let mut encoder = FfmpegBackend.start(&params).unwrap();
        encoder.push_video_frame(&gray_frame(3, size, 30)).unwrap();
        assert!(encoder.push_video_frame(&gray_frame(2, size, 30)).is_err());
        let output = encoder.finish().unwrap();
        assert_eq!(output.mime_type, "video/mp4");
        assert!(output.bytes.windows(4).any(|w| w == b"ftyp"));
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let params = StreamParams {
            format: OutputFormat::Webm,
            size: FrameSize::new(63, 36),
            fps: 30,
        };
        let err = FfmpegEncoder::new(&params).err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::EncoderInit);
    }
}
