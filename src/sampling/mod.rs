// 프레임 샘플링 - 합성 fps 기준 timestamp로 소스를 seek하여 RGBA 프레임 추출
// 요청 i → timestamp = i / fps, 총 요청 수 = ceil(duration × fps)

use crate::error::{ExportError, ExportResult};
use crate::media::{DecodeOutcome, FrameRequest, FrameSize, RawFrame, SourceMedia};

/// 총 프레임 수 = ceil(duration × fps)
/// duration ≤ 0 이면 0
pub fn total_frames(duration_secs: f64, fps: u32) -> u64 {
    if !(duration_secs > 0.0) || fps == 0 {
        return 0;
    }
    let exact = duration_secs * fps as f64;
    // 부동소수점 오차로 300.0000001 → 301 이 되는 것 방지
    let rounded = exact.round();
    if (exact - rounded).abs() < 1e-9 {
        rounded as u64
    } else {
        exact.ceil() as u64
    }
}

/// 프레임 요청 목록 (timestamp가 duration을 넘는 요청은 만들지 않음)
pub fn frame_requests(duration_secs: f64, fps: u32) -> impl Iterator<Item = FrameRequest> {
    (0..total_frames(duration_secs, fps))
        .map(move |i| FrameRequest::new(i, fps))
        .filter(move |req| req.timestamp <= duration_secs)
}

/// 샘플러 아이템: 정상 프레임 또는 이 요청만 실패 (SeekError)
pub type SampledFrame = ExportResult<RawFrame>;

/// 소스에서 요청 순서대로 프레임을 뽑는 지연 시퀀스
///
/// - 각 next()가 소스 디코더를 seek하므로 한 번 소비하면 재시작 불가
/// - 소스 끝(EndOfStream)에서 시퀀스 조기 종료 (에러 아님)
/// - 특정 timestamp 실패는 `Err(Seek)` 아이템으로 보고하고 다음 요청 계속
pub struct FrameSampler<'a> {
    source: &'a mut dyn SourceMedia,
    requests: Box<dyn Iterator<Item = FrameRequest> + 'a>,
    size: FrameSize,
    total: u64,
    exhausted: bool,
    frames_sampled: u64,
}

impl<'a> FrameSampler<'a> {
    pub fn new(source: &'a mut dyn SourceMedia, fps: u32, duration_secs: f64, size: FrameSize) -> Self {
        Self {
            source,
            requests: Box::new(frame_requests(duration_secs, fps)),
            size,
            total: total_frames(duration_secs, fps),
            exhausted: false,
            frames_sampled: 0,
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    /// 소스가 요청보다 먼저 끝났는지
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled
    }

    fn sample(&mut self, request: FrameRequest) -> Option<SampledFrame> {
        match self.source.decode_frame_at(request.timestamp, self.size) {
            Ok(DecodeOutcome::Frame(data)) => {
                let frame = RawFrame::new(request, self.size, data).map_err(|e| {
                    ExportError::seek(request.index, request.timestamp, e.to_string())
                });
                if frame.is_ok() {
                    self.frames_sampled += 1;
                }
                Some(frame)
            }
            Ok(DecodeOutcome::Skipped(reason)) => Some(Err(ExportError::seek(
                request.index,
                request.timestamp,
                reason,
            ))),
            Ok(DecodeOutcome::EndOfStream) => {
                log::info!(
                    "[SAMPLER] 소스 끝 도달: frame {} ({:.3}s), {}/{} 프레임 샘플링",
                    request.index,
                    request.timestamp,
                    self.frames_sampled,
                    self.total
                );
                self.exhausted = true;
                None
            }
            Err(e) => Some(Err(ExportError::seek(
                request.index,
                request.timestamp,
                e.to_string(),
            ))),
        }
    }
}

impl Iterator for FrameSampler<'_> {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let request = self.requests.next()?;
        self.sample(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::SyntheticSource;

    #[test]
    fn test_total_frames_ceil() {
        assert_eq!(total_frames(10.0, 30), 300);
        assert_eq!(total_frames(10.01, 30), 301);
        assert_eq!(total_frames(0.5, 60), 30);
        assert_eq!(total_frames(1.0 / 3.0, 30), 10);
        assert_eq!(total_frames(2.0001, 120), 241);
        assert_eq!(total_frames(0.0, 30), 0);
        assert_eq!(total_frames(-1.0, 30), 0);
        assert_eq!(total_frames(f64::NAN, 30), 0);
    }

    #[test]
    fn test_requests_within_duration() {
        for &fps in &[24u32, 30, 60, 120] {
            for &duration in &[0.1, 1.0, 2.5, 7.77, 10.0] {
                let total = total_frames(duration, fps);
                let requests: Vec<_> = frame_requests(duration, fps).collect();
                assert_eq!(requests.len() as u64, total, "fps={} duration={}", fps, duration);
                assert!(requests.iter().all(|r| r.timestamp <= duration));
                assert!(requests.windows(2).all(|w| w[0].index < w[1].index));
            }
        }
    }

    #[test]
    fn test_sampler_yields_every_request() {
        let mut source = SyntheticSource::new(2.0, 64, 36);
        let size = FrameSize::new(32, 18);
        let sampler = FrameSampler::new(&mut source, 30, 2.0, size);
        assert_eq!(sampler.total_frames(), 60);

        let frames: Vec<_> = sampler.map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 60);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i as u64);
            assert_eq!(frame.size, size);
        }
        assert_eq!(source.seek_log().len(), 60);
        assert!((source.seek_log()[45] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_sampler_terminates_early_at_end_of_stream() {
        // 메타데이터는 2초지만 실제 디코딩 가능한 구간은 1초
        let mut source = SyntheticSource::new(2.0, 16, 16).with_decodable_until(1.0);
        let mut sampler = FrameSampler::new(&mut source, 10, 2.0, FrameSize::new(16, 16));
        let count = sampler.by_ref().filter(|f| f.is_ok()).count();
        assert_eq!(count, 11); // 0.0 ~ 1.0
        assert!(sampler.is_exhausted());
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_sampler_reports_isolated_failure_and_continues() {
        let mut source = SyntheticSource::new(1.0, 16, 16).with_corrupt_timestamps(&[0.3]);
        let sampler = FrameSampler::new(&mut source, 10, 1.0, FrameSize::new(16, 16));
        let results: Vec<_> = sampler.collect();
        assert_eq!(results.len(), 10);
        let err = results[3].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Seek);
        assert!(results[4].is_ok());
    }
}
