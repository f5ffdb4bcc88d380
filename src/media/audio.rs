// PCM 오디오 트랙 (f32 interleaved)
// 비디오 타임라인 길이에 맞춰 자르거나 무음 패딩

/// 디코딩된 오디오 트랙
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// f32 interleaved 샘플
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// 채널당 샘플 수
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// 길이 (초)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// 비디오 길이에 정렬: 초과분은 잘라내고 부족분은 무음(0.0)으로 채움
    /// 결과 길이는 샘플 하나 이내로 duration_secs와 일치
    pub fn align_to(&mut self, duration_secs: f64) {
        let target_frames = (duration_secs.max(0.0) * self.sample_rate as f64).round() as usize;
        self.samples
            .resize(target_frames * self.channels as usize, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let track = AudioTrack::new(vec![0.0; 48000 * 2], 48000, 2);
        assert_eq!(track.frame_count(), 48000);
        assert!((track.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_align_truncates_and_pads() {
        let mut track = AudioTrack::new(vec![0.5; 48000 * 2 * 3], 48000, 2);
        track.align_to(2.0);
        assert_eq!(track.frame_count(), 96000);

        track.align_to(2.5);
        assert_eq!(track.frame_count(), 120000);
        // 패딩 구간은 무음
        assert_eq!(*track.samples.last().unwrap(), 0.0);
        assert_eq!(track.samples[0], 0.5);
    }
}
