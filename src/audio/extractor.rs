// 오디오 추출 - 비디오 샘플링과 병렬로 전체 PCM 디코딩
// 실패(스트림 없음/코덱 미지원/디코딩 에러)는 치명적이지 않음 → 비디오만 출력

use crate::cancel::CancellationToken;
use crate::error::{ExportError, ExportResult};
use crate::media::{AudioSource, AudioTrack, SourceMedia};
use std::thread::JoinHandle;

/// 소스 오디오 → Option<AudioTrack>
pub struct AudioExtractor;

impl AudioExtractor {
    /// 백그라운드 스레드에서 추출 시작
    /// 결과는 `PendingAudio::wait()`로 받는다 (Finalizing 직전)
    /// `cancel`(작업 토큰)이 취소되면 추출 스레드도 패킷 확인 간격 안에 멈춘다
    pub fn spawn(source: &dyn SourceMedia, cancel: &CancellationToken) -> PendingAudio {
        let Some(mut audio) = Self::open(source) else {
            return PendingAudio::absent();
        };

        let cancel = cancel.child_token();
        let thread_cancel = cancel.clone();
        let spawned = std::thread::Builder::new()
            .name("audio-extract".into())
            .spawn(move || audio.decode_all(&thread_cancel));

        match spawned {
            Ok(handle) => PendingAudio {
                handle: Some(handle),
                cancel,
            },
            Err(e) => {
                log::warn!("[AUDIO] 추출 스레드 생성 실패, 비디오만 출력: {}", e);
                PendingAudio::absent()
            }
        }
    }

    fn open(source: &dyn SourceMedia) -> Option<Box<dyn AudioSource>> {
        match source.open_audio() {
            Ok(Some(audio)) => Some(audio),
            Ok(None) => {
                log::info!("[AUDIO] 오디오 스트림 없음, 비디오만 출력");
                None
            }
            Err(e) => {
                log::warn!("[AUDIO] {} - 비디오만 출력", e);
                None
            }
        }
    }
}

/// 진행 중인 오디오 추출
///
/// `wait()` 없이 drop되면 추출 스레드에 취소를 알리고 종료까지 join한다
/// (디코더 핸들과 임시 파일 참조가 작업 종료 전에 해제되도록).
pub struct PendingAudio {
    handle: Option<JoinHandle<ExportResult<AudioTrack>>>,
    cancel: CancellationToken,
}

impl PendingAudio {
    /// 오디오 없음
    pub fn absent() -> Self {
        Self {
            handle: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.handle.is_none()
    }

    /// 추출 완료까지 대기
    pub fn wait(mut self) -> Option<AudioTrack> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(result) => finish_extraction(result),
            Err(_) => {
                log::warn!(
                    "[AUDIO] {} - 비디오만 출력",
                    ExportError::audio_unavailable("audio extraction thread panicked")
                );
                None
            }
        }
    }
}

impl Drop for PendingAudio {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            if handle.join().is_err() {
                log::warn!("[AUDIO] 추출 스레드 panic (취소 중)");
            }
            log::debug!("[AUDIO] 추출 스레드 종료 (취소)");
        }
    }
}

fn finish_extraction(result: ExportResult<AudioTrack>) -> Option<AudioTrack> {
    match result {
        Ok(track) if track.is_empty() => {
            log::warn!("[AUDIO] 디코딩된 샘플 없음, 비디오만 출력");
            None
        }
        Ok(track) => {
            log::info!(
                "[AUDIO] 추출 완료: {:.3}s, {}Hz, {}ch",
                track.duration_secs(),
                track.sample_rate,
                track.channels
            );
            Some(track)
        }
        Err(ExportError::Cancelled) => None,
        Err(e) => {
            log::warn!("[AUDIO] {} - 비디오만 출력", e);
            None
        }
    }
}
