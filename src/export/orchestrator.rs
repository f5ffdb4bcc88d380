// Export 오케스트레이터 - 샘플링 → 필터 → 인코딩 전체 흐름
// 아키텍처:
// - 프레임 i+1 디코딩과 프레임 i 필터링을 겹침 (파이프라인 깊이 2, FIFO 순서 유지)
// - 오디오 추출은 작업 시작과 함께 별도 스레드에서 병렬 진행, Finalizing 직전에 합류
// - 취소는 매 프레임 반복 시작 시 확인

use super::state::{ExportState, ExportStatus};
use crate::audio::AudioExtractor;
use crate::cancel::CancellationToken;
use crate::config::{ExportConfig, ExportOptions};
use crate::encoding::{EncoderBackend, StreamEncoder, StreamParams};
use crate::error::{ExportError, ExportResult};
use crate::filter::FilterWorker;
use crate::media::{FrameSize, SourceMedia};
use crate::sampling::{total_frames, FrameSampler};
use std::time::Instant;

/// 루프 중 진행률 상한 — 정확히 100은 Complete에서만
const MAX_LOOP_PROGRESS: f64 = 99.0;

/// 진행률 이벤트
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    pub status: ExportStatus,
    /// 0.0 ~ 100.0
    pub progress: f64,
    /// 인코딩되었거나 건너뛴 프레임 수
    pub frames_processed: u64,
    pub total_frames: u64,
}

pub type ProgressCallback = Box<dyn FnMut(&ExportProgress) + Send>;

/// 완성된 결과물
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub frames_encoded: u64,
    pub frames_skipped: u64,
    pub has_audio: bool,
}

/// 작업 종료 결과
#[derive(Debug)]
pub enum ExportOutcome {
    Complete(ExportArtifact),
    Cancelled,
    Failed(ExportError),
}

impl ExportOutcome {
    pub fn status(&self) -> ExportStatus {
        match self {
            ExportOutcome::Complete(_) => ExportStatus::Complete,
            ExportOutcome::Cancelled => ExportStatus::Cancelled,
            ExportOutcome::Failed(_) => ExportStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&ExportError> {
        match self {
            ExportOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_artifact(self) -> Option<ExportArtifact> {
        match self {
            ExportOutcome::Complete(artifact) => Some(artifact),
            _ => None,
        }
    }
}

/// 작업 하나의 모든 상태를 소유하는 오케스트레이터 (전역 상태 없음)
pub struct ExportOrchestrator {
    config: ExportConfig,
    options: ExportOptions,
    backend: Box<dyn EncoderBackend>,
    cancel: CancellationToken,
    state: ExportState,
    on_progress: Option<ProgressCallback>,
    total_frames: u64,
    frames_processed: u64,
    frames_encoded: u64,
    frames_skipped: u64,
    last_encoded: Option<u64>,
}

impl ExportOrchestrator {
    /// 설정 검증 후 생성 (Idle)
    pub fn new(config: ExportConfig, backend: Box<dyn EncoderBackend>) -> ExportResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            options: ExportOptions::default(),
            backend,
            cancel: CancellationToken::new(),
            state: ExportState::new(),
            on_progress: None,
            total_frames: 0,
            frames_processed: 0,
            frames_encoded: 0,
            frames_skipped: 0,
            last_encoded: None,
        })
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// 외부 취소 토큰 공유
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// 현재 상태 (읽기 전용)
    pub fn state(&self) -> &ExportState {
        &self.state
    }

    /// 소스 핸들로 export 실행 (소스는 종료 시 해제)
    pub fn run(&mut self, mut source: Box<dyn SourceMedia>) -> ExportOutcome {
        if self.state.status() != ExportStatus::Idle {
            return ExportOutcome::Failed(ExportError::invalid_config(
                "ExportOrchestrator can only run once",
            ));
        }

        let started = Instant::now();
        let result = self.execute(source.as_mut());
        // 디코더 핸들 해제 후 종료 상태 전이
        drop(source);
        self.conclude(result, started)
    }

    /// 소스를 열기 전에 실패한 작업 종료
    pub fn abort(&mut self, error: ExportError) -> ExportOutcome {
        self.conclude(Err(error), Instant::now())
    }

    fn conclude(&mut self, result: ExportResult<ExportArtifact>, started: Instant) -> ExportOutcome {
        let outcome = match result {
            Ok(artifact) => {
                self.state.complete();
                log::info!(
                    "[EXPORT] 완료: {} ({} bytes, {}x{}, {} frames, {} skipped, audio={}) in {:.1}s",
                    artifact.file_name,
                    artifact.bytes.len(),
                    artifact.width,
                    artifact.height,
                    artifact.frames_encoded,
                    artifact.frames_skipped,
                    artifact.has_audio,
                    started.elapsed().as_secs_f64()
                );
                ExportOutcome::Complete(artifact)
            }
            Err(ExportError::Cancelled) => {
                self.state.cancel();
                log::info!(
                    "[EXPORT] 취소됨 (frame {}/{})",
                    self.frames_processed,
                    self.total_frames
                );
                ExportOutcome::Cancelled
            }
            Err(e) => {
                self.state.fail(&e);
                log::error!("[EXPORT] 실패 [{}]: {}", e.kind(), e);
                ExportOutcome::Failed(e)
            }
        };
        self.emit();
        outcome
    }

    fn check_cancelled(&self) -> ExportResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }

    fn emit(&mut self) {
        let event = ExportProgress {
            status: self.state.status(),
            progress: self.state.progress(),
            frames_processed: self.frames_processed,
            total_frames: self.total_frames,
        };
        if let Some(callback) = self.on_progress.as_mut() {
            callback(&event);
        }
    }

    /// 프레임 index 처리 완료 → 진행률 = (i+1)/total × 100 (루프 중 99 상한)
    fn advance(&mut self, index: u64) {
        self.frames_processed += 1;
        let pct = ((index + 1) as f64 / self.total_frames as f64 * 100.0).min(MAX_LOOP_PROGRESS);
        self.state.set_progress(pct);
        self.emit();

        if self.options.log_every_frames > 0 && self.frames_processed % self.options.log_every_frames == 0 {
            log::info!(
                "[EXPORT] 진행: {}/{} ({:.0}%)",
                self.frames_processed,
                self.total_frames,
                self.state.progress()
            );
        }
    }

    /// 필터 중인 프레임 수신 → 인코더로 push
    fn complete_frame(
        &mut self,
        worker: &mut FilterWorker,
        encoder: &mut dyn StreamEncoder,
    ) -> ExportResult<()> {
        let filtered = worker.receive()?;
        let index = filtered.index();

        self.state.transition(ExportStatus::Encoding);
        encoder.push_video_frame(&filtered)?;
        self.frames_encoded += 1;
        self.last_encoded = Some(index);
        log::debug!("[EXPORT] frame {} 인코딩", index);

        self.advance(index);
        self.state.transition(ExportStatus::Sampling);
        Ok(())
    }

    fn execute(&mut self, source: &mut dyn SourceMedia) -> ExportResult<ExportArtifact> {
        self.check_cancelled()?;

        let info = source.info();
        let (width, height) = self.config.resolution.output_size(info.aspect_ratio());
        let size = FrameSize::new(width, height);
        let fps = self.config.fps;
        let filter = self.config.filter;

        self.total_frames = total_frames(info.duration_secs, fps);
        if self.total_frames == 0 {
            return Err(ExportError::empty_output(format!(
                "Source duration {:.3}s yields no frames",
                info.duration_secs
            )));
        }

        log::info!(
            "[EXPORT] 시작: {} → {}x{} @ {}fps, filter={}, 총 {} 프레임 (원본 {}x{}, {:.3}s, audio={})",
            self.config.format,
            width,
            height,
            fps,
            filter,
            self.total_frames,
            info.width,
            info.height,
            info.duration_secs,
            info.has_audio
        );

        self.state.transition(ExportStatus::Sampling);
        self.emit();

        let mut encoder = self.backend.start(&StreamParams {
            format: self.config.format,
            size,
            fps,
        })?;
        let pending_audio = AudioExtractor::spawn(&*source, &self.cancel);
        let mut worker = FilterWorker::spawn(self.options.frame_timeout)?;
        let mut sampler = FrameSampler::new(source, fps, info.duration_secs, size);

        loop {
            self.check_cancelled()?;

            let Some(item) = sampler.next() else {
                break;
            };

            match item {
                Ok(frame) => {
                    // 이전 프레임 필터 결과를 먼저 인코딩 (순서 유지)
                    if worker.is_busy() {
                        self.complete_frame(&mut worker, encoder.as_mut())?;
                    }
                    worker.submit(frame, filter)?;
                }
                Err(e) => {
                    // Seek만 프레임 단위로 복구 가능
                    let index = match &e {
                        ExportError::Seek { index, .. } => *index,
                        _ => return Err(e),
                    };
                    // 첫 프레임 실패 = 사용할 수 있는 소스 없음
                    if index == 0 {
                        return Err(e);
                    }
                    if worker.is_busy() {
                        self.complete_frame(&mut worker, encoder.as_mut())?;
                    }
                    log::warn!("[EXPORT] 프레임 건너뜀: {}", e);
                    self.frames_skipped += 1;
                    self.advance(index);
                }
            }
        }

        if worker.is_busy() {
            self.complete_frame(&mut worker, encoder.as_mut())?;
        }
        let exhausted = sampler.is_exhausted();
        drop(sampler);
        worker.shutdown();

        let Some(last_index) = self.last_encoded else {
            return Err(ExportError::empty_output(format!(
                "None of {} frame requests produced a frame",
                self.total_frames
            )));
        };
        if exhausted {
            log::info!(
                "[EXPORT] 소스가 먼저 끝남: {}/{} 프레임 처리",
                self.frames_processed,
                self.total_frames
            );
        }

        self.check_cancelled()?;
        self.state.transition(ExportStatus::Finalizing);
        self.emit();

        // 오디오: 비디오 타임라인 길이에 맞춤 (마지막 프레임 표시 종료 시각)
        let mut has_audio = false;
        if let Some(mut track) = pending_audio.wait() {
            let video_secs = (last_index + 1) as f64 / fps as f64;
            track.align_to(video_secs);
            if !track.is_empty() {
                encoder.attach_audio(track)?;
                has_audio = true;
            }
        }

        self.check_cancelled()?;
        let output = encoder.finish()?;

        Ok(ExportArtifact {
            bytes: output.bytes,
            mime_type: output.mime_type,
            file_name: self.config.suggested_filename(),
            width,
            height,
            frames_encoded: self.frames_encoded,
            frames_skipped: self.frames_skipped,
            has_audio,
        })
    }
}
