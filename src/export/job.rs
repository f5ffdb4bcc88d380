// Export 작업 관리 - 백그라운드 스레드, 진행률 폴링, 취소
// ExportJob: 입력 바이트 → 컨테이너 바이트 전체 흐름을 스레드 하나에서 실행

use super::orchestrator::{ExportArtifact, ExportOrchestrator, ExportOutcome};
use super::state::ExportStatus;
use crate::cancel::CancellationToken;
use crate::config::{ExportConfig, ExportOptions};
use crate::encoding::{EncoderBackend, FfmpegBackend};
use crate::error::{ErrorKind, ExportError, ExportResult};
use crate::ffmpeg::FfmpegSource;
use crate::media::SourceMedia;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// 작업 스레드 안에서 소스를 여는 팩토리 (디코더 컨텍스트는 스레드 간 이동 불가)
pub type SourceFactory = Box<dyn FnOnce() -> ExportResult<Box<dyn SourceMedia>> + Send>;

/// 폴링으로 관찰하는 공유 상태
#[derive(Default)]
struct JobShared {
    /// 진행률 (0~100)
    progress: AtomicU32,
    finished: AtomicBool,
    status: Mutex<Option<ExportStatus>>,
    /// 실패 시 (종류, 메시지)
    error: Mutex<Option<(ErrorKind, String)>>,
    output: Mutex<Option<ExportArtifact>>,
}

/// Export 작업 핸들 (호스트에서 폴링으로 상태 확인)
pub struct ExportJob {
    shared: Arc<JobShared>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ExportJob {
    /// 컨테이너 바이트로 export 시작 (FFmpeg 디코더/인코더)
    pub fn start(input: Vec<u8>, config: ExportConfig, options: ExportOptions) -> ExportResult<Self> {
        let factory: SourceFactory = Box::new(move || {
            FfmpegSource::open(&input).map(|source| Box::new(source) as Box<dyn SourceMedia>)
        });
        Self::spawn(factory, Box::new(FfmpegBackend), config, options)
    }

    /// 임의의 소스/인코더로 export 시작
    /// 설정 오류는 스레드를 만들기 전에 반환
    pub fn spawn(
        source_factory: SourceFactory,
        backend: Box<dyn EncoderBackend>,
        config: ExportConfig,
        options: ExportOptions,
    ) -> ExportResult<Self> {
        let cancel = CancellationToken::new();
        let shared = Arc::new(JobShared::default());

        let progress_shared = Arc::clone(&shared);
        let mut orchestrator = ExportOrchestrator::new(config, backend)?
            .with_options(options)
            .with_cancellation(cancel.clone())
            .on_progress(Box::new(move |event| {
                progress_shared
                    .progress
                    .store(event.progress.floor() as u32, Ordering::SeqCst);
                if let Ok(mut status) = progress_shared.status.lock() {
                    *status = Some(event.status);
                }
            }));

        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("export-job".into())
            .spawn(move || {
                let outcome = match source_factory() {
                    Ok(source) => orchestrator.run(source),
                    Err(e) => orchestrator.abort(e),
                };
                Self::publish(&thread_shared, outcome);
            })
            .map_err(|e| ExportError::source_decode(format!("Failed to spawn export thread: {}", e)))?;

        Ok(Self {
            shared,
            cancel,
            handle: Some(handle),
        })
    }

    fn publish(shared: &JobShared, outcome: ExportOutcome) {
        match outcome {
            ExportOutcome::Complete(artifact) => {
                if let Ok(mut output) = shared.output.lock() {
                    *output = Some(artifact);
                }
            }
            ExportOutcome::Cancelled => {}
            ExportOutcome::Failed(e) => {
                if let Ok(mut error) = shared.error.lock() {
                    *error = Some((e.kind(), e.to_string()));
                }
            }
        }
        shared.finished.store(true, Ordering::SeqCst);
    }

    /// 진행률 가져오기 (0~100, 100은 성공 시에만)
    pub fn progress(&self) -> u32 {
        self.shared.progress.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ExportStatus {
        self.shared
            .status
            .lock()
            .ok()
            .and_then(|s| *s)
            .unwrap_or(ExportStatus::Idle)
    }

    /// 취소 요청 (다음 프레임 경계에서 반영)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 완료 여부 (성공/실패/취소 모두)
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// 에러 메시지 (None이면 성공, 취소 또는 진행 중)
    pub fn error(&self) -> Option<String> {
        self.shared
            .error
            .lock()
            .ok()
            .and_then(|e| e.as_ref().map(|(_, msg)| msg.clone()))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.shared
            .error
            .lock()
            .ok()
            .and_then(|e| e.as_ref().map(|(kind, _)| *kind))
    }

    /// 결과물 꺼내기 (한 번만 Some)
    pub fn take_output(&self) -> Option<ExportArtifact> {
        self.shared.output.lock().ok().and_then(|mut o| o.take())
    }

    /// 작업 스레드 종료까지 대기
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[EXPORT] 작업 스레드 panic");
                self.shared.finished.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for ExportJob {
    fn drop(&mut self) {
        // 진행 중인 작업은 취소 후 분리 (스레드는 다음 프레임 경계에서 종료)
        if !self.is_finished() {
            self.cancel();
        }
    }
}
