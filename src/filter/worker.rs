//! FilterWorker - 픽셀 필터 전용 백그라운드 스레드
//!
//! 아키텍처:
//! - 오케스트레이터 ↔ 워커: 요청/응답 rendezvous 채널 (용량 1)
//! - 동시에 최대 1개 요청만 처리 중 (submit 후 receive 전에는 다음 submit 불가)
//! - 워커 내부에서는 rayon으로 픽셀 병렬 처리
//! - receive는 프레임당 데드라인을 가짐 (무한 대기 대신 Timeout 에러)

use crate::config::FilterKind;
use crate::error::{ExportError, ExportResult};
use crate::filter::kernel;
use crate::media::{FilteredFrame, RawFrame};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct FilterRequest {
    frame: RawFrame,
    filter: FilterKind,
}

type FilterResponse = ExportResult<FilteredFrame>;

/// 필터 워커 핸들
pub struct FilterWorker {
    request_tx: Option<SyncSender<FilterRequest>>,
    response_rx: Receiver<FilterResponse>,
    handle: Option<JoinHandle<()>>,
    /// 처리 중인 요청의 프레임 index
    in_flight: Option<u64>,
    timeout: Duration,
    /// 데드라인 초과 후에는 스레드가 멈춰 있을 수 있으므로 join하지 않음
    timed_out: bool,
    frames_filtered: u64,
}

impl FilterWorker {
    /// 워커 스레드 시작
    pub fn spawn(timeout: Duration) -> ExportResult<Self> {
        let (request_tx, request_rx) = mpsc::sync_channel::<FilterRequest>(1);
        let (response_tx, response_rx) = mpsc::sync_channel::<FilterResponse>(1);

        let handle = thread::Builder::new()
            .name("filter-worker".to_string())
            .spawn(move || Self::worker_loop(request_rx, response_tx))
            .map_err(|e| ExportError::filter(format!("Failed to spawn filter worker: {}", e)))?;

        log::debug!("[FILTER] 워커 시작 (timeout={:?})", timeout);

        Ok(Self {
            request_tx: Some(request_tx),
            response_rx,
            handle: Some(handle),
            in_flight: None,
            timeout,
            timed_out: false,
            frames_filtered: 0,
        })
    }

    /// 워커 루프: 요청 채널이 닫히면 종료
    fn worker_loop(requests: Receiver<FilterRequest>, responses: SyncSender<FilterResponse>) {
        while let Ok(FilterRequest { frame, filter }) = requests.recv() {
            let RawFrame { request, size, mut data } = frame;
            let result = kernel::apply_frame(filter, &mut data).map(|()| FilteredFrame {
                request,
                size,
                data,
            });
            if responses.send(result).is_err() {
                // 오케스트레이터가 사라짐
                break;
            }
        }
    }

    /// 프레임 제출 (이전 요청의 receive 전이면 에러)
    pub fn submit(&mut self, frame: RawFrame, filter: FilterKind) -> ExportResult<()> {
        if let Some(pending) = self.in_flight {
            return Err(ExportError::filter(format!(
                "Frame {} submitted while frame {} is still in flight",
                frame.index(),
                pending
            )));
        }

        let tx = self
            .request_tx
            .as_ref()
            .ok_or_else(|| ExportError::filter("Filter worker already shut down"))?;

        let index = frame.index();
        tx.send(FilterRequest { frame, filter })
            .map_err(|_| ExportError::filter("Filter worker terminated unexpectedly"))?;
        self.in_flight = Some(index);
        Ok(())
    }

    /// 처리 중인 요청의 결과 대기 (데드라인 적용)
    pub fn receive(&mut self) -> ExportResult<FilteredFrame> {
        let index = self
            .in_flight
            .ok_or_else(|| ExportError::filter("No frame in flight"))?;

        let started = Instant::now();
        let response = match self.response_rx.recv_timeout(self.timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => {
                self.timed_out = true;
                return Err(ExportError::timeout(format!(
                    "Filter worker did not answer frame {} within {:?}",
                    index, self.timeout
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ExportError::filter("Filter worker terminated unexpectedly"));
            }
        };
        self.in_flight = None;

        let frame = response?;
        if frame.index() != index {
            return Err(ExportError::filter(format!(
                "Filter worker answered frame {} for request {}",
                frame.index(),
                index
            )));
        }

        self.frames_filtered += 1;
        log::trace!("[FILTER] frame {} ({}ms)", index, started.elapsed().as_millis());
        Ok(frame)
    }

    /// submit + receive (단일 왕복)
    pub fn apply(&mut self, frame: RawFrame, filter: FilterKind) -> ExportResult<FilteredFrame> {
        self.submit(frame, filter)?;
        self.receive()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn frames_filtered(&self) -> u64 {
        self.frames_filtered
    }

    /// 워커 종료 (요청 채널 닫기 → 스레드 join)
    pub fn shutdown(&mut self) {
        // 송신자 drop → worker_loop의 recv()가 Err → 루프 종료
        self.request_tx.take();

        if let Some(handle) = self.handle.take() {
            if self.timed_out {
                log::warn!("[FILTER] 응답 없는 워커 스레드를 join 없이 분리");
                return;
            }
            // 처리 중이던 응답을 비워야 워커가 send에서 막히지 않음
            while self.response_rx.try_recv().is_ok() {}
            let _ = handle.join();
            log::debug!("[FILTER] 워커 종료 ({} frames)", self.frames_filtered);
        }
    }
}

impl Drop for FilterWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
