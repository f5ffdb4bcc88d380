// FFI 공통 타입 - C 호스트에 돌려주는 정수 코드

use crate::error::ErrorKind;

/// FFI 함수 반환 코드 (0 = 성공, 음수 = 실패)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = -1,
    InvalidParam = -2,
    /// 작업이 아직 끝나지 않음
    NotReady = -3,
    /// 결과물이 없음 (실패/취소/이미 꺼냄)
    NoOutput = -4,
    Unknown = -99,
}

/// 작업 실패 종류 → FFI 코드 (exporter_get_error_kind)
pub fn error_kind_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::SourceDecode => 1,
        ErrorKind::Seek => 2,
        ErrorKind::AudioUnavailable => 3,
        ErrorKind::Filter => 4,
        ErrorKind::EncoderInit => 5,
        ErrorKind::EncoderWrite => 6,
        ErrorKind::CancelledByCaller => 7,
        ErrorKind::EmptyOutput => 8,
        ErrorKind::InvalidConfig => 9,
        ErrorKind::Timeout => 10,
    }
}
