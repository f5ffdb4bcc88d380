// Exporter FFI - C 호스트 연동
// Export 작업 생성/진행률/상태/결과물/취소/파괴

use crate::config::ExportConfig;
use crate::config::ExportOptions;
use crate::export::ExportJob;
use crate::ffi::types::{error_kind_code, ErrorCode};
use std::ffi::{c_char, c_void, CStr, CString};

/// null이면 None, UTF-8이 아니면 Err
unsafe fn optional_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, ErrorCode> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(Some)
        .map_err(|_| ErrorCode::InvalidParam)
}

fn into_c_string(value: String) -> *mut c_char {
    match CString::new(value) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Export 시작 (백그라운드 스레드에서 실행)
/// input_data/input_len: 컨테이너 바이트 (함수 반환 전에 복사됨)
/// filter/resolution/format: UTF-8 이름, null이면 기본값 (none / 720p / webm)
/// fps: 0이면 기본값 (30)
/// out_job: ExportJob 핸들 반환 (exporter_destroy로 해제)
#[no_mangle]
pub extern "C" fn exporter_start(
    input_data: *const u8,
    input_len: libc::size_t,
    filter: *const c_char,
    resolution: *const c_char,
    format: *const c_char,
    fps: u32,
    out_job: *mut *mut c_void,
) -> i32 {
    if input_data.is_null() || out_job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    crate::logging::init_logging();

    unsafe {
        let (filter, resolution, format) = match (
            optional_str(filter),
            optional_str(resolution),
            optional_str(format),
        ) {
            (Ok(f), Ok(r), Ok(fmt)) => (f, r, fmt),
            _ => return ErrorCode::InvalidParam as i32,
        };

        let fps = if fps == 0 { None } else { Some(fps) };
        let config = match ExportConfig::from_options(filter, resolution, fps, format) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("[FFI] {}", e);
                return ErrorCode::InvalidParam as i32;
            }
        };

        let input = std::slice::from_raw_parts(input_data, input_len).to_vec();

        match ExportJob::start(input, config, ExportOptions::default()) {
            Ok(job) => {
                *out_job = Box::into_raw(Box::new(job)) as *mut c_void;
                ErrorCode::Success as i32
            }
            Err(e) => {
                log::error!("[FFI] Export 시작 실패: {}", e);
                ErrorCode::Unknown as i32
            }
        }
    }
}

/// Export 진행률 가져오기 (0~100)
#[no_mangle]
pub extern "C" fn exporter_get_progress(job: *mut c_void) -> u32 {
    if job.is_null() {
        return 0;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        job_ref.progress()
    }
}

/// Export 상태 코드
/// 0=Idle, 1=Sampling, 2=Encoding, 3=Finalizing, 4=Complete, 5=Failed, 6=Cancelled
#[no_mangle]
pub extern "C" fn exporter_get_status(job: *mut c_void) -> i32 {
    if job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        job_ref.status().code()
    }
}

/// Export 완료 여부 확인
/// 반환: 1=완료, 0=진행중
#[no_mangle]
pub extern "C" fn exporter_is_finished(job: *mut c_void) -> i32 {
    if job.is_null() {
        return 1; // null이면 완료로 처리
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        if job_ref.is_finished() { 1 } else { 0 }
    }
}

/// Export 에러 메시지 가져오기
/// out_error: 에러 문자열 포인터 (없으면 null)
/// 반환 후 exporter_string_free()로 해제 필요
#[no_mangle]
pub extern "C" fn exporter_get_error(job: *mut c_void, out_error: *mut *mut c_char) -> i32 {
    if job.is_null() || out_error.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        *out_error = match job_ref.error() {
            Some(msg) => into_c_string(msg),
            None => std::ptr::null_mut(),
        };
    }

    ErrorCode::Success as i32
}

/// 실패 종류 코드 (0 = 실패 아님, ffi::types::error_kind_code 참조)
#[no_mangle]
pub extern "C" fn exporter_get_error_kind(job: *mut c_void) -> i32 {
    if job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        job_ref.error_kind().map_or(0, error_kind_code)
    }
}

/// 결과물 꺼내기 (성공한 작업에서 한 번만)
/// out_data/out_len: 인코딩된 바이트 (exporter_buffer_free로 해제)
/// out_mime/out_file_name: 문자열 (exporter_string_free로 해제)
#[no_mangle]
pub extern "C" fn exporter_take_output(
    job: *mut c_void,
    out_data: *mut *mut u8,
    out_len: *mut libc::size_t,
    out_mime: *mut *mut c_char,
    out_file_name: *mut *mut c_char,
) -> i32 {
    if job.is_null()
        || out_data.is_null()
        || out_len.is_null()
        || out_mime.is_null()
        || out_file_name.is_null()
    {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        if !job_ref.is_finished() {
            return ErrorCode::NotReady as i32;
        }

        let Some(artifact) = job_ref.take_output() else {
            return ErrorCode::NoOutput as i32;
        };

        let bytes = artifact.bytes.into_boxed_slice();
        *out_len = bytes.len();
        *out_data = Box::into_raw(bytes) as *mut u8;
        *out_mime = into_c_string(artifact.mime_type.to_string());
        *out_file_name = into_c_string(artifact.file_name);
    }

    ErrorCode::Success as i32
}

/// Export 취소
#[no_mangle]
pub extern "C" fn exporter_cancel(job: *mut c_void) -> i32 {
    if job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let job_ref = &*(job as *const ExportJob);
        job_ref.cancel();
    }

    ErrorCode::Success as i32
}

/// ExportJob 파괴 (메모리 해제)
/// 진행 중이면 취소 요청 후 분리
#[no_mangle]
pub extern "C" fn exporter_destroy(job: *mut c_void) -> i32 {
    if job.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let _ = Box::from_raw(job as *mut ExportJob);
    }

    ErrorCode::Success as i32
}

/// exporter_take_output 바이트 해제
#[no_mangle]
pub extern "C" fn exporter_buffer_free(data: *mut u8, len: libc::size_t) {
    if data.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(std::ptr::slice_from_raw_parts_mut(data, len));
    }
}

/// 문자열 해제
#[no_mangle]
pub extern "C" fn exporter_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_finished(job: *mut c_void) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while exporter_is_finished(job) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_null_pointers_rejected() {
        let mut job: *mut c_void = std::ptr::null_mut();
        let data = [0u8; 4];
        assert_eq!(
            exporter_start(std::ptr::null(), 0, std::ptr::null(), std::ptr::null(), std::ptr::null(), 30, &mut job),
            ErrorCode::NullPointer as i32
        );
        assert_eq!(
            exporter_start(data.as_ptr(), data.len(), std::ptr::null(), std::ptr::null(), std::ptr::null(), 30, std::ptr::null_mut()),
            ErrorCode::NullPointer as i32
        );
        assert_eq!(exporter_get_progress(std::ptr::null_mut()), 0);
        assert_eq!(exporter_is_finished(std::ptr::null_mut()), 1);
        assert_eq!(exporter_cancel(std::ptr::null_mut()), ErrorCode::NullPointer as i32);
        assert_eq!(exporter_destroy(std::ptr::null_mut()), ErrorCode::NullPointer as i32);
        exporter_buffer_free(std::ptr::null_mut(), 0);
        exporter_string_free(std::ptr::null_mut());
    }

    #[test]
    fn test_unknown_option_is_invalid_param() {
        let mut job: *mut c_void = std::ptr::null_mut();
        let data = [0u8; 4];
        let filter = CString::new("blur").unwrap();
        let code = exporter_start(
            data.as_ptr(),
            data.len(),
            filter.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
            30,
            &mut job,
        );
        assert_eq!(code, ErrorCode::InvalidParam as i32);
        assert!(job.is_null());
    }

    #[test]
    fn test_empty_input_fails_with_source_decode() {
        let mut job: *mut c_void = std::ptr::null_mut();
        let data: [u8; 0] = [];
        let format = CString::new("mp4").unwrap();
        let code = exporter_start(
            data.as_ptr(),
            0,
            std::ptr::null(),
            std::ptr::null(),
            format.as_ptr(),
            0,
            &mut job,
        );
        assert_eq!(code, ErrorCode::Success as i32);
        wait_finished(job);

        assert_eq!(exporter_get_status(job), 5);
        assert_eq!(exporter_get_error_kind(job), 1);

        let mut message: *mut c_char = std::ptr::null_mut();
        assert_eq!(exporter_get_error(job, &mut message), ErrorCode::Success as i32);
        assert!(!message.is_null());
        exporter_string_free(message);

        let mut out_data: *mut u8 = std::ptr::null_mut();
        let mut out_len: libc::size_t = 0;
        let mut out_mime: *mut c_char = std::ptr::null_mut();
        let mut out_name: *mut c_char = std::ptr::null_mut();
        assert_eq!(
            exporter_take_output(job, &mut out_data, &mut out_len, &mut out_mime, &mut out_name),
            ErrorCode::NoOutput as i32
        );
        assert_eq!(exporter_destroy(job), ErrorCode::Success as i32);
    }
}
