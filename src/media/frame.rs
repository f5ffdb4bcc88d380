// 파이프라인 프레임 타입
// RawFrame(디코딩 결과) → FilteredFrame(필터 적용) 순서로 소유권 이동

use crate::error::{ExportError, ExportResult};

/// RGBA8 바이트 수
pub const BYTES_PER_PIXEL: usize = 4;

/// 프레임 요청 (index, timestamp = index / fps)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRequest {
    pub index: u64,
    pub timestamp: f64,
}

impl FrameRequest {
    pub fn new(index: u64, fps: u32) -> Self {
        Self {
            index,
            timestamp: index as f64 / fps as f64,
        }
    }
}

/// 프레임 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// RGBA 버퍼 크기 (width * height * 4)
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// 디코딩된 RGBA 프레임 (un-premultiplied)
#[derive(Debug)]
pub struct RawFrame {
    pub request: FrameRequest,
    pub size: FrameSize,
    pub data: Vec<u8>,
}

impl RawFrame {
    /// 버퍼 길이 검증 후 생성
    pub fn new(request: FrameRequest, size: FrameSize, data: Vec<u8>) -> ExportResult<Self> {
        if data.len() != size.rgba_len() {
            return Err(ExportError::filter(format!(
                "Invalid frame data size: got {}, expected {} ({}x{}x4)",
                data.len(),
                size.rgba_len(),
                size.width,
                size.height
            )));
        }
        Ok(Self { request, size, data })
    }

    pub fn index(&self) -> u64 {
        self.request.index
    }
}

/// 필터 적용된 프레임 (RawFrame 버퍼를 그대로 재사용할 수 있음)
#[derive(Debug)]
pub struct FilteredFrame {
    pub request: FrameRequest,
    pub size: FrameSize,
    pub data: Vec<u8>,
}

impl FilteredFrame {
    pub fn index(&self) -> u64 {
        self.request.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timestamp() {
        let req = FrameRequest::new(45, 30);
        assert_eq!(req.index, 45);
        assert!((req.timestamp - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_raw_frame_rejects_wrong_length() {
        let size = FrameSize::new(4, 2);
        assert_eq!(size.rgba_len(), 32);
        assert!(RawFrame::new(FrameRequest::new(0, 30), size, vec![0; 31]).is_err());
        assert!(RawFrame::new(FrameRequest::new(0, 30), size, vec![0; 32]).is_ok());
    }
}
