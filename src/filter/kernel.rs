// 픽셀 필터 커널 — RGBA 픽셀 연산
// 모든 커널은 3x3 행렬 + bias 하나로 표현, 이웃 픽셀 참조 없음 (픽셀 단위 완전 병렬)

use crate::config::FilterKind;
use crate::error::{ExportError, ExportResult};
use crate::media::BYTES_PER_PIXEL;
use rayon::prelude::*;

/// rayon 작업 단위 (픽셀 수)
const PARALLEL_CHUNK_PIXELS: usize = 16 * 1024;

/// 3x3 색 변환 행렬 + bias (0~255 정수 공간)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    pub m: [[f32; 3]; 3],
    pub bias: [f32; 3],
}

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        bias: [0.0; 3],
    };

    pub const GRAYSCALE: ColorMatrix = ColorMatrix {
        m: [
            [0.299, 0.587, 0.114],
            [0.299, 0.587, 0.114],
            [0.299, 0.587, 0.114],
        ],
        bias: [0.0; 3],
    };

    pub const INVERT: ColorMatrix = ColorMatrix {
        m: [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]],
        bias: [255.0; 3],
    };

    pub const SEPIA: ColorMatrix = ColorMatrix {
        m: [
            [0.393, 0.769, 0.189],
            [0.349, 0.686, 0.168],
            [0.272, 0.534, 0.131],
        ],
        bias: [0.0; 3],
    };

    /// 한 픽셀 변환: 반올림 후 [0,255]로 saturate, alpha 유지
    #[inline]
    pub fn transform(&self, px: [u8; 4]) -> [u8; 4] {
        let r = px[0] as f32;
        let g = px[1] as f32;
        let b = px[2] as f32;
        let mut out = [0u8; 4];
        for (c, row) in self.m.iter().enumerate() {
            let v = row[0] * r + row[1] * g + row[2] * b + self.bias[c];
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        out[3] = px[3];
        out
    }
}

/// 필터 → 행렬 매핑
pub fn matrix_for(filter: FilterKind) -> ColorMatrix {
    match filter {
        FilterKind::None => ColorMatrix::IDENTITY,
        FilterKind::Grayscale => ColorMatrix::GRAYSCALE,
        FilterKind::Invert => ColorMatrix::INVERT,
        FilterKind::Sepia => ColorMatrix::SEPIA,
    }
}

/// 단일 픽셀 적용
pub fn apply_pixel(filter: FilterKind, px: [u8; 4]) -> [u8; 4] {
    match filter {
        FilterKind::None => px,
        // 정수 연산으로 정확한 역변환 보장
        FilterKind::Invert => [255 - px[0], 255 - px[1], 255 - px[2], px[3]],
        _ => matrix_for(filter).transform(px),
    }
}

/// RGBA 버퍼 전체에 in-place 적용 (rayon 병렬)
/// 버퍼 길이가 4의 배수가 아니면 FilterError
pub fn apply_frame(filter: FilterKind, rgba: &mut [u8]) -> ExportResult<()> {
    if rgba.len() % BYTES_PER_PIXEL != 0 {
        return Err(ExportError::filter(format!(
            "RGBA buffer length {} is not a multiple of {}",
            rgba.len(),
            BYTES_PER_PIXEL
        )));
    }

    if filter == FilterKind::None {
        return Ok(());
    }

    rgba.par_chunks_mut(PARALLEL_CHUNK_PIXELS * BYTES_PER_PIXEL)
        .for_each(|chunk| {
            for px in chunk.chunks_exact_mut(BYTES_PER_PIXEL) {
                let out = apply_pixel(filter, [px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&out);
            }
        });

    Ok(())
}
