// 픽셀 필터 모듈
// 커널(순수 픽셀 연산) + 워커(오프스레드 적용)

pub mod kernel;
pub mod worker;

pub use kernel::{apply_frame, apply_pixel, matrix_for, ColorMatrix};
pub use worker::FilterWorker;
