// C ABI 모듈 - 비 Rust 호스트용 extern "C" 함수

pub mod exporter;
pub mod types;

pub use exporter::*;
pub use types::ErrorCode;
