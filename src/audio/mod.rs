// 오디오 추출 모듈
// 소스 오디오 트랙을 비디오와 독립된 핸들로 한 번에 디코딩

pub mod extractor;

pub use extractor::{AudioExtractor, PendingAudio};
