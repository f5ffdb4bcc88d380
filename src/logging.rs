// 로깅 초기화 - env_logger (RUST_LOG로 조절, 기본 info)

use env_logger::Env;

/// 로거 설치 (여러 번 호출해도 안전, 이미 설치된 로거가 있으면 무시)
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("logger ready");
    }
}
