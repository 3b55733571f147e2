use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // 1. 환경변수 로드
    dotenvy::dotenv().ok();

    // 2. 로깅 초기화 (guard는 종료 시까지 유지)
    let log_dir = std::env::var("LOG_DIR").ok();
    let _guard = result_monitor::utils::init_logging(log_dir.as_deref());

    // 3. 명령 실행
    match result_monitor::cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "Result monitor failed");
            ExitCode::FAILURE
        }
    }
}
