use std::path::PathBuf;

use crate::config::ConfigError;

/// 애플리케이션 전역 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read registration file {}: {source}", .path.display())]
    RegistrationFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid registration numbers found")]
    NoRegistrationNumbers,

    #[error("invalid registration number: {0}")]
    InvalidRegistration(String),

    /// Network failure or timeout while talking to the result site
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success status from the result site
    #[error("upstream returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    /// Result site answered with its "overloaded" placeholder
    #[error("result site unavailable: {0}")]
    SiteUnavailable(String),

    #[error("discord webhook error: {0}")]
    Webhook(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 재시도 가능한 에러인지 판단
    ///
    /// timeout, 네트워크 오류, 429, 5xx, 과부하 페이지는 일시적 오류로 재시도
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Request(_) | AppError::SiteUnavailable(_) => true,
            AppError::UpstreamStatus { status } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// 에러 코드 반환 (로그 및 Discord 알림용)
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::RegistrationFile { .. } => "REGFILE",
            AppError::NoRegistrationNumbers => "REGFILE_EMPTY",
            AppError::InvalidRegistration(_) => "REGNO_INVALID",
            AppError::Request(_) => "FETCH_NETWORK",
            AppError::UpstreamStatus { .. } => "FETCH_STATUS",
            AppError::SiteUnavailable(_) => "FETCH_OVERLOAD",
            AppError::Webhook(_) => "WEBHOOK",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => AppError::UpstreamStatus {
                status: status.as_u16(),
            },
            None => AppError::Request(error.to_string()),
        }
    }
}
