use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::monitor::classifier::Markers;
use crate::monitor::registration::RegistrationNumber;
use crate::monitor::retry::RetryPolicy;

/// 결과 조회 URL 템플릿의 등록번호 자리표시자
pub const REG_NO_PLACEHOLDER: &str = "{reg_no}";

/// 기본 결과 조회 URL 템플릿
pub const DEFAULT_RESULT_URL_TEMPLATE: &str =
    "https://results.beup.ac.in/ResultsBTech1stSem2024_B2024Pub.aspx?Sem=I&RegNo={reg_no}";

/// 기본 등록번호 파일
pub const DEFAULT_REG_NO_FILE: &str = "registration_numbers.txt";

/// Discord 첨부파일 기본 상한 (8 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 8 * 1024 * 1024;

/// 결과 사이트 조회 설정
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub result_url_template: String,
    /// 설정된 경우 이 페이지가 열린 뒤에만 개별 조회를 시작
    pub landing_url: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub markers: Markers,
}

impl FetchConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let result_url_template = lookup("RESULT_URL_TEMPLATE")
            .unwrap_or_else(|| DEFAULT_RESULT_URL_TEMPLATE.to_string());
        if !result_url_template.contains(REG_NO_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(result_url_template));
        }

        let landing_url = lookup("RESULT_LANDING_URL").filter(|url| !url.trim().is_empty());

        let request_timeout = Duration::from_secs(parse_or(lookup, "REQUEST_TIMEOUT_SECS", 10)?);

        let max_attempts: u32 = parse_or(lookup, "RETRY_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RETRY_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        let initial_interval =
            Duration::from_millis(parse_or(lookup, "RETRY_INITIAL_INTERVAL_MS", 1000)?);
        let retry = RetryPolicy {
            max_attempts,
            initial_interval,
            ..RetryPolicy::default()
        };

        let mut markers = Markers::default();
        if let Some(list) = lookup("NOT_PUBLISHED_MARKERS") {
            markers.not_published = split_list(&list);
        }
        if let Some(list) = lookup("SITE_DOWN_MARKERS") {
            markers.site_down = split_list(&list);
        }
        if let Some(list) = lookup("RESULT_MARKERS") {
            markers.result = split_list(&list);
        }

        Ok(Self {
            result_url_template,
            landing_url,
            request_timeout,
            retry,
            markers,
        })
    }

    /// 등록번호를 템플릿에 채워 조회 URL 생성
    pub fn result_url(&self, reg_no: &RegistrationNumber) -> String {
        self.result_url_template
            .replace(REG_NO_PLACEHOLDER, reg_no.as_str())
    }
}

/// 모니터 루프 설정
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub check_interval: Duration,
    pub batch_size: usize,
    /// 스케줄러가 허용한 실행 시간
    pub run_budget: Option<Duration>,
    pub max_ticks: Option<u64>,
    pub error_notification_interval: Duration,
    /// `None`이면 헬스 체크 비활성화
    pub health_check_interval: Option<Duration>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(2),
            batch_size: 20,
            run_budget: None,
            max_ticks: None,
            error_notification_interval: Duration::from_secs(3600),
            health_check_interval: Some(Duration::from_secs(3600)),
        }
    }
}

impl MonitorSettings {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let batch_size: usize = parse_or(lookup, "BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        let check_interval = Duration::from_secs(parse_or(lookup, "CHECK_INTERVAL_SECS", 2)?);
        let run_budget = parse_opt::<u64>(lookup, "RUN_BUDGET_SECS")?.map(Duration::from_secs);
        let error_notification_interval =
            Duration::from_secs(parse_or(lookup, "ERROR_NOTIFICATION_INTERVAL_SECS", 3600)?);
        let health_check_interval = match parse_or(lookup, "HEALTH_CHECK_INTERVAL_SECS", 3600u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            check_interval,
            batch_size,
            run_budget,
            max_ticks: None,
            error_notification_interval,
            health_check_interval,
        })
    }
}

/// Discord 알림 설정
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub username: String,
    pub avatar_url: Option<String>,
    /// 전송 후 대기 시간 (Discord rate limit 회피)
    pub message_delay: Duration,
    pub max_attachment_bytes: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            username: "Result Monitor Bot".to_string(),
            avatar_url: Some("https://cdn.discordapp.com/embed/avatars/0.png".to_string()),
            message_delay: Duration::from_millis(1000),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

impl NotifierConfig {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            username: lookup("DISCORD_USERNAME").unwrap_or(defaults.username),
            avatar_url: defaults.avatar_url,
            message_delay: Duration::from_millis(parse_or(lookup, "MESSAGE_DELAY_MS", 1000)?),
            max_attachment_bytes: parse_or(
                lookup,
                "MAX_ATTACHMENT_BYTES",
                defaults.max_attachment_bytes,
            )?,
        })
    }
}

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webhook_url: String,
    pub registration_file: PathBuf,
    /// 설정된 경우 등록번호는 정확히 이 길이의 숫자여야 함
    pub registration_length: Option<usize>,
    pub fetch: FetchConfig,
    pub monitor: MonitorSettings,
    pub notifier: NotifierConfig,
}

impl AppConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let webhook_url = lookup("DISCORD_WEBHOOK_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingWebhookUrl)?;

        let registration_file = PathBuf::from(
            lookup("REG_NO_FILE").unwrap_or_else(|| DEFAULT_REG_NO_FILE.to_string()),
        );
        let registration_length = parse_opt::<usize>(lookup, "REG_NO_LENGTH")?;

        Ok(Self {
            webhook_url,
            registration_file,
            registration_length,
            fetch: FetchConfig::from_lookup(lookup)?,
            monitor: MonitorSettings::from_lookup(lookup)?,
            notifier: NotifierConfig::from_lookup(lookup)?,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_opt<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn parse_or<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DISCORD_WEBHOOK_URL environment variable is required")]
    MissingWebhookUrl,
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("RESULT_URL_TEMPLATE must contain {{reg_no}}: {0}")]
    MissingPlaceholder(String),
}
