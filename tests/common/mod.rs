//! 통합 테스트용 Mock 서버
//!
//! 결과 사이트와 Discord webhook을 로컬 axum 서버로 대체합니다.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use result_monitor::config::FetchConfig;
use result_monitor::config::{MonitorSettings, NotifierConfig};
use result_monitor::monitor::classifier::Markers;
use result_monitor::monitor::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const PLACEHOLDER_PAGE: &str =
    "<html><body><p>Result not available for this registration number</p></body></html>";
pub const OVERLOAD_PAGE: &str = "<html><body><h1>HTTP Error 503. Service Unavailable</h1></body></html>";

pub fn result_page(reg_no: &str) -> String {
    format!(
        "<html><head><title>Semester Result</title></head><body><h2>Registration No: {}</h2><p>SGPA 8.4</p></body></html>",
        reg_no
    )
}

/// 결과 사이트가 돌려줄 응답
#[derive(Debug, Clone)]
pub enum Page {
    Html(String),
    Status(u16),
}

/// Mock 결과 사이트 상태
#[derive(Default)]
pub struct SiteState {
    pages: Mutex<HashMap<String, Page>>,
    /// 등록번호별 남은 과부하 응답 횟수
    overloads: Mutex<HashMap<String, u32>>,
    hits: Mutex<HashMap<String, u32>>,
    landing: Mutex<Option<Page>>,
}

impl SiteState {
    pub fn set_page(&self, reg_no: &str, page: Page) {
        self.pages.lock().unwrap().insert(reg_no.to_string(), page);
    }

    pub fn overload_next(&self, reg_no: &str, times: u32) {
        self.overloads
            .lock()
            .unwrap()
            .insert(reg_no.to_string(), times);
    }

    pub fn set_landing(&self, page: Page) {
        *self.landing.lock().unwrap() = Some(page);
    }

    pub fn hits(&self, reg_no: &str) -> u32 {
        self.hits.lock().unwrap().get(reg_no).copied().unwrap_or(0)
    }
}

fn render(page: Page) -> Response {
    match page {
        Page::Html(body) => Html(body).into_response(),
        Page::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
    }
}

async fn result_handler(
    State(state): State<Arc<SiteState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let reg_no = params.get("RegNo").cloned().unwrap_or_default();
    *state.hits.lock().unwrap().entry(reg_no.clone()).or_insert(0) += 1;

    {
        let mut overloads = state.overloads.lock().unwrap();
        if let Some(remaining) = overloads.get_mut(&reg_no) {
            if *remaining > 0 {
                *remaining -= 1;
                return Html(OVERLOAD_PAGE.to_string()).into_response();
            }
        }
    }

    let page = state
        .pages
        .lock()
        .unwrap()
        .get(&reg_no)
        .cloned()
        .unwrap_or_else(|| Page::Html(PLACEHOLDER_PAGE.to_string()));
    render(page)
}

async fn landing_handler(State(state): State<Arc<SiteState>>) -> Response {
    let page = state
        .landing
        .lock()
        .unwrap()
        .clone()
        .unwrap_or(Page::Status(404));
    render(page)
}

/// Mock 결과 사이트 실행, base URL 반환
pub async fn spawn_site(state: Arc<SiteState>) -> String {
    let app = Router::new()
        .route("/result", get(result_handler))
        .route("/", get(landing_handler))
        .with_state(state);
    serve(app).await
}

/// Webhook이 받은 요청
#[derive(Debug, Clone)]
pub struct WebhookCall {
    pub content_type: String,
    pub body: String,
}

#[derive(Default)]
pub struct WebhookState {
    calls: Mutex<Vec<WebhookCall>>,
    fail: Mutex<bool>,
}

impl WebhookState {
    pub fn calls(&self) -> Vec<WebhookCall> {
        self.calls.lock().unwrap().clone()
    }

    /// 결과 첨부(multipart) 요청만
    pub fn result_calls(&self) -> Vec<WebhookCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.content_type.starts_with("multipart/form-data") || c.body.contains("Result Found"))
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

async fn webhook_handler(
    State(state): State<Arc<WebhookState>>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.calls.lock().unwrap().push(WebhookCall {
        content_type,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    if *state.fail.lock().unwrap() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

/// Mock Discord webhook 실행, webhook URL 반환
pub async fn spawn_webhook(state: Arc<WebhookState>) -> String {
    let app = Router::new()
        .route("/webhook", post(webhook_handler))
        .with_state(state);
    format!("{}/webhook", serve(app).await)
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{}", addr)
}

pub fn fetch_config(base_url: &str) -> FetchConfig {
    FetchConfig {
        result_url_template: format!("{}/result?RegNo={{reg_no}}", base_url),
        landing_url: None,
        request_timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            multiplier: 2.0,
        },
        markers: Markers::default(),
    }
}

pub fn notifier_config() -> NotifierConfig {
    NotifierConfig {
        message_delay: Duration::ZERO,
        ..NotifierConfig::default()
    }
}

pub fn monitor_settings() -> MonitorSettings {
    MonitorSettings {
        check_interval: Duration::from_millis(10),
        batch_size: 20,
        run_budget: Some(Duration::from_secs(10)),
        max_ticks: None,
        error_notification_interval: Duration::from_secs(3600),
        health_check_interval: None,
    }
}
