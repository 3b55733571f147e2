//! 결과 사이트 클라이언트 통합 테스트
//!
//! 로컬 Mock 사이트에 대해 분류와 재시도 동작을 검증합니다.

mod common;

use common::{fetch_config, spawn_site, Page, SiteState};
use result_monitor::monitor::{CheckOutcome, HttpResultSource, LandingStatus, ResultSource};
use result_monitor::monitor::RegistrationNumber;
use std::sync::Arc;

fn reg(raw: &str) -> RegistrationNumber {
    RegistrationNumber::parse(raw, None).expect("valid registration number")
}

#[tokio::test]
async fn should_report_placeholder_page_as_not_published() {
    // Arrange
    let site = Arc::new(SiteState::default());
    let base = spawn_site(Arc::clone(&site)).await;
    let source = HttpResultSource::new(fetch_config(&base)).expect("client");

    // Act
    let outcome = source.check(&reg("111")).await;

    // Assert
    assert_eq!(outcome, CheckOutcome::NotYetPublished);
    assert_eq!(site.hits("111"), 1);
}

#[tokio::test]
async fn should_return_page_and_metadata_when_published() {
    // Arrange
    let site = Arc::new(SiteState::default());
    site.set_page("111", Page::Html(common::result_page("111")));
    let base = spawn_site(Arc::clone(&site)).await;
    let source = HttpResultSource::new(fetch_config(&base)).expect("client");

    // Act
    let outcome = source.check(&reg("111")).await;

    // Assert
    match outcome {
        CheckOutcome::Published { body, metadata } => {
            assert_eq!(body, common::result_page("111").into_bytes());
            assert_eq!(metadata.reg_no, reg("111"));
            assert_eq!(metadata.status, 200);
            assert_eq!(metadata.size, body.len());
            assert_eq!(metadata.title.as_deref(), Some("Semester Result"));
            assert!(metadata.url.ends_with("/result?RegNo=111"));
            assert!(metadata
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("text/html")));
        }
        other => panic!("expected published outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn should_treat_404_as_not_published_without_retry() {
    // Arrange
    let site = Arc::new(SiteState::default());
    site.set_page("111", Page::Status(404));
    let base = spawn_site(Arc::clone(&site)).await;
    let source = HttpResultSource::new(fetch_config(&base)).expect("client");

    // Act
    let outcome = source.check(&reg("111")).await;

    // Assert
    assert_eq!(outcome, CheckOutcome::NotYetPublished);
    assert_eq!(site.hits("111"), 1);
}

#[tokio::test]
async fn should_retry_server_errors_up_to_max_attempts() {
    // Arrange
    let site = Arc::new(SiteState::default());
    site.set_page("111", Page::Status(500));
    let base = spawn_site(Arc::clone(&site)).await;
    let source = HttpResultSource::new(fetch_config(&base)).expect("client");

    // Act
    let outcome = source.check(&reg("111")).await;

    // Assert
    assert!(matches!(outcome, CheckOutcome::Error(_)));
    assert_eq!(site.hits("111"), 3);
}

#[tokio::test]
async fn should_not_retry_client_errors() {
    // Arrange
    let site = Arc::new(SiteState::default());
    site.set_page("111", Page::Status(403));
    let base = spawn_site(Arc::clone(&site)).await;
    let source = HttpResultSource::new(fetch_config(&base)).expect("client");

    // Act
    let outcome = source.check(&reg("111")).await;

    // Assert
    assert!(matches!(outcome, CheckOutcome::Error(reason) if reason.contains("403")));
    assert_eq!(site.hits("111"), 1);
}

#[tokio::test]
async fn should_retry_overload_page_and_recover() {
    // Arrange: 두 번 과부하 페이지 후 결과 페이지
    let site = Arc::new(SiteState::default());
    site.set_page("111", Page::Html(common::result_page("111")));
    site.overload_next("111", 2);
    let base = spawn_site(Arc::clone(&site)).await;
    let source = HttpResultSource::new(fetch_config(&base)).expect("client");

    // Act
    let outcome = source.check(&reg("111")).await;

    // Assert
    assert!(outcome.is_published());
    assert_eq!(site.hits("111"), 3);
}

#[tokio::test]
async fn landing_status_should_follow_landing_page() {
    // Arrange
    let site = Arc::new(SiteState::default());
    let base = spawn_site(Arc::clone(&site)).await;
    let mut config = fetch_config(&base);
    config.landing_url = Some(format!("{}/", base));
    let source = HttpResultSource::new(config).expect("client");

    // Act & Assert: 404 -> not live
    assert_eq!(
        source.landing_status().await.expect("reachable"),
        LandingStatus::NotLive
    );

    // 과부하 페이지 -> not live
    site.set_landing(Page::Html(common::OVERLOAD_PAGE.to_string()));
    assert_eq!(
        source.landing_status().await.expect("reachable"),
        LandingStatus::NotLive
    );

    // 정상 페이지 -> live
    site.set_landing(Page::Html("<html>Results</html>".to_string()));
    assert_eq!(
        source.landing_status().await.expect("reachable"),
        LandingStatus::Live
    );
}
