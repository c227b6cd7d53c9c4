//! Submission, retry and quota recording against mock token and indexing endpoints

use crate::common::{indexing_config, mount_token, pool, PUBLISH_PATH};
use sitemap_indexer::indexing::{FailureKind, Outcome, Submitter};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = "https://example.com/hello-world/";

fn api_error(code: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(code).set_body_json(serde_json::json!({
        "error": {"code": code, "message": message, "status": "ERROR"}
    }))
}

#[tokio::test]
async fn test_success_sends_authenticated_notification() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(serde_json::json!({"url": PAGE, "type": "URL_UPDATED"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let config = indexing_config(&server);
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.attempts, 1);
    assert!(report.delays.is_empty());
    assert_eq!(credential.quota().used_today, 1);
}

#[tokio::test]
async fn test_rate_limited_then_accepted() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(api_error(429, "Quota exceeded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = indexing_config(&server);
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.outcome, Outcome::Success);
    assert_eq!(report.attempts, 3);
    assert_eq!(
        report.delays,
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );

    // Every attempt counts against the daily budget
    let quota = credential.quota();
    assert_eq!(quota.used_today, 3);
    assert_eq!(quota.consecutive_failures, 0);
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(api_error(403, "Permission denied. Failed to verify the URL ownership."))
        .expect(1)
        .mount(&server)
        .await;

    let config = indexing_config(&server);
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.attempts, 1);
    match report.outcome {
        Outcome::Failure {
            kind,
            status,
            reason,
        } => {
            assert_eq!(kind, FailureKind::Terminal);
            assert_eq!(status, Some(403));
            assert!(reason.contains("URL ownership"));
        }
        Outcome::Success => panic!("403 must fail"),
    }
    assert_eq!(credential.quota().consecutive_failures, 1);
}

#[tokio::test]
async fn test_server_errors_give_up_at_cap() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = indexing_config(&server);
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.attempts, 3);
    assert_eq!(report.delays.len(), 2);
    match report.outcome {
        Outcome::Failure { kind, status, reason } => {
            assert_eq!(kind, FailureKind::Terminal);
            assert_eq!(status, Some(503));
            assert!(reason.starts_with("gave up after 3 attempts"));
        }
        Outcome::Success => panic!("503 must fail"),
    }

    let quota = credential.quota();
    assert_eq!(quota.used_today, 3);
    assert_eq!(quota.consecutive_failures, 3);
}

#[tokio::test]
async fn test_rejected_assertion_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = indexing_config(&server);
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.attempts, 1);
    match report.outcome {
        Outcome::Failure { kind, reason, .. } => {
            assert_eq!(kind, FailureKind::Terminal);
            assert!(reason.contains("invalid_grant"));
        }
        Outcome::Success => panic!("token rejection must fail"),
    }
    assert_eq!(credential.quota().used_today, 1);
}

#[tokio::test]
async fn test_access_token_is_cached_between_submissions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .and(header("authorization", "Bearer cached-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let config = indexing_config(&server);
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    assert!(submitter.submit(PAGE, &credential).await.outcome.is_success());
    assert!(submitter
        .submit("https://example.com/about/", &credential)
        .await
        .outcome
        .is_success());
}

#[tokio::test]
async fn test_retries_stop_when_daily_budget_is_spent() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(api_error(429, "Quota exceeded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = indexing_config(&server);
    config.daily_limit = 1;
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.attempts, 1);
    assert!(report.delays.is_empty());
    match report.outcome {
        Outcome::Failure { kind, reason, .. } => {
            assert_eq!(kind, FailureKind::Terminal);
            assert!(reason.contains("API1 exhausted after 1 attempts"));
        }
        Outcome::Success => panic!("spent credential must not be retried"),
    }
    assert_eq!(credential.quota().used_today, 1);
    assert!(!pool.is_usable(&credential));
}

#[tokio::test]
async fn test_retries_stop_at_failure_threshold() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = indexing_config(&server);
    config.max_attempts = 5;
    config.failure_threshold = 2;
    let pool = pool(&server, &[1], &config);
    let submitter = Submitter::new(&config, Arc::clone(&pool)).unwrap();
    let credential = pool.get(1).unwrap();

    let report = submitter.submit(PAGE, &credential).await;

    assert_eq!(report.attempts, 2);
    assert!(!report.outcome.is_success());
    assert_eq!(credential.quota().consecutive_failures, 2);
}
