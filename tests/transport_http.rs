//! Transport-level behavior of the fetch primitives, against a mock HTTP
//! server.

use std::time::Duration;

use manga_dl::limiter::AdmissionLimiter;
use manga_dl::{CancellationToken, Error, FetchContext, RetryConfig, TransportClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "manga-dl-test/0.1";

fn fetch_context() -> FetchContext {
    FetchContext::new(
        TransportClient::new(USER_AGENT).expect("client"),
        AdmissionLimiter::new(2),
        RetryConfig { max_attempts: 3 },
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn document_success_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chapter/1"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>pages</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let doc = fetch
        .document(&format!("{}/chapter/1", server.uri()))
        .await
        .expect("fetch");
    assert_eq!(doc.as_deref(), Some("<html>pages</html>"));
}

#[tokio::test]
async fn not_found_is_absent_and_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let doc = fetch
        .document(&format!("{}/missing", server.uri()))
        .await
        .expect("absent result is not an error");
    assert!(doc.is_none());
}

#[tokio::test]
async fn server_errors_are_retried_up_to_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let outcome = fetch.document(&format!("{}/flaky", server.uri())).await;
    assert!(matches!(outcome, Err(Error::Transport(_))));
}

#[tokio::test]
async fn two_failures_then_success_recovers_on_third_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(200).set_body_string("eventually"))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let doc = fetch
        .document(&format!("{}/recovering", server.uri()))
        .await
        .expect("third attempt succeeds");
    assert_eq!(doc.as_deref(), Some("eventually"));
}

#[tokio::test]
async fn on_start_hook_runs_before_the_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let mut hook_ran = false;
    let doc = fetch
        .document_with_hook(&format!("{}/doc", server.uri()), || hook_ran = true)
        .await
        .expect("fetch");
    assert!(hook_ran);
    assert_eq!(doc.as_deref(), Some("ok"));
}

#[tokio::test]
async fn asset_sends_page_url_as_referer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/1.png"))
        .and(header("referer", "https://site.example/page/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
        .expect(1)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let bytes = fetch
        .asset(
            &format!("{}/img/1.png", server.uri()),
            "https://site.example/page/1",
        )
        .await
        .expect("asset");
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn cancellation_is_observed_after_the_round_trip_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let token = fetch.token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
    });

    // The in-flight request runs to completion; the result is then
    // discarded in favor of the cancellation signal
    let outcome = fetch.document(&format!("{}/slow", server.uri())).await;
    assert!(matches!(outcome, Err(Error::Cancelled)));
}

#[tokio::test]
async fn asset_download_fails_with_cancellation_not_partial_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/big.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 64 * 1024])
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;

    let fetch = fetch_context();
    let token = fetch.token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
    });

    let outcome = fetch
        .asset(&format!("{}/img/big.png", server.uri()), "ref")
        .await;
    assert!(matches!(outcome, Err(Error::Cancelled)));
}

#[tokio::test]
async fn pre_cancelled_token_abandons_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/never"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetch = fetch_context();
    fetch.token().cancel();

    let outcome = fetch.document(&format!("{}/never", server.uri())).await;
    assert!(matches!(outcome, Err(Error::Cancelled)));
}
