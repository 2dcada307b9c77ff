//! Fetch client behavior against a live mock server

use catalog_harvest::crawler::{
    extract_detail, FetchPolicy, Fetcher, PageRenderer, StaticRenderer,
};
use catalog_harvest::{FetchError, ProductStub, Series};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: Duration = Duration::from_millis(50);

fn fetcher(max_attempts: u32) -> Fetcher {
    Fetcher::new(
        reqwest::Client::new(),
        FetchPolicy {
            timeout: Duration::from_secs(5),
            max_attempts,
            backoff_base: BASE,
        },
    )
}

#[tokio::test]
async fn test_two_failures_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let started = Instant::now();
    let body = fetcher(3)
        .fetch_text(&format!("{}/flaky", server.uri()))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(body, "finally");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    // Delays of 1x and 2x the base precede the second and third attempts
    assert!(elapsed >= BASE * 3, "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_exhausted_client_error_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/gone", server.uri());
    let err = fetcher(3).fetch(&url).await.unwrap_err();

    match &err {
        FetchError::Permanent {
            status, attempts, ..
        } => {
            assert_eq!(*status, 404);
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected permanent failure, got {:?}", other),
    }
    assert!(!err.is_transient());
    assert_eq!(err.url(), url);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fetcher(2)
        .fetch(&format!("{}/down", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transient { attempts: 2, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_invalid_url_is_not_requested() {
    let err = fetcher(3).fetch("not a url").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl { .. }));
}

#[tokio::test]
async fn test_static_renderer_readiness() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><div class=\"tab-content\">ok</div></body></html>"),
        )
        .mount(&server)
        .await;

    let renderer = StaticRenderer::new(fetcher(1));
    let url = format!("{}/page", server.uri());

    let html = renderer
        .render(&url, "div.tab-content", Duration::from_secs(1))
        .await
        .unwrap();
    assert!(html.contains("tab-content"));

    let err = renderer
        .render(&url, "div.never-there", Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RenderTimeout { .. }));
}

#[tokio::test]
async fn test_detail_shell_page_is_not_ready() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/en-gb/product/501"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><div id="app">Loading</div></body></html>"#),
        )
        .mount(&server)
        .await;

    let series = Series {
        name: "PS".to_string(),
        url: format!("{}/en-gb/product-category/72/113", server.uri()),
        thumbnail_url: String::new(),
        description: String::new(),
    };
    let stub = ProductStub::new(
        "PS-05N",
        "NPN NO",
        format!("{}/en-gb/product/501", server.uri()),
        &series,
    );

    let renderer = StaticRenderer::new(fetcher(1));
    let err = extract_detail(&renderer, stub, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RenderTimeout { .. }));
}
