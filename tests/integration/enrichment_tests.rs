//! Gemini client against a mock generateContent endpoint

use catalog_harvest::config::EnrichmentConfig;
use catalog_harvest::enrich::{Enricher, EnrichmentError, GeminiClient};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-test";

fn client(server: &MockServer) -> GeminiClient {
    let config = EnrichmentConfig {
        endpoint: server.uri(),
        model: MODEL.to_string(),
        timeout_secs: 5,
        ..EnrichmentConfig::default()
    };
    GeminiClient::new(reqwest::Client::new(), &config, "secret")
}

fn route() -> String {
    format!("/models/{}:generateContent", MODEL)
}

#[tokio::test]
async fn test_translate_joins_text_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(route()))
        .and(header("x-goog-api-key", "secret"))
        .and(body_string_contains("PS Series"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Cảm biến " }, { "text": "tiệm cận PS" }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .translate("PS Series", "Vietnamese")
        .await
        .unwrap();
    assert_eq!(text, "Cảm biến tiệm cận PS");
}

#[tokio::test]
async fn test_image_is_sent_inline() {
    let server = MockServer::start().await;

    // base64 of "abc"
    Mock::given(method("POST"))
        .and(path(route()))
        .and(body_string_contains("YWJj"))
        .and(body_string_contains("image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "<table></table>" }] } }]
        })))
        .mount(&server)
        .await;

    let text = client(&server)
        .extract_table_from_image(b"abc", "image/png", "Build a table")
        .await
        .unwrap();
    assert_eq!(text, "<table></table>");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(route()))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let err = client(&server).translate("PS", "Vietnamese").await.unwrap_err();
    match err {
        EnrichmentError::Status { code, body } => {
            assert_eq!(code, 429);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(route()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client(&server).translate("PS", "Vietnamese").await.unwrap_err();
    assert!(matches!(err, EnrichmentError::EmptyResponse));
}
