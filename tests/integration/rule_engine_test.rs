// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{json_rule, query_of, requests_to, test_settings};
use rulefetch::domain::models::image::CanonicalImage;
use rulefetch::domain::models::source_rule::{
    ApiKeyConfig, EncodeStrategy, Filter, KeyPlacement, PaginationConfig, PaginationMode,
    PathRules,
};
use rulefetch::domain::source::engine::{FetchError, FetchQuery, FilterValue, ImageSource};
use rulefetch::engines::fetch_executor::RuleEngine;
use serde_json::json;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> RuleEngine {
    RuleEngine::new(&test_settings()).unwrap()
}

fn item(id: u32) -> serde_json::Value {
    json!({
        "id": id,
        "thumb": format!("https://cdn.example.com/t/{}.jpg", id),
        "full": format!("https://cdn.example.com/f/{}.jpg", id)
    })
}

fn ids(images: &[CanonicalImage]) -> Vec<String> {
    images.iter().map(|i| i.id.clone()).collect()
}

#[tokio::test]
async fn test_json_mode_parses_and_dedupes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "cat"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [item(1), item(2), item(1)]})),
        )
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.headers.insert("X-Client".to_string(), "rulefetch".to_string());
    rule.image_headers
        .insert("Referer".to_string(), "https://example.com/".to_string());

    let engine = engine();
    let images = engine
        .fetch(&rule, &FetchQuery::new(1, Some("cat")), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&images), vec!["1", "2"]);
    assert_eq!(images[1].full_url, "https://cdn.example.com/f/2.jpg");
    assert_eq!(images[0].source_id, "demo");

    let headers = engine.image_headers(&rule);
    assert_eq!(headers.get("X-Client").map(String::as_str), Some("rulefetch"));
    assert_eq!(
        headers.get("Referer").map(String::as_str),
        Some("https://example.com/")
    );
}

#[tokio::test]
async fn test_query_path_list_uses_full_url_as_id() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"thumb": "https://cdn.example.com/t/a.jpg", "full": "https://cdn.example.com/f/a.jpg"},
                {"thumb": "https://cdn.example.com/t/b.jpg", "full": "https://cdn.example.com/f/b.jpg"}
            ]
        })))
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.paths = PathRules {
        list: "$.data[*]".to_string(),
        thumb: Some("thumb".to_string()),
        full: Some("full".to_string()),
        ..Default::default()
    };

    let images = engine()
        .fetch(&rule, &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|i| i.id == i.full_url));
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(query_param("q", "missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(path("/search"))
        .and(query_param("q", "broken"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let rule = json_rule(&server);
    let engine = engine();
    let cancel = CancellationToken::new();

    let err = engine
        .fetch(&rule, &FetchQuery::new(1, Some("missing")), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::HttpClientError { status: 404 });

    let err = engine
        .fetch(&rule, &FetchQuery::new(1, Some("broken")), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::HttpServerError { status: 502 });
}

#[tokio::test]
async fn test_non_json_body_is_empty_result() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let images = engine()
        .fetch(&json_rule(&server), &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(images.is_empty());
}

#[tokio::test]
async fn test_merge_filter_fans_out_and_dedupes() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(query_param("tags", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [item(1), item(2)]})))
        .mount(&server)
        .await;
    Mock::given(path("/search"))
        .and(query_param("tags", "b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [item(2), item(3)]})))
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.filters.push(Filter {
        key: "tags".to_string(),
        encode: EncodeStrategy::Merge,
        multiple: true,
        ..Default::default()
    });
    let query = FetchQuery::new(1, Some("x")).with_filter(
        "tags",
        FilterValue::List(vec!["a".to_string(), "b".to_string()]),
    );

    let images = engine()
        .fetch(&rule, &query, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ids(&images), vec!["1", "2", "3"]);

    let sent = requests_to(&server, "/search").await;
    assert_eq!(sent.len(), 2);
    let tags: HashSet<String> = sent
        .iter()
        .map(|r| {
            let q = query_of(r);
            assert_eq!(q.get("q").map(String::as_str), Some("x"));
            q.get("tags").cloned().unwrap_or_default()
        })
        .collect();
    assert_eq!(tags, HashSet::from(["a".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn test_merge_keeps_id_less_items_from_every_sub_request() {
    let server = MockServer::start().await;
    for tag in ["a", "b"] {
        Mock::given(path("/search"))
            .and(query_param("tags", tag))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"title": format!("{}-1", tag)}, {"title": format!("{}-2", tag)}]
            })))
            .mount(&server)
            .await;
    }

    let mut rule = json_rule(&server);
    rule.paths = PathRules {
        list: "data".to_string(),
        ..Default::default()
    };
    rule.filters.push(Filter {
        key: "tags".to_string(),
        encode: EncodeStrategy::Merge,
        ..Default::default()
    });
    let query = FetchQuery::default().with_filter(
        "tags",
        FilterValue::List(vec!["a".to_string(), "b".to_string()]),
    );

    let images = engine()
        .fetch(&rule, &query, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(images.len(), 4);
    let distinct: HashSet<&str> = images.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(distinct.len(), 4);
    assert!(images.iter().all(|i| i.id.starts_with("demo-")));
}

#[tokio::test]
async fn test_merge_sub_request_failure_aborts_call() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(query_param("tags", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [item(1)]})))
        .mount(&server)
        .await;
    Mock::given(path("/search"))
        .and(query_param("tags", "b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.filters.push(Filter {
        key: "tags".to_string(),
        encode: EncodeStrategy::Merge,
        ..Default::default()
    });
    let query = FetchQuery::default().with_filter(
        "tags",
        FilterValue::List(vec!["a".to_string(), "b".to_string()]),
    );

    let err = engine()
        .fetch(&rule, &query, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::HttpServerError { status: 500 });
}

#[tokio::test]
async fn test_missing_required_keyword_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.keyword_required = true;

    let err = engine()
        .fetch(&rule, &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidConfiguration(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

fn cursor_rule(server: &MockServer) -> rulefetch::domain::models::source_rule::SourceRule {
    let mut rule = json_rule(server);
    rule.pagination = PaginationConfig {
        mode: PaginationMode::Cursor,
        cursor_path: Some("meta.next".to_string()),
        ..Default::default()
    };
    rule
}

#[tokio::test]
async fn test_cursor_without_token_degrades() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [item(7)]})))
        .mount(&server)
        .await;

    let images = engine()
        .fetch(
            &cursor_rule(&server),
            &FetchQuery::new(2, Some("cat")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&images), vec!["7"]);

    let sent = requests_to(&server, "/search").await;
    assert_eq!(sent.len(), 1);
    assert!(!query_of(&sent[0]).contains_key("cursor"));
}

#[tokio::test]
async fn test_cursor_round_trip_and_restart() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(query_param("cursor", "tok1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [item(3)], "meta": {"next": "tok2"}})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [item(1), item(2)], "meta": {"next": "tok1"}})),
        )
        .mount(&server)
        .await;

    let rule = cursor_rule(&server);
    let engine = engine();
    let cancel = CancellationToken::new();

    let first = engine
        .fetch(&rule, &FetchQuery::new(1, Some("cat")), &cancel)
        .await
        .unwrap();
    let again = engine
        .fetch(&rule, &FetchQuery::new(1, Some("cat")), &cancel)
        .await
        .unwrap();
    assert_eq!(first, again);

    let second = engine
        .fetch(&rule, &FetchQuery::new(2, Some("cat")), &cancel)
        .await
        .unwrap();
    assert_eq!(ids(&second), vec!["3"]);

    let sent = requests_to(&server, "/search").await;
    assert_eq!(sent.len(), 3);
    assert!(!query_of(&sent[0]).contains_key("cursor"));
    assert!(!query_of(&sent[1]).contains_key("cursor"));
    assert_eq!(query_of(&sent[2]).get("cursor").map(String::as_str), Some("tok1"));

    // a different query has its own cursor slot
    engine
        .fetch(&rule, &FetchQuery::new(2, Some("dog")), &cancel)
        .await
        .unwrap();
    let sent = requests_to(&server, "/search").await;
    assert!(!query_of(&sent[3]).contains_key("cursor"));
}

#[tokio::test]
async fn test_api_key_in_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(header("X-Api-Key", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [item(1)]})))
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.api_key = Some(ApiKeyConfig {
        name: Some("X-Api-Key".to_string()),
        placement: KeyPlacement::Header,
        prefix: Some("Bearer ".to_string()),
        value: "secret".to_string(),
    });
    let engine = engine();
    let images = engine
        .fetch(&rule, &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ids(&images), vec!["1"]);

    let sent = requests_to(&server, "/search").await;
    assert!(!query_of(&sent[0]).contains_key("apikey"));
    assert_eq!(
        engine.image_headers(&rule).get("X-Api-Key").map(String::as_str),
        Some("Bearer secret")
    );
}

#[tokio::test]
async fn test_enrich_merges_detail_without_overwriting() {
    let server = MockServer::start().await;
    Mock::given(path("/w/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 9,
                "uploader": {"username": "bob"},
                "views": 120,
                "file_type": "image/png",
                "tags": [{"name": "sky"}, {"name": "sea"}]
            }
        })))
        .mount(&server)
        .await;

    let mut rule = json_rule(&server);
    rule.paths.detail = vec!["url".to_string()];

    let mut image = CanonicalImage::new("9", "demo");
    image.uploader = "alice".to_string();
    image.views = "unknown".to_string();
    image.detail_url = format!("{}/w/9", server.uri());

    engine()
        .enrich(&rule, &mut image, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(image.uploader, "alice");
    assert_eq!(image.views, "120");
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.tags, vec!["sky", "sea"]);
}

#[tokio::test]
async fn test_similar_queries_with_seed_tags() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(query_param("q", "sky sea"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [item(5), item(6)]})))
        .mount(&server)
        .await;

    let mut seed = CanonicalImage::new("5", "demo");
    seed.tags = vec!["sky".to_string(), "sea".to_string(), "x".to_string()];

    let images = engine()
        .similar(&json_rule(&server), &seed, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(ids(&images), vec!["6"]);

    let empty_seed = CanonicalImage::new("abc", "demo");
    let images = engine()
        .similar(&json_rule(&server), &empty_seed, &CancellationToken::new())
        .await
        .unwrap();
    assert!(images.is_empty());
}

#[tokio::test]
async fn test_cancelled_fetch_returns_cancelled() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [item(1)]}))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = engine()
        .fetch(&json_rule(&server), &FetchQuery::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Cancelled);
}
