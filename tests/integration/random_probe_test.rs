// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{query_of, requests_to, test_settings};
use rulefetch::domain::models::source_rule::{ResponseMode, SourceRule};
use rulefetch::domain::source::engine::{FetchError, FetchQuery, ImageSource};
use rulefetch::engines::fetch_executor::RuleEngine;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn random_rule(server: &MockServer) -> SourceRule {
    SourceRule {
        id: "rand".to_string(),
        url: format!("{}/random", server.uri()),
        response_mode: ResponseMode::Random,
        ..Default::default()
    }
}

async fn redirect_times(server: &MockServer, location: String, times: u64) {
    Mock::given(path("/random"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", location.as_str()))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_probe_batch_collects_distinct_urls() {
    let server = MockServer::start().await;
    let uri = server.uri();
    redirect_times(&server, format!("{}/img/1.jpg", uri), 2).await;
    redirect_times(&server, format!("{}/img/2.jpg?_t=99&_r=7&w=1", uri), 2).await;
    redirect_times(&server, format!("{}/img/3.jpg", uri), 100).await;
    Mock::given(path_regex(r"^/img/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let engine = RuleEngine::new(&test_settings()).unwrap();
    let images = engine
        .fetch(&random_rule(&server), &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap();

    let urls: HashSet<String> = images.iter().map(|i| i.full_url.clone()).collect();
    assert_eq!(images.len(), 3);
    assert_eq!(
        urls,
        HashSet::from([
            format!("{}/img/1.jpg", uri),
            format!("{}/img/2.jpg?w=1", uri),
            format!("{}/img/3.jpg", uri),
        ])
    );
    for image in &images {
        assert!(image.full_url.starts_with("http"));
        assert!(!image.full_url.contains("_t="));
        assert!(!image.full_url.contains("_r="));
        assert_eq!(image.id, image.full_url);
        assert_eq!(image.thumb_url, image.full_url);
    }

    // every probe carries its own cache-busting pair
    let probes = requests_to(&server, "/random").await;
    assert_eq!(probes.len(), 6);
    assert!(probes.iter().all(|r| {
        let q = query_of(r);
        q.contains_key("_t") && q.contains_key("_r")
    }));
}

#[tokio::test]
async fn test_all_probes_failing_is_empty_success() {
    let server = MockServer::start().await;
    Mock::given(path("/random"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = RuleEngine::new(&test_settings()).unwrap();
    let images = engine
        .fetch(&random_rule(&server), &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(images.is_empty());
}

#[tokio::test]
async fn test_cancelled_batch_returns_cancelled() {
    let server = MockServer::start().await;
    Mock::given(path("/random"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let engine = RuleEngine::new(&test_settings()).unwrap();
    let err = engine
        .fetch(&random_rule(&server), &FetchQuery::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Cancelled);
}

#[tokio::test]
async fn test_random_batch_starts_staggered() {
    let server = MockServer::start().await;
    Mock::given(path("/random"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.random.batch_size = 6;
    settings.random.stagger_ms = 100;
    let engine = RuleEngine::new(&settings).unwrap();

    // the last of six requests starts 5 * 100ms after the first
    let start = Instant::now();
    let images = engine
        .fetch(&random_rule(&server), &FetchQuery::default(), &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3000), "elapsed {:?}", elapsed);
    assert_eq!(requests_to(&server, "/random").await.len(), 6);
    // all six land on the same URL once the cache busters are stripped
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].full_url, format!("{}/random", server.uri()));
}
