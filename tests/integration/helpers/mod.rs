// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use rulefetch::config::settings::Settings;
use rulefetch::domain::models::source_rule::{PathRules, SourceRule};
use std::collections::HashMap;
use wiremock::{MockServer, Request};

/// 测试用配置：缩短探测间隔与超时
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.http.json_timeout_secs = 5;
    settings.http.probe_timeout_secs = 5;
    settings.http.detail_timeout_secs = 5;
    settings.random.stagger_ms = 10;
    settings
}

/// 指向 mock 服务器 `/search` 的 JSON 规则
pub fn json_rule(server: &MockServer) -> SourceRule {
    SourceRule {
        id: "demo".to_string(),
        name: "Demo".to_string(),
        url: format!("{}/search", server.uri()),
        paths: PathRules {
            list: "data".to_string(),
            id: Some("id".to_string()),
            thumb: Some("thumb".to_string()),
            full: Some("full".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 记录的请求中发往 `path` 的那部分
pub async fn requests_to(server: &MockServer, path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == path)
        .collect()
}

/// 请求的查询参数
pub fn query_of(request: &Request) -> HashMap<String, String> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
