// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 图片源分派测试
///
/// 专用抓取器排在通用规则引擎之前，按规则的 `engine` 字段分派

#[cfg(test)]
mod tests {
    use rulefetch::config::settings::Settings;
    use rulefetch::domain::models::source_rule::SourceRule;
    use rulefetch::domain::source::engine::{FetchError, FetchQuery, ImageSource, LoginState};
    use rulefetch::engines::fetch_executor::RuleEngine;
    use rulefetch::engines::router::SourceRouter;
    use rulefetch::infrastructure::repositories::memory_session_repo::MemorySessionStore;
    use rulefetch::infrastructure::scraper::client::ScraperClient;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn router() -> SourceRouter {
        let settings = Settings::default();
        let scraper: Arc<dyn ImageSource> =
            Arc::new(ScraperClient::new(&settings, Arc::new(MemorySessionStore::new())).unwrap());
        let generic: Arc<dyn ImageSource> = Arc::new(RuleEngine::new(&settings).unwrap());
        SourceRouter::new(vec![scraper, generic])
    }

    fn rule(engine: Option<&str>) -> SourceRule {
        SourceRule {
            id: "demo".to_string(),
            engine: engine.map(str::to_string),
            url: "https://api.example.com/search".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dispatch_by_engine_field() {
        let router = router();
        assert_eq!(router.select(&rule(None)).unwrap().name(), "rule");
        assert_eq!(router.select(&rule(Some("rule"))).unwrap().name(), "rule");
        assert_eq!(router.select(&rule(Some("pixiv"))).unwrap().name(), "pixiv");
        assert_eq!(router.select(&rule(Some("PIXIV"))).unwrap().name(), "pixiv");
        assert!(matches!(
            router.select(&rule(Some("unknown"))),
            Err(FetchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_image_headers_come_from_selected_source() {
        let router = router();
        let headers = router.image_headers(&rule(Some("pixiv"))).unwrap();
        assert_eq!(
            headers.get("Referer").map(String::as_str),
            Some("https://www.pixiv.net/")
        );
        assert!(!headers.contains_key("Cookie"));

        let mut generic = rule(None);
        generic
            .image_headers
            .insert("Referer".to_string(), "https://api.example.com/".to_string());
        let headers = router.image_headers(&generic).unwrap();
        assert_eq!(
            headers.get("Referer").map(String::as_str),
            Some("https://api.example.com/")
        );
    }

    #[tokio::test]
    async fn test_logged_out_without_credential() {
        let router = router();
        assert_eq!(
            router.check_login_status(&rule(Some("pixiv"))).await.unwrap(),
            LoginState::LoggedOut
        );
        assert_eq!(
            router.check_login_status(&rule(None)).await.unwrap(),
            LoginState::LoggedOut
        );
    }

    #[tokio::test]
    async fn test_scraper_requires_keyword_before_any_request() {
        let router = router();
        let err = router
            .fetch(&rule(Some("pixiv")), &FetchQuery::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidConfiguration(_)));
    }
}
