// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 规则文件解析测试
///
/// 覆盖 camelCase 字段、snake_case 别名与枚举取值

#[cfg(test)]
mod tests {
    use rulefetch::domain::models::source_rule::{
        EncodeStrategy, KeyPlacement, PaginationMode, ResponseMode, SourceRule,
    };

    #[test]
    fn test_parse_json_rule() {
        let text = r#"{
            "id": "wallhaven",
            "name": "Wallhaven",
            "url": "https://wallhaven.cc/api/v1/search",
            "params": {"sorting": "toplist"},
            "apiKey": {"name": "apikey", "placement": "query", "value": "k"},
            "keywordParam": "q",
            "filters": [
                {"key": "categories", "multiple": true, "encode": "join", "separator": ""},
                {"key": "tags", "encode": "merge"}
            ],
            "pagination": {"mode": "page", "param": "page"},
            "paths": {
                "list": "data",
                "id": "id",
                "thumb": "thumbs.large",
                "full": "path",
                "uploader": ["uploader.username"]
            },
            "imageHeaders": {"Referer": "https://wallhaven.cc/"}
        }"#;

        let rule = SourceRule::from_json_str(text).unwrap();
        assert_eq!(rule.id, "wallhaven");
        assert_eq!(rule.params.get("sorting").map(String::as_str), Some("toplist"));
        let key = rule.api_key.as_ref().unwrap();
        assert_eq!(key.placement, KeyPlacement::Query);
        assert_eq!(key.param_name(), "apikey");
        assert_eq!(rule.filter("categories").unwrap().separator(), "");
        assert_eq!(rule.filter("tags").unwrap().encode, EncodeStrategy::Merge);
        assert_eq!(rule.paths.thumb.as_deref(), Some("thumbs.large"));
        assert_eq!(rule.paths.uploader, vec!["uploader.username"]);
        assert_eq!(rule.response_mode, ResponseMode::Json);
        assert_eq!(rule.image_headers.len(), 1);
        assert!(rule.engine.is_none());
    }

    #[test]
    fn test_parse_yaml_rule_with_snake_case_aliases() {
        let text = r#"
id: konachan
url: "https://konachan.net/post.json"
keyword_param: tags
keyword_required: true
default_keyword: landscape
api_key:
  placement: header
  prefix: "Bearer "
  value: secret
pagination:
  mode: cursor
  cursor_path: meta.next
  page_size: 40
  size_param: limit
paths:
  list: "$[*]"
  full: file_url
  file_size: [file_size]
image_prefix: "https://konachan.net"
"#;

        let rule = SourceRule::from_yaml_str(text).unwrap();
        assert_eq!(rule.keyword_param_name(), "tags");
        assert!(rule.keyword_required);
        assert_eq!(rule.default_keyword.as_deref(), Some("landscape"));
        let key = rule.api_key.as_ref().unwrap();
        assert_eq!(key.param_name(), "Authorization");
        assert_eq!(key.rendered_value(), "Bearer secret");
        assert_eq!(rule.pagination.mode, PaginationMode::Cursor);
        assert_eq!(rule.pagination.param_name(), "cursor");
        assert_eq!(rule.pagination.cursor_path.as_deref(), Some("meta.next"));
        assert_eq!(rule.pagination.page_size, Some(40));
        assert_eq!(rule.paths.file_size, vec!["file_size"]);
        assert_eq!(rule.image_prefix.as_deref(), Some("https://konachan.net"));
    }

    #[test]
    fn test_minimal_rule_uses_defaults() {
        let rule = SourceRule::from_json_str(r#"{"id": "r", "url": "https://x.test/random", "responseMode": "random"}"#)
            .unwrap();
        assert_eq!(rule.response_mode, ResponseMode::Random);
        assert_eq!(rule.keyword_param_name(), "q");
        assert_eq!(rule.pagination.param_name(), "page");
        assert!(rule.filters.is_empty());
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let result = SourceRule::from_json_str(r#"{"id": "r", "pagination": {"mode": "scroll"}}"#);
        assert!(result.is_err());
    }
}
