// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;
use url::Url;

/// 掩码后的占位值
pub const MASK: &str = "***";

const SECRET_HEADERS: &[&str] = &["authorization", "cookie", "x-api-key", "proxy-authorization"];
const SECRET_HEADER_FRAGMENTS: &[&str] = &["token", "key", "secret"];
const SECRET_PARAMS: &[&str] = &["apikey", "api_key", "key", "token", "access_token"];

/// 判断请求头是否携带凭据
///
/// # 参数
///
/// * `name` - 请求头名称
/// * `extra` - 规则额外声明的敏感名称（如自定义API Key请求头）
pub fn is_secret_header(name: &str, extra: Option<&str>) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_HEADERS.contains(&lower.as_str())
        || SECRET_HEADER_FRAGMENTS.iter().any(|f| lower.contains(f))
        || extra.is_some_and(|e| e.eq_ignore_ascii_case(name))
}

/// 返回可安全写入日志的请求头副本
pub fn mask_headers(headers: &BTreeMap<String, String>, extra: Option<&str>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let value = if is_secret_header(k, extra) {
                MASK.to_string()
            } else {
                v.clone()
            };
            (k.clone(), value)
        })
        .collect()
}

/// 返回可安全写入日志的查询参数副本
pub fn mask_pairs(pairs: &[(String, String)], extra: Option<&str>) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            if is_secret_param(k, extra) {
                (k.clone(), MASK.to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// 掩盖URL中携带凭据的查询参数，无法解析的URL原样返回
pub fn mask_url(raw: &str, extra: Option<&str>) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if url.query().is_none() {
        return raw.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(mask_pairs(&pairs, extra));
    url.to_string()
}

fn is_secret_param(name: &str, extra: Option<&str>) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_PARAMS.contains(&lower.as_str()) || extra.is_some_and(|e| e.eq_ignore_ascii_case(name))
}
