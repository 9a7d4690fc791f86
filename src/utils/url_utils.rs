// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::Url;

/// 判断地址是否已带有协议
pub fn has_scheme(raw: &str) -> bool {
    Url::parse(raw).map(|u| !u.scheme().is_empty()).unwrap_or(false)
}

/// 为相对地址补全前缀
///
/// 已有协议的地址原样返回；没有前缀时保持相对地址。
pub fn apply_prefix(raw: &str, prefix: Option<&str>) -> String {
    let raw = raw.trim();
    if raw.is_empty() || has_scheme(raw) {
        return raw.to_string();
    }
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => {
            if prefix.ends_with('/') && raw.starts_with('/') {
                format!("{}{}", prefix, &raw[1..])
            } else {
                format!("{}{}", prefix, raw)
            }
        }
        None => raw.to_string(),
    }
}

/// 移除指定查询参数，其余参数保持原顺序
pub fn strip_query_params(raw: &str, names: &[&str]) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !names.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}
