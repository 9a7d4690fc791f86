// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/c/[^/]+/").expect("Failed to compile size segment regex"));
static SIZE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"_(?:square|custom)1200(\.[A-Za-z0-9]+)$").expect("Failed to compile size suffix regex")
});
static DATE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/img/\d{4}/\d{2}/\d{2}/\d{2}/\d{2}/\d{2}/").expect("Failed to compile date path regex")
});

/// 站点根地址去掉末尾斜杠
pub fn normalize_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

pub fn login_check_url(base: &str) -> String {
    format!("{}/ajax/user/extra", base)
}

pub fn search_url(base: &str, word: &str) -> String {
    format!("{}/ajax/search/artworks/{}", base, urlencoding::encode(word))
}

pub fn pages_url(base: &str, id: &str) -> String {
    format!("{}/ajax/illust/{}/pages", base, id)
}

pub fn recommend_url(base: &str, id: &str) -> String {
    format!("{}/ajax/illust/{}/recommend/init", base, id)
}

pub fn artwork_url(base: &str, id: &str) -> String {
    format!("{}/artworks/{}", base, id)
}

/// 从缩略图地址推导大图地址
///
/// 去掉 `/c/<尺寸>/` 目录，`custom-thumb` 换成 `img-master`，
/// `_square1200` / `_custom1200` 换成 `_master1200`。
///
/// # 返回值
///
/// 地址不带 `img-master` 目录或日期路径时无法推导，返回 `None`
pub fn derive_full_url(thumb: &str) -> Option<String> {
    let thumb = thumb.trim();
    if thumb.is_empty() {
        return None;
    }
    let url = SIZE_SEGMENT.replace(thumb, "/");
    let url = url.replace("/custom-thumb/", "/img-master/");
    let url = SIZE_SUFFIX.replace(&url, "_master1200$1").into_owned();
    if url.contains("/img-master/") && DATE_PATH.is_match(&url) {
        Some(url)
    } else {
        None
    }
}

/// 作品id是否为纯数字
pub fn is_artwork_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}
