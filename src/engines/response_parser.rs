// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::image::{CanonicalImage, Grade};
use crate::domain::models::source_rule::SourceRule;
use crate::engines::path_resolver::{self, resolve, resolve_string, scalar_to_string};
use crate::utils::url_utils::apply_prefix;
use serde_json::Value;

const DEFAULT_WIDTH_PATHS: &[&str] = &["width", "image_width", "dimension_x"];
const DEFAULT_HEIGHT_PATHS: &[&str] = &["height", "image_height", "dimension_y"];
const DEFAULT_GRADE_PATHS: &[&str] = &["rating", "purity"];
const DEFAULT_TAG_PATHS: &[&str] = &["tags", "tag_string"];
const DEFAULT_UPLOADER_PATHS: &[&str] = &[
    "uploader.username",
    "uploader.name",
    "uploader",
    "user.name",
    "author",
    "owner",
];
const DEFAULT_VIEWS_PATHS: &[&str] = &["views", "view_count"];
const DEFAULT_FAVORITES_PATHS: &[&str] = &["favorites", "fav_count", "favorite_count"];
const DEFAULT_FILE_SIZE_PATHS: &[&str] = &["file_size", "filesize", "size"];
const DEFAULT_CREATED_AT_PATHS: &[&str] = &["created_at", "createdAt", "create_date"];
const DEFAULT_MIME_PATHS: &[&str] = &["file_type", "mime_type", "mime"];

const AI_TAGS: &[&str] = &["ai", "ai-generated", "ai generated", "ai_generated", "ai生成"];

/// 解析响应体
///
/// 按规则的列表路径取出记录，逐条映射为 [`CanonicalImage`]。
/// 列表路径没有落在数组上时返回空列表。
pub fn parse(rule: &SourceRule, body: &Value) -> Vec<CanonicalImage> {
    parse_with(rule, body, chrono::Utc::now().timestamp_micros(), 0)
}

/// 使用给定时间戳和起始序号解析响应体
///
/// 同一次调用的多个响应共用一个时间戳，序号接着上一个响应继续，
/// 合成id在整次调用内保持唯一。
///
/// # 参数
///
/// * `rule` - 源规则
/// * `body` - 响应体
/// * `stamp` - 合成id使用的微秒时间戳
/// * `offset` - 本响应第一条记录的序号
pub fn parse_with(rule: &SourceRule, body: &Value, stamp: i64, offset: usize) -> Vec<CanonicalImage> {
    path_resolver::resolve_list(&rule.paths.list, body)
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_item(rule, item, offset + index, stamp))
        .collect()
}

/// 映射单条记录
///
/// id 依次回退到大图地址、缩略图地址，最后是 `{规则id}-{时间戳}-{序号}` 形式的合成id。
///
/// # 参数
///
/// * `rule` - 源规则
/// * `item` - 单条记录
/// * `index` - 记录序号
/// * `stamp` - 合成id使用的微秒时间戳
pub fn parse_item(rule: &SourceRule, item: &Value, index: usize, stamp: i64) -> CanonicalImage {
    let paths = &rule.paths;
    let prefix = rule.image_prefix.as_deref();

    let thumb = optional_string(paths.thumb.as_deref(), item)
        .map(|raw| apply_prefix(&raw, prefix))
        .unwrap_or_default();
    let full = optional_string(paths.full.as_deref(), item)
        .map(|raw| apply_prefix(&raw, prefix))
        .unwrap_or_default();
    let (thumb, full) = match (thumb.is_empty(), full.is_empty()) {
        (true, false) => (full.clone(), full),
        (false, true) => (thumb.clone(), thumb),
        _ => (thumb, full),
    };

    let id = optional_string(paths.id.as_deref(), item)
        .or_else(|| Some(full.clone()).filter(|s| !s.is_empty()))
        .or_else(|| Some(thumb.clone()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| format!("{}-{}-{}", rule.id, stamp, index));

    let mut image = CanonicalImage::new(id, rule.id.clone());
    image.thumb_url = thumb;
    image.full_url = full;
    image.width = first_dimension(paths.width.as_deref(), DEFAULT_WIDTH_PATHS, item);
    image.height = first_dimension(paths.height.as_deref(), DEFAULT_HEIGHT_PATHS, item);
    image.grade = candidates(paths.grade.iter().map(String::as_str), DEFAULT_GRADE_PATHS)
        .find_map(|p| resolve(p, item).and_then(grade_of));
    image.tags = candidates(paths.tags.iter().map(String::as_str), DEFAULT_TAG_PATHS)
        .filter_map(|p| resolve(p, item))
        .map(normalize_tags)
        .find(|tags| !tags.is_empty())
        .unwrap_or_default();
    image.uploader = first_string(&paths.uploader, DEFAULT_UPLOADER_PATHS, item);
    image.views = first_string(&paths.views, DEFAULT_VIEWS_PATHS, item);
    image.favorites = first_string(&paths.favorites, DEFAULT_FAVORITES_PATHS, item);
    image.file_size = first_string(&paths.file_size, DEFAULT_FILE_SIZE_PATHS, item);
    image.created_at = first_string(&paths.created_at, DEFAULT_CREATED_AT_PATHS, item);
    image.mime_type = first_string(&paths.mime_type, DEFAULT_MIME_PATHS, item);
    image.detail_url = first_string(&paths.detail, &[], item);
    if !image.detail_url.is_empty() {
        image.detail_url = apply_prefix(&image.detail_url, prefix);
    }

    image.is_ai = image
        .tags
        .iter()
        .any(|t| AI_TAGS.contains(&t.to_lowercase().as_str()));
    image.is_ugoira = image.tags.iter().any(|t| t.eq_ignore_ascii_case("ugoira"))
        || image.mime_type.to_ascii_lowercase().contains("zip");
    image
}

/// 规范化标签
///
/// 接受字符串数组、带 `name`/`tag` 字段的对象数组或分隔符拼接的字符串，
/// 返回去空白、去空、按首次出现顺序去重后的标签。
pub fn normalize_tags(value: &Value) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                let text = match item {
                    Value::Object(map) => map
                        .get("name")
                        .or_else(|| map.get("tag"))
                        .and_then(scalar_to_string),
                    other => scalar_to_string(other),
                };
                raw.extend(text);
            }
        }
        Value::String(s) => raw.extend(
            s.split([',', ';', '|', ' '])
                .map(str::to_string),
        ),
        _ => {}
    }

    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// 尽力把数值或数字字符串转换为尺寸，无法解析时为 0
pub fn coerce_dimension(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u32))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn grade_of(value: &Value) -> Option<Grade> {
    match value {
        Value::Number(n) => n.as_i64().and_then(Grade::from_restriction),
        Value::String(s) => Grade::parse(s),
        _ => None,
    }
}

fn optional_string(path: Option<&str>, item: &Value) -> Option<String> {
    path.and_then(|p| resolve_string(p, item))
}

fn candidates<'a>(
    configured: impl Iterator<Item = &'a str>,
    defaults: &'a [&'a str],
) -> impl Iterator<Item = &'a str> {
    configured.chain(defaults.iter().copied())
}

fn first_string(configured: &[String], defaults: &[&str], item: &Value) -> String {
    candidates(configured.iter().map(String::as_str), defaults)
        .find_map(|p| resolve_string(p, item))
        .unwrap_or_default()
}

fn first_dimension(configured: Option<&str>, defaults: &[&str], item: &Value) -> u32 {
    candidates(configured.into_iter(), defaults)
        .map(|p| coerce_dimension(resolve(p, item)))
        .find(|v| *v > 0)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "response_parser_test.rs"]
mod tests;
