// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::image::CanonicalImage;
use regex::Regex;

/// 相似查询最多携带的标签数
pub const MAX_SIMILAR_TAGS: usize = 4;

/// 构造相似图片的回退查询
///
/// 优先级：种子id符合平台id形状时用 `like:<id>`，其次是最多四个清洗后的标签，
/// 再次是 `@上传者`，都没有时返回空字符串。
///
/// # 参数
///
/// * `seed` - 种子图片
/// * `like_id_shape` - 平台id形状，`None` 表示不使用 `like:` 查询
pub fn similar_query(seed: &CanonicalImage, like_id_shape: Option<&Regex>) -> String {
    if let Some(shape) = like_id_shape {
        if !seed.id.is_empty() && shape.is_match(&seed.id) {
            return format!("like:{}", seed.id);
        }
    }

    let tags: Vec<&str> = seed
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| is_searchable_tag(t))
        .take(MAX_SIMILAR_TAGS)
        .collect();
    if !tags.is_empty() {
        return tags.join(" ");
    }

    let uploader = seed.uploader.trim();
    if !uploader.is_empty() && !crate::domain::models::image::is_unset(uploader) {
        return format!("@{}", uploader);
    }

    String::new()
}

/// 编译平台id形状并加上首尾锚点，部分匹配不算命中
pub fn compile_id_shape(pattern: &str) -> Option<Regex> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return None;
    }
    let anchored = format!(
        "^(?:{})$",
        trimmed.trim_start_matches('^').trim_end_matches('$')
    );
    Regex::new(&anchored).ok()
}

/// 丢弃少于两个字符的标签、AI 标记和评级前缀标签
fn is_searchable_tag(tag: &str) -> bool {
    if tag.chars().count() < 2 {
        return false;
    }
    let lower = tag.to_lowercase();
    if lower == "ai"
        || lower.starts_with("ai-")
        || lower.starts_with("ai_")
        || lower.starts_with("ai ")
        || lower.starts_with("ai生成")
        || lower.contains("ai-generated")
        || lower.contains("ai generated")
        || lower.contains("ai_generated")
    {
        return false;
    }
    !(lower.starts_with("r-18") || lower.starts_with("r18") || lower.starts_with("rating:"))
}
