// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 合并元数据时视为“未填充”的值
const UNSET_SENTINELS: &[&str] = &["", "unknown", "null", "none", "-", "n/a"];

/// 内容分级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Safe,
    Sketchy,
    Nsfw,
}

impl Grade {
    /// 把各图片接口的评级词汇映射为分级
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "safe" | "s" | "general" | "g" | "sfw" => Some(Grade::Safe),
            "sketchy" | "q" | "questionable" | "sensitive" | "r-18" | "r18" => Some(Grade::Sketchy),
            "nsfw" | "e" | "explicit" | "r-18g" | "r18g" => Some(Grade::Nsfw),
            _ => None,
        }
    }

    /// 上游限制标记：`<= 0` 无，`1` 为 sketchy，`>= 2` 为 nsfw
    pub fn from_restriction(flag: i64) -> Option<Self> {
        match flag {
            f if f <= 0 => None,
            1 => Some(Grade::Sketchy),
            _ => Some(Grade::Nsfw),
        }
    }
}

/// 规范化图片记录
///
/// 所有上游响应格式都映射为该结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalImage {
    pub id: String,
    pub source_id: String,
    pub thumb_url: String,
    pub full_url: String,
    /// 0 表示未知
    pub width: u32,
    pub height: u32,
    pub grade: Option<Grade>,
    pub tags: Vec<String>,
    pub uploader: String,
    pub views: String,
    pub favorites: String,
    pub file_size: String,
    pub created_at: String,
    pub mime_type: String,
    pub detail_url: String,
    pub is_ugoira: bool,
    pub is_ai: bool,
}

impl CanonicalImage {
    pub fn new(id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    /// 合并低优先级记录的元数据
    ///
    /// 已填充的字段不会被覆盖，标签取并集
    ///
    /// # 参数
    ///
    /// * `other` - 低优先级记录
    pub fn merge_metadata(&mut self, other: &CanonicalImage) {
        merge_field(&mut self.thumb_url, &other.thumb_url);
        merge_field(&mut self.full_url, &other.full_url);
        merge_field(&mut self.uploader, &other.uploader);
        merge_field(&mut self.views, &other.views);
        merge_field(&mut self.favorites, &other.favorites);
        merge_field(&mut self.file_size, &other.file_size);
        merge_field(&mut self.created_at, &other.created_at);
        merge_field(&mut self.mime_type, &other.mime_type);
        merge_field(&mut self.detail_url, &other.detail_url);
        if self.width == 0 {
            self.width = other.width;
        }
        if self.height == 0 {
            self.height = other.height;
        }
        if self.grade.is_none() {
            self.grade = other.grade;
        }
        for tag in &other.tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
        self.is_ugoira |= other.is_ugoira;
        self.is_ai |= other.is_ai;
    }
}

/// 元数据值为空或为已知的“未设置”标记时返回 true
pub fn is_unset(value: &str) -> bool {
    let trimmed = value.trim();
    UNSET_SENTINELS
        .iter()
        .any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// `current` 未设置时取 `incoming`，否则保持不变
pub fn merge_field(current: &mut String, incoming: &str) {
    if is_unset(current) && !is_unset(incoming) {
        *current = incoming.to_string();
    }
}
