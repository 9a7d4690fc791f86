// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 源规则
///
/// 描述一个第三方JSON HTTP API：如何构造请求、如何分页、如何把响应映射为图片实体。
/// 规则加载后不可变。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceRule {
    /// 规则唯一标识
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 指定专用引擎（如 `pixiv`），为空时使用通用规则引擎
    pub engine: Option<String>,
    /// 请求URL，可包含 `{keyword}` / `{word}` / `{q}` 模板
    #[serde(alias = "request_url")]
    pub url: String,
    /// 静态请求头
    pub headers: BTreeMap<String, String>,
    /// 固定查询参数
    #[serde(alias = "fixed_params")]
    pub params: BTreeMap<String, String>,
    /// API Key 配置
    #[serde(alias = "api_key")]
    pub api_key: Option<ApiKeyConfig>,
    /// 关键词参数名
    #[serde(alias = "keyword_param")]
    pub keyword_param: Option<String>,
    /// 默认关键词
    #[serde(alias = "default_keyword")]
    pub default_keyword: Option<String>,
    /// 是否必须提供关键词
    #[serde(alias = "keyword_required")]
    pub keyword_required: bool,
    /// 有序的过滤器定义
    pub filters: Vec<Filter>,
    /// 分页配置
    pub pagination: PaginationConfig,
    /// 字段路径规则
    pub paths: PathRules,
    /// 图片URL前缀，用于补全相对地址
    #[serde(alias = "image_prefix")]
    pub image_prefix: Option<String>,
    /// 响应模式
    #[serde(alias = "response_mode")]
    pub response_mode: ResponseMode,
    /// 下载图片时额外需要的请求头（如 Referer）
    #[serde(alias = "image_headers")]
    pub image_headers: BTreeMap<String, String>,
    /// 平台ID形状的正则，匹配时相似查询使用 `like:<id>`
    #[serde(alias = "like_id_pattern")]
    pub like_id_pattern: Option<String>,
}

impl SourceRule {
    /// 从JSON文本解析规则
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// 从YAML文本解析规则
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// 查找过滤器定义
    pub fn filter(&self, key: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.key == key)
    }

    /// 关键词参数名，默认 `q`
    pub fn keyword_param_name(&self) -> &str {
        self.keyword_param.as_deref().unwrap_or("q")
    }
}

/// API Key 放置位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPlacement {
    /// 作为请求头发送
    Header,
    /// 作为查询参数发送
    #[default]
    Query,
}

/// API Key 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeyConfig {
    /// 参数名或请求头名，查询参数默认 `apikey`
    pub name: Option<String>,
    /// 放置位置
    pub placement: KeyPlacement,
    /// 值前缀（如 `Bearer `）
    pub prefix: Option<String>,
    /// 密钥值
    pub value: String,
}

impl ApiKeyConfig {
    pub fn param_name(&self) -> &str {
        match (&self.name, self.placement) {
            (Some(name), _) if !name.trim().is_empty() => name,
            (_, KeyPlacement::Header) => "Authorization",
            (_, KeyPlacement::Query) => "apikey",
        }
    }

    pub fn rendered_value(&self) -> String {
        format!("{}{}", self.prefix.as_deref().unwrap_or(""), self.value)
    }
}

/// 过滤器值编码策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeStrategy {
    /// 用分隔符拼接为单个参数
    #[default]
    Join,
    /// 笛卡尔展开为多个请求
    Merge,
    /// 重复的查询参数
    Repeat,
}

/// 过滤器选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOption {
    pub label: String,
    pub value: String,
}

/// 过滤器定义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    /// 参数键
    pub key: String,
    /// 显示名称
    pub label: String,
    /// 是否允许多选
    pub multiple: bool,
    /// 编码策略
    pub encode: EncodeStrategy,
    /// 拼接分隔符，默认 `,`
    pub separator: Option<String>,
    /// 可选项
    pub options: Vec<FilterOption>,
}

impl Filter {
    pub fn separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(",")
    }
}

/// 分页模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    #[default]
    Page,
    Offset,
    Cursor,
}

/// 分页配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationConfig {
    pub mode: PaginationMode,
    /// 分页参数名，默认随模式为 `page` / `offset` / `cursor`
    pub param: Option<String>,
    #[serde(alias = "page_size")]
    pub page_size: Option<u32>,
    /// 同时发送页大小时使用的参数名
    #[serde(alias = "size_param")]
    pub size_param: Option<String>,
    /// page 模式下第一页的编号
    #[serde(alias = "first_page")]
    pub first_page: Option<u32>,
    /// 响应中游标所在路径
    #[serde(alias = "cursor_path")]
    pub cursor_path: Option<String>,
}

impl PaginationConfig {
    pub fn param_name(&self) -> &str {
        if let Some(param) = self.param.as_deref().filter(|p| !p.trim().is_empty()) {
            return param;
        }
        match self.mode {
            PaginationMode::Page => "page",
            PaginationMode::Offset => "offset",
            PaginationMode::Cursor => "cursor",
        }
    }
}

/// 字段路径规则
///
/// 元数据字段均为候选路径列表，第一个得到非空值的路径胜出。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathRules {
    pub list: String,
    pub id: Option<String>,
    pub thumb: Option<String>,
    pub full: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub grade: Option<String>,
    pub tags: Vec<String>,
    pub uploader: Vec<String>,
    pub views: Vec<String>,
    pub favorites: Vec<String>,
    #[serde(alias = "file_size")]
    pub file_size: Vec<String>,
    #[serde(alias = "created_at")]
    pub created_at: Vec<String>,
    #[serde(alias = "mime_type")]
    pub mime_type: Vec<String>,
    /// 详情页URL候选路径
    pub detail: Vec<String>,
}

/// 响应模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Json,
    Random,
}
