// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source_rule::{PaginationMode, SourceRule};
use crate::engines::path_resolver;
use crate::engines::request_builder::{ParamSet, ParamValue};
use crate::infrastructure::cache::cursor_cache::{CursorCache, CursorKey};
use serde_json::Value;
use tracing::debug;

/// offset 模式未配置页大小时用于推断页大小的参数名
const PAGE_SIZE_HINTS: [&str; 5] = ["per_page", "limit", "rows", "count", "page_size"];

/// 规则和参数都没有给出页大小时的默认值
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// 分页策略
///
/// 根据页码计算分页参数，游标模式还负责读写游标缓存
#[derive(Debug, Clone, PartialEq)]
pub enum PaginationStrategy {
    Page {
        param: String,
        first_page: u32,
    },
    Offset {
        param: String,
        page_size: Option<u32>,
    },
    Cursor {
        param: String,
        cursor_path: Option<String>,
    },
}

impl PaginationStrategy {
    pub fn for_rule(rule: &SourceRule) -> Self {
        let config = &rule.pagination;
        let param = config.param_name().to_string();
        match config.mode {
            PaginationMode::Page => PaginationStrategy::Page {
                param,
                first_page: config.first_page.unwrap_or(1),
            },
            PaginationMode::Offset => PaginationStrategy::Offset {
                param,
                page_size: config.page_size.filter(|s| *s > 0),
            },
            PaginationMode::Cursor => PaginationStrategy::Cursor {
                param,
                cursor_path: config.cursor_path.clone().filter(|p| !p.trim().is_empty()),
            },
        }
    }

    /// 为第 `page` 页（从1开始）写入分页参数
    ///
    /// 游标模式下 `page <= 1` 视为重新开始并清除缓存的游标；
    /// 之后的页没有缓存游标时省略该参数，请求照常发出。
    ///
    /// # 参数
    ///
    /// * `page` - 页码
    /// * `params` - 待写入的参数集
    /// * `cache` - 游标缓存
    /// * `key` - 当前查询的游标键
    pub fn apply(&self, page: u32, params: &mut ParamSet, cache: &CursorCache, key: &CursorKey) {
        let page = page.max(1);
        match self {
            PaginationStrategy::Page { param, first_page } => {
                let value = (page - 1).saturating_add(*first_page);
                params.insert(param.clone(), ParamValue::Single(value.to_string()));
            }
            PaginationStrategy::Offset { param, page_size } => {
                let size = page_size.unwrap_or_else(|| guess_page_size(params));
                let offset = (page as u64 - 1) * size as u64;
                params.insert(param.clone(), ParamValue::Single(offset.to_string()));
            }
            PaginationStrategy::Cursor { param, .. } => {
                if page <= 1 {
                    cache.invalidate(key);
                    params.remove(param);
                    return;
                }
                match cache.get(key) {
                    Some(token) => {
                        params.insert(param.clone(), ParamValue::Single(token));
                    }
                    None => {
                        debug!(
                            rule = %key.rule_id,
                            page,
                            "No cursor cached for this page, requesting without one"
                        );
                        params.remove(param);
                    }
                }
            }
        }
    }

    /// 记录成功响应中的游标，覆盖之前的值
    ///
    /// # 返回值
    ///
    /// 是否写入了游标
    pub fn record(&self, body: &Value, cache: &CursorCache, key: &CursorKey) -> bool {
        let PaginationStrategy::Cursor {
            cursor_path: Some(path),
            ..
        } = self
        else {
            return false;
        };
        match path_resolver::resolve_string(path, body) {
            Some(token) => {
                cache.put(key.clone(), token);
                true
            }
            None => false,
        }
    }
}

/// 同时配置了 `sizeParam` 和 `pageSize` 时发送页大小
pub fn apply_page_size(rule: &SourceRule, params: &mut ParamSet) {
    let config = &rule.pagination;
    if let (Some(name), Some(size)) = (config.size_param.as_deref(), config.page_size) {
        if !name.trim().is_empty() && size > 0 {
            params.insert(name.to_string(), ParamValue::Single(size.to_string()));
        }
    }
}

fn guess_page_size(params: &ParamSet) -> u32 {
    PAGE_SIZE_HINTS
        .iter()
        .filter_map(|name| match params.get(*name) {
            Some(ParamValue::Single(v)) => v.trim().parse::<u32>().ok(),
            _ => None,
        })
        .find(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}
