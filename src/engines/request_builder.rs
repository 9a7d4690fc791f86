// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source_rule::{EncodeStrategy, KeyPlacement, SourceRule};
use crate::domain::source::engine::{FetchError, FetchQuery, FilterValue};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// URL中由关键词替换的模板占位符
pub const KEYWORD_TOKENS: [&str; 3] = ["{keyword}", "{word}", "{q}"];

/// 单个查询参数值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    /// 以重复的查询参数发送
    Repeated(Vec<String>),
}

/// 一组查询参数，按键有序
pub type ParamSet = BTreeMap<String, ParamValue>;

/// 构造完成的请求
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    /// 已填充模板的URL
    pub url: String,
    /// 基础参数集
    pub params: ParamSet,
    /// 请求头（含API Key）
    pub headers: BTreeMap<String, String>,
    /// merge 编码的过滤器，按键排列
    pub merge: Vec<(String, Vec<String>)>,
    /// 解析后的关键词
    pub keyword: Option<String>,
}

impl BuiltRequest {
    /// 展开 merge 过滤器的笛卡尔积
    ///
    /// 没有 merge 过滤器时返回只含基础参数集的列表。子请求数等于各值列表长度之积。
    pub fn param_sets(&self) -> Vec<ParamSet> {
        let mut sets = vec![self.params.clone()];
        for (key, values) in &self.merge {
            let mut next = Vec::with_capacity(sets.len() * values.len());
            for set in &sets {
                for value in values {
                    let mut expanded = set.clone();
                    expanded.insert(key.clone(), ParamValue::Single(value.clone()));
                    next.push(expanded);
                }
            }
            sets = next;
        }
        sets
    }

    pub fn is_merge(&self) -> bool {
        !self.merge.is_empty()
    }
}

/// 把参数集展开为查询键值对，重复参数逐个展开
pub fn to_query_pairs(params: &ParamSet) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        match value {
            ParamValue::Single(v) => pairs.push((key.clone(), v.clone())),
            ParamValue::Repeated(vs) => {
                pairs.extend(vs.iter().map(|v| (key.clone(), v.clone())));
            }
        }
    }
    pairs
}

/// 根据规则和调用参数构造请求
///
/// 关键词以 `keywordParam`（默认 `q`）作为查询参数发送，同时填充URL模板。
/// URL带模板且规则没有显式配置 `keywordParam` 时，关键词只出现在路径中。
///
/// # 参数
///
/// * `rule` - 源规则
/// * `query` - 关键词、页码与过滤器选择
///
/// # 返回值
///
/// * `Ok(BuiltRequest)` - 基础参数集、请求头和待展开的 merge 过滤器
/// * `Err(FetchError::InvalidConfiguration)` - 缺少必需关键词或模板无法填充，不发生任何网络请求
pub fn build(rule: &SourceRule, query: &FetchQuery) -> Result<BuiltRequest, FetchError> {
    if rule.url.trim().is_empty() {
        return Err(FetchError::InvalidConfiguration(format!(
            "rule '{}' has no request URL",
            rule.id
        )));
    }

    let mut params: ParamSet = rule
        .params
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), ParamValue::Single(v.clone())))
        .collect();
    let (auth_params, headers) = auth(rule);
    params.extend(auth_params);

    let keyword = resolve_keyword(rule, query)?;
    let has_template = KEYWORD_TOKENS.iter().any(|t| rule.url.contains(t));
    let url = fill_template(rule, keyword.as_deref(), has_template)?;

    if let Some(kw) = keyword.as_deref() {
        // 路径模板已携带关键词，除非显式要求同时作为查询参数
        if rule.keyword_param.is_some() || !has_template {
            params.insert(
                rule.keyword_param_name().to_string(),
                ParamValue::Single(kw.to_string()),
            );
        }
    }

    let mut merge = Vec::new();
    for (key, value) in &query.filters {
        let encode = rule.filter(key).map(|f| f.encode).unwrap_or_default();
        match value {
            FilterValue::Single(v) => {
                if !v.trim().is_empty() {
                    params.insert(key.clone(), ParamValue::Single(v.clone()));
                }
            }
            FilterValue::List(vs) => {
                let mut values: Vec<String> = Vec::with_capacity(vs.len());
                for v in vs.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
                    if !values.iter().any(|seen| seen == v) {
                        values.push(v.to_string());
                    }
                }
                if values.is_empty() {
                    continue;
                }
                match encode {
                    EncodeStrategy::Merge => {
                        params.remove(key);
                        merge.push((key.clone(), values));
                    }
                    EncodeStrategy::Repeat => {
                        params.insert(key.clone(), ParamValue::Repeated(values));
                    }
                    EncodeStrategy::Join => {
                        let separator = rule.filter(key).map(|f| f.separator()).unwrap_or(",");
                        params.insert(key.clone(), ParamValue::Single(values.join(separator)));
                    }
                }
            }
        }
    }

    Ok(BuiltRequest {
        url,
        params,
        headers,
        merge,
        keyword,
    })
}

/// 规则的静态请求头与API Key
///
/// # 返回值
///
/// (查询位置的API Key参数, 静态请求头加请求头位置的API Key)
pub fn auth(rule: &SourceRule) -> (ParamSet, BTreeMap<String, String>) {
    let mut params = ParamSet::new();
    let mut headers = rule.headers.clone();
    if let Some(api_key) = rule.api_key.as_ref().filter(|k| !k.value.trim().is_empty()) {
        match api_key.placement {
            KeyPlacement::Header => {
                headers.insert(api_key.param_name().to_string(), api_key.rendered_value());
            }
            KeyPlacement::Query => {
                params.insert(
                    api_key.param_name().to_string(),
                    ParamValue::Single(api_key.rendered_value()),
                );
            }
        }
    }
    (params, headers)
}

/// 关键词解析顺序：显式查询 → 规则默认关键词；必需而缺失时报错
fn resolve_keyword(rule: &SourceRule, query: &FetchQuery) -> Result<Option<String>, FetchError> {
    let keyword = query
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .or_else(|| {
            rule.default_keyword
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
        })
        .map(str::to_string);

    if keyword.is_none() && rule.keyword_required {
        return Err(FetchError::InvalidConfiguration(format!(
            "rule '{}' requires a keyword",
            rule.id
        )));
    }
    Ok(keyword)
}

fn fill_template(
    rule: &SourceRule,
    keyword: Option<&str>,
    has_template: bool,
) -> Result<String, FetchError> {
    let mut url = rule.url.trim().to_string();
    if has_template {
        let kw = keyword.ok_or_else(|| {
            FetchError::InvalidConfiguration(format!(
                "rule '{}' has a keyword template but no keyword",
                rule.id
            ))
        })?;
        let encoded = urlencoding::encode(kw);
        for token in KEYWORD_TOKENS {
            url = url.replace(token, &encoded);
        }
    }
    Url::parse(&url).map_err(|e| {
        FetchError::InvalidConfiguration(format!("rule '{}' has a bad URL: {}", rule.id, e))
    })?;
    Ok(url)
}

#[cfg(test)]
#[path = "request_builder_test.rs"]
mod tests;
