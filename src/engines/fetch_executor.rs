// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::Settings;
use crate::domain::models::image::CanonicalImage;
use crate::domain::models::source_rule::{ResponseMode, SourceRule};
use crate::domain::services::similar_query::{compile_id_shape, similar_query};
use crate::domain::source::engine::{FetchError, FetchQuery, ImageSource};
use crate::engines::http_client::{HttpClient, RequestSpec};
use crate::engines::pagination::{apply_page_size, PaginationStrategy};
use crate::engines::random_probe::RandomProbe;
use crate::engines::request_builder::{self, to_query_pairs, BuiltRequest};
use crate::engines::{path_resolver, response_parser};
use crate::infrastructure::cache::cursor_cache::{CursorCache, CursorKey};
use crate::infrastructure::observability::metrics;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 通用规则引擎
///
/// 按源规则构造请求，执行 json / merge / random 三种模式，并把响应归一化为 [`CanonicalImage`]。
/// 游标缓存由构造方注入，按引擎实例共享。
pub struct RuleEngine {
    http: HttpClient,
    cursors: Arc<CursorCache>,
    merge_concurrency: usize,
    random: RandomProbe,
    /// 每个规则最近一次请求使用的请求头
    last_headers: DashMap<String, BTreeMap<String, String>>,
}

impl RuleEngine {
    /// 创建规则引擎
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    ///
    /// # 返回值
    ///
    /// * `Ok(RuleEngine)` - 引擎实例
    /// * `Err(FetchError)` - HTTP客户端构建失败
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = HttpClient::new(&settings.http)?;
        let cursors = Arc::new(CursorCache::from_settings(&settings.cursor_cache));
        Ok(Self::with_parts(http, cursors, settings))
    }

    /// 使用外部提供的HTTP客户端和游标缓存创建引擎
    pub fn with_parts(http: HttpClient, cursors: Arc<CursorCache>, settings: &Settings) -> Self {
        Self {
            random: RandomProbe::new(http.clone(), &settings.random),
            http,
            cursors,
            merge_concurrency: settings.merge.concurrency.max(1),
            last_headers: DashMap::new(),
        }
    }

    pub fn cursor_cache(&self) -> &Arc<CursorCache> {
        &self.cursors
    }

    /// 抓取一页结果
    ///
    /// # 参数
    ///
    /// * `rule` - 源规则
    /// * `query` - 页码、关键词与过滤器
    /// * `cancel` - 取消令牌
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<CanonicalImage>)` - 按id去重后的结果，空列表表示没有更多结果
    /// * `Err(FetchError)` - 配置错误在任何网络请求之前返回；网络和HTTP错误原样向上传递
    pub async fn fetch_page(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let mut built = request_builder::build(rule, query)?;
        self.remember_headers(rule, &built);

        let mode = mode_label(rule, &built);
        metrics::record_request(mode);
        let start = Instant::now();

        let result = match rule.response_mode {
            ResponseMode::Random => self.random.fetch(rule, &built, cancel).await,
            ResponseMode::Json => self.fetch_json(rule, query, &mut built, cancel).await,
        };
        metrics::record_duration(mode, start.elapsed());

        match result {
            Ok(images) => {
                info!(rule = %rule.id, mode, page = query.page, count = images.len(), "Fetch completed");
                Ok(images)
            }
            Err(e) => {
                metrics::record_failure(e.kind());
                warn!(rule = %rule.id, mode, page = query.page, error = %e, "Fetch failed");
                Err(e)
            }
        }
    }

    async fn fetch_json(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        built: &mut BuiltRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let key = CursorKey::new(&rule.id, built.keyword.as_deref(), &query.filters);
        let strategy = PaginationStrategy::for_rule(rule);
        apply_page_size(rule, &mut built.params);
        strategy.apply(query.page, &mut built.params, &self.cursors, &key);

        let param_sets = built.param_sets();
        debug!(rule = %rule.id, sub_requests = param_sets.len(), "Issuing requests");

        let secret = rule.api_key.as_ref().map(|k| k.param_name());
        let timeout = self.http.json_timeout();
        let url = built.url.as_str();
        let headers = &built.headers;

        let bodies: Vec<Value> = stream::iter(param_sets)
            .map(|set| async move {
                let pairs = to_query_pairs(&set);
                let spec = RequestSpec::new(url, &pairs, headers).with_secret(secret);
                self.http.get_json(spec, timeout, cancel).await
            })
            .buffered(self.merge_concurrency)
            .try_collect()
            .await?;

        for body in &bodies {
            if strategy.record(body, &self.cursors, &key) {
                break;
            }
        }

        let stamp = chrono::Utc::now().timestamp_micros();
        let mut images: Vec<CanonicalImage> = Vec::new();
        for body in &bodies {
            let parsed = response_parser::parse_with(rule, body, stamp, images.len());
            images.extend(parsed);
        }
        Ok(dedupe_by_id(images))
    }

    /// 通过详情地址补充元数据
    ///
    /// 详情响应可以是对象本身、`data` 包装的对象，或列表路径下的第一项。
    /// 只填充尚未获得的字段；没有详情地址时不做任何事。
    pub async fn enrich(
        &self,
        rule: &SourceRule,
        image: &mut CanonicalImage,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        if image.detail_url.trim().is_empty() {
            return Ok(());
        }
        let (params, headers) = request_builder::auth(rule);
        let pairs = to_query_pairs(&params);
        let secret = rule.api_key.as_ref().map(|k| k.param_name());
        let spec = RequestSpec::new(&image.detail_url, &pairs, &headers).with_secret(secret);
        let body = self
            .http
            .get_json(spec, self.http.detail_timeout(), cancel)
            .await?;

        let Some(item) = detail_record(rule, &body) else {
            debug!(rule = %rule.id, id = %image.id, "Detail response has no record");
            return Ok(());
        };
        let stamp = chrono::Utc::now().timestamp_micros();
        let detail = response_parser::parse_item(rule, item, 0, stamp);
        image.merge_metadata(&detail);
        Ok(())
    }

    fn remember_headers(&self, rule: &SourceRule, built: &BuiltRequest) {
        let mut headers = built.headers.clone();
        headers.extend(rule.image_headers.clone());
        self.last_headers.insert(rule.id.clone(), headers);
    }
}

#[async_trait]
impl ImageSource for RuleEngine {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn supports(&self, rule: &SourceRule) -> bool {
        rule.engine
            .as_deref()
            .map(|e| e.trim().is_empty() || e.eq_ignore_ascii_case("rule"))
            .unwrap_or(true)
    }

    async fn fetch(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        self.fetch_page(rule, query, cancel).await
    }

    async fn similar(
        &self,
        rule: &SourceRule,
        seed: &CanonicalImage,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let shape = rule.like_id_pattern.as_deref().and_then(compile_id_shape);
        let text = similar_query(seed, shape.as_ref());
        if text.is_empty() {
            debug!(rule = %rule.id, seed = %seed.id, "No usable similar query");
            return Ok(Vec::new());
        }
        let images = self
            .fetch_page(rule, &FetchQuery::new(1, Some(&text)), cancel)
            .await?;
        Ok(images.into_iter().filter(|i| i.id != seed.id).collect())
    }

    fn image_headers(&self, rule: &SourceRule) -> HashMap<String, String> {
        match self.last_headers.get(&rule.id) {
            Some(headers) => headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => {
                let (_, mut headers) = request_builder::auth(rule);
                headers.extend(rule.image_headers.clone());
                headers.into_iter().collect()
            }
        }
    }
}

/// 按id去重，保留首次出现的记录
pub fn dedupe_by_id(images: Vec<CanonicalImage>) -> Vec<CanonicalImage> {
    let mut seen = HashSet::with_capacity(images.len());
    images
        .into_iter()
        .filter(|image| seen.insert(image.id.clone()))
        .collect()
}

fn detail_record<'a>(rule: &SourceRule, body: &'a Value) -> Option<&'a Value> {
    if let Some(first) = path_resolver::resolve_list(&rule.paths.list, body).into_iter().next() {
        return Some(first);
    }
    match body {
        Value::Object(map) => match map.get("data") {
            Some(data @ Value::Object(_)) => Some(data),
            _ => Some(body),
        },
        _ => None,
    }
}

fn mode_label(rule: &SourceRule, built: &BuiltRequest) -> &'static str {
    match rule.response_mode {
        ResponseMode::Random => "random",
        ResponseMode::Json if built.is_merge() => "merge",
        ResponseMode::Json => "json",
    }
}
