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

use crate::config::settings::{ScraperSettings, Settings};
use crate::domain::models::image::{CanonicalImage, Grade};
use crate::domain::models::source_rule::SourceRule;
use crate::domain::repositories::session_repository::SessionStore;
use crate::domain::services::similar_query::{compile_id_shape, similar_query};
use crate::domain::source::engine::{FetchError, FetchQuery, FilterValue, ImageSource, LoginState};
use crate::engines::fetch_executor::dedupe_by_id;
use crate::engines::http_client::{HttpClient, RequestSpec};
use crate::engines::path_resolver::{resolve, resolve_list, resolve_string};
use crate::engines::response_parser::{coerce_dimension, normalize_tags};
use crate::infrastructure::cache::login_cache::LoginCache;
use crate::infrastructure::observability::metrics;
use crate::infrastructure::scraper::urls;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 规则 `engine` 字段取该值时由本客户端处理
pub const ENGINE_NAME: &str = "pixiv";

pub const ORDER_FILTER: &str = "order";
pub const MODE_FILTER: &str = "mode";
pub const DEFAULT_ORDER: &str = "date_d";
pub const DEFAULT_MODE: &str = "all";
const SAFE_MODE: &str = "safe";

/// 详情阶段单项的结果
enum DetailOutcome {
    Resolved { full_url: String, width: u32, height: u32 },
    Failed,
}

/// 专用插画站点抓取客户端
///
/// 持有凭据工作副本和登录状态缓存。搜索分两阶段：
/// 先取id和缩略图，再用有界并发的详情请求补全大图地址；
/// 单项失败或超时退回由缩略图推导的地址。
pub struct ScraperClient {
    http: HttpClient,
    base_url: String,
    detail_concurrency: usize,
    item_timeout: Duration,
    recommend_limit: u32,
    credential: RwLock<Option<String>>,
    login: LoginCache,
    store: Arc<dyn SessionStore>,
}

impl ScraperClient {
    /// 创建抓取客户端
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    /// * `store` - 凭据持久化存储
    pub fn new(settings: &Settings, store: Arc<dyn SessionStore>) -> Result<Self, FetchError> {
        let http = HttpClient::new(&settings.http)?;
        Ok(Self::with_http(http, &settings.scraper, store))
    }

    pub fn with_http(http: HttpClient, settings: &ScraperSettings, store: Arc<dyn SessionStore>) -> Self {
        Self {
            http,
            base_url: urls::normalize_base(&settings.base_url),
            detail_concurrency: settings.detail_concurrency.max(1),
            item_timeout: Duration::from_secs(settings.item_timeout_secs),
            recommend_limit: settings.recommend_limit.max(1),
            credential: RwLock::new(None),
            login: LoginCache::new(Duration::from_secs(settings.login_ttl_secs)),
            store,
        }
    }

    /// 覆盖单项详情超时
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn credential(&self) -> Option<String> {
        self.credential.read().clone()
    }

    /// 更新凭据
    ///
    /// 先更新内存副本并使登录缓存失效，再写入持久化存储
    pub async fn set_credential(&self, source_id: &str, credential: Option<&str>) -> anyhow::Result<()> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        *self.credential.write() = credential.clone();
        self.login.invalidate();
        self.store.save_credential(source_id, credential.as_deref()).await
    }

    /// 不发起网络请求的登录状态
    pub fn login_state(&self) -> LoginState {
        self.login.state(self.credential().as_deref())
    }

    async fn login_status(&self, rule: &SourceRule, cancel: &CancellationToken) -> LoginState {
        let credential = self.credential();
        self.login
            .get_or_check(credential.as_deref(), |cookie| async move {
                let mut headers = self.request_headers(rule);
                headers.insert("Cookie".to_string(), cookie);
                let url = urls::login_check_url(&self.base_url);
                let spec = RequestSpec::new(&url, &[], &headers).with_secret(Some("Cookie"));
                match self.http.get_json(spec, self.http.json_timeout(), cancel).await {
                    Ok(body) => Ok(body.get("error") == Some(&Value::Bool(false))),
                    Err(FetchError::HttpClientError { status: 401 | 403 }) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    /// 请求头：规则静态请求头、Referer 与会话 Cookie
    fn request_headers(&self, rule: &SourceRule) -> BTreeMap<String, String> {
        let mut headers = rule.headers.clone();
        headers.insert("Referer".to_string(), format!("{}/", self.base_url));
        if let Some(cookie) = self.credential() {
            headers.insert("Cookie".to_string(), cookie);
        }
        headers
    }

    /// 未确认登录时，把需要登录的筛选项降级为安全默认值
    ///
    /// 只有请求了特权选项且带有凭据时才会检查登录。
    ///
    /// # 返回值
    ///
    /// (排序, 模式)
    async fn effective_filters(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        cancel: &CancellationToken,
    ) -> (String, String) {
        let order = single_filter(query, ORDER_FILTER).unwrap_or_else(|| DEFAULT_ORDER.to_string());
        let mode = single_filter(query, MODE_FILTER).unwrap_or_else(|| DEFAULT_MODE.to_string());

        let privileged_order = is_privileged_order(&order);
        let privileged_mode = is_privileged_mode(&mode);
        if !privileged_order && !privileged_mode {
            return (order, mode);
        }

        let state = if self.credential().is_none() {
            LoginState::LoggedOut
        } else {
            self.login_status(rule, cancel).await
        };
        if state == LoginState::LoggedIn {
            return (order, mode);
        }

        debug!(?state, order = %order, mode = %mode, "Downgrading privileged filters");
        let order = if privileged_order {
            DEFAULT_ORDER.to_string()
        } else {
            order
        };
        let mode = if privileged_mode { SAFE_MODE.to_string() } else { mode };
        (order, mode)
    }

    /// 第一阶段：关键词搜索，只得到id与缩略图
    async fn search(
        &self,
        rule: &SourceRule,
        word: &str,
        page: u32,
        order: &str,
        mode: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let url = urls::search_url(&self.base_url, word);
        let query = vec![
            ("word".to_string(), word.to_string()),
            ("order".to_string(), order.to_string()),
            ("mode".to_string(), mode.to_string()),
            ("p".to_string(), page.max(1).to_string()),
            ("s_mode".to_string(), "s_tag".to_string()),
            ("type".to_string(), "all".to_string()),
        ];
        let headers = self.request_headers(rule);
        let spec = RequestSpec::new(&url, &query, &headers).with_secret(Some("Cookie"));
        let body = self.http.get_json(spec, self.http.json_timeout(), cancel).await?;
        upstream_error(&body)?;

        Ok(resolve_list("body.illustManga.data", &body)
            .into_iter()
            .filter_map(|item| self.summary(rule, item))
            .collect())
    }

    /// 把搜索或推荐结果中的一项映射为只含缩略图的记录，广告位等无id项返回 `None`
    fn summary(&self, rule: &SourceRule, item: &Value) -> Option<CanonicalImage> {
        let id = resolve_string("id", item).filter(|id| urls::is_artwork_id(id))?;
        let mut image = CanonicalImage::new(id.clone(), rule.id.clone());
        image.thumb_url = resolve_string("url", item).unwrap_or_default();
        image.width = coerce_dimension(resolve("width", item));
        image.height = coerce_dimension(resolve("height", item));
        image.grade = resolve("xRestrict", item)
            .and_then(Value::as_i64)
            .and_then(Grade::from_restriction);
        image.tags = resolve("tags", item).map(normalize_tags).unwrap_or_default();
        image.uploader = resolve_string("userName", item).unwrap_or_default();
        image.created_at = resolve_string("createDate", item).unwrap_or_default();
        image.is_ai = resolve("aiType", item).and_then(Value::as_i64) == Some(2);
        image.is_ugoira = resolve("illustType", item).and_then(Value::as_i64) == Some(2);
        image.detail_url = urls::artwork_url(&self.base_url, &id);
        Some(image)
    }

    /// 第二阶段：有界并发地补全大图地址
    async fn enrich_all(
        &self,
        rule: &SourceRule,
        mut images: Vec<CanonicalImage>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let headers = self.request_headers(rule);
        let ids: Vec<String> = images.iter().map(|i| i.id.clone()).collect();

        let outcomes: HashMap<String, DetailOutcome> = stream::iter(ids)
            .map(|id| {
                let headers = &headers;
                async move {
                    let outcome =
                        match tokio::time::timeout(self.item_timeout, self.pages(&id, headers, cancel)).await {
                            Ok(Ok(outcome)) => outcome,
                            Ok(Err(e)) => {
                                debug!(id = %id, error = %e, "Detail request failed");
                                DetailOutcome::Failed
                            }
                            Err(_) => {
                                debug!(id = %id, "Detail request timed out");
                                DetailOutcome::Failed
                            }
                        };
                    (id, outcome)
                }
            })
            .buffer_unordered(self.detail_concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        for image in &mut images {
            match outcomes.get(&image.id) {
                Some(DetailOutcome::Resolved {
                    full_url,
                    width,
                    height,
                }) => {
                    image.full_url = full_url.clone();
                    if image.width == 0 {
                        image.width = *width;
                    }
                    if image.height == 0 {
                        image.height = *height;
                    }
                }
                _ => {
                    metrics::record_detail_fallback();
                    image.full_url =
                        urls::derive_full_url(&image.thumb_url).unwrap_or_else(|| image.thumb_url.clone());
                }
            }
        }
        Ok(images)
    }

    async fn pages(
        &self,
        id: &str,
        headers: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<DetailOutcome, FetchError> {
        let url = urls::pages_url(&self.base_url, id);
        let spec = RequestSpec::new(&url, &[], headers).with_secret(Some("Cookie"));
        let body = self.http.get_json(spec, self.http.detail_timeout(), cancel).await?;
        upstream_error(&body)?;

        let full_url = resolve_string("body.0.urls.original", &body)
            .or_else(|| resolve_string("body.0.urls.regular", &body));
        Ok(match full_url {
            Some(full_url) => DetailOutcome::Resolved {
                full_url,
                width: coerce_dimension(resolve("body.0.width", &body)),
                height: coerce_dimension(resolve("body.0.height", &body)),
            },
            None => DetailOutcome::Failed,
        })
    }

    async fn recommendations(
        &self,
        rule: &SourceRule,
        seed_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let url = urls::recommend_url(&self.base_url, seed_id);
        let query = vec![("limit".to_string(), self.recommend_limit.to_string())];
        let headers = self.request_headers(rule);
        let spec = RequestSpec::new(&url, &query, &headers).with_secret(Some("Cookie"));
        let body = self.http.get_json(spec, self.http.json_timeout(), cancel).await?;
        upstream_error(&body)?;

        Ok(resolve_list("body.illusts", &body)
            .into_iter()
            .filter_map(|item| self.summary(rule, item))
            .filter(|image| image.id != seed_id)
            .collect())
    }
}

#[async_trait]
impl ImageSource for ScraperClient {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn supports(&self, rule: &SourceRule) -> bool {
        rule.engine
            .as_deref()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case(ENGINE_NAME))
    }

    async fn fetch(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let word = query
            .query
            .as_deref()
            .or(rule.default_keyword.as_deref())
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                FetchError::InvalidConfiguration(format!("rule '{}' requires a keyword", rule.id))
            })?;

        metrics::record_request(ENGINE_NAME);
        let start = Instant::now();
        let (order, mode) = self.effective_filters(rule, query, cancel).await;

        let result = async {
            let summaries = self
                .search(rule, &word, query.page, &order, &mode, cancel)
                .await?;
            let images = self.enrich_all(rule, summaries, cancel).await?;
            Ok::<_, FetchError>(dedupe_by_id(images))
        }
        .await;
        metrics::record_duration(ENGINE_NAME, start.elapsed());

        match &result {
            Ok(images) => {
                info!(
                    rule = %rule.id,
                    page = query.page,
                    order = %order,
                    mode = %mode,
                    count = images.len(),
                    "Fetch completed"
                )
            }
            Err(e) => {
                metrics::record_failure(e.kind());
                warn!(rule = %rule.id, page = query.page, error = %e, "Fetch failed");
            }
        }
        result
    }

    async fn similar(
        &self,
        rule: &SourceRule,
        seed: &CanonicalImage,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        if urls::is_artwork_id(&seed.id) {
            match self.recommendations(rule, &seed.id, cancel).await {
                Ok(found) if !found.is_empty() => {
                    let images = self.enrich_all(rule, found, cancel).await?;
                    return Ok(dedupe_by_id(images));
                }
                Ok(_) => debug!(seed = %seed.id, "No recommendations, falling back to search"),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => debug!(seed = %seed.id, error = %e, "Recommendation request failed"),
            }
        }

        let shape = rule.like_id_pattern.as_deref().and_then(compile_id_shape);
        let text = similar_query(seed, shape.as_ref());
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let images = self.fetch(rule, &FetchQuery::new(1, Some(&text)), cancel).await?;
        Ok(images.into_iter().filter(|i| i.id != seed.id).collect())
    }

    async fn restore_session(&self, rule: &SourceRule) -> Result<(), FetchError> {
        let stored = self.store.load_credential(&rule.id).await.map_err(|e| {
            FetchError::InvalidConfiguration(format!("failed to load session for '{}': {}", rule.id, e))
        })?;
        if let Some(credential) = stored.filter(|c| !c.trim().is_empty()) {
            *self.credential.write() = Some(credential);
            self.login.invalidate();
            debug!(rule = %rule.id, "Session restored");
        }
        Ok(())
    }

    async fn check_login_status(&self, rule: &SourceRule) -> LoginState {
        self.login_status(rule, &CancellationToken::new()).await
    }

    fn image_headers(&self, rule: &SourceRule) -> HashMap<String, String> {
        let mut headers: HashMap<String, String> = rule
            .image_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.insert("Referer".to_string(), format!("{}/", self.base_url));
        if let Some(cookie) = self.credential() {
            headers.insert("Cookie".to_string(), cookie);
        }
        headers
    }
}

fn single_filter(query: &FetchQuery, key: &str) -> Option<String> {
    let value = match query.filters.get(key)? {
        FilterValue::Single(v) => v.clone(),
        FilterValue::List(vs) => vs.first()?.clone(),
    };
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// 热门排序需要登录
pub fn is_privileged_order(order: &str) -> bool {
    order.starts_with("popular")
}

/// 成人内容模式需要登录
pub fn is_privileged_mode(mode: &str) -> bool {
    mode.eq_ignore_ascii_case("r18")
}

fn upstream_error(body: &Value) -> Result<(), FetchError> {
    if body.get("error") == Some(&Value::Bool(true)) {
        let message = resolve_string("message", body).unwrap_or_else(|| "unknown".to_string());
        return Err(FetchError::Network(format!("upstream reported an error: {}", message)));
    }
    Ok(())
}
