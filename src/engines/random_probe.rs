// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::RandomSettings;
use crate::domain::models::image::CanonicalImage;
use crate::domain::models::source_rule::SourceRule;
use crate::domain::source::engine::FetchError;
use crate::engines::http_client::{cancellable, HttpClient, RequestSpec};
use crate::engines::request_builder::{to_query_pairs, BuiltRequest};
use crate::infrastructure::observability::metrics;
use crate::utils::url_utils::strip_query_params;
use futures::future::join_all;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 每次探测附加、结果中再去掉的防缓存参数
pub const CACHE_BUST_PARAMS: [&str; 2] = ["_t", "_r"];

/// 随机探测器
///
/// 适用于以重定向返回随机图片的接口
pub struct RandomProbe {
    http: HttpClient,
    batch_size: usize,
    stagger: Duration,
}

impl RandomProbe {
    pub fn new(http: HttpClient, settings: &RandomSettings) -> Self {
        Self {
            http,
            batch_size: settings.batch_size.max(1),
            stagger: Duration::from_millis(settings.stagger_ms),
        }
    }

    /// 执行一批错峰启动的探测
    ///
    /// 第 `i` 个探测在 `i * stagger` 之后启动。失败的探测不产生结果，
    /// 成功的按最终地址去重并保持启动顺序。
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<CanonicalImage>)` - 全部失败时为空列表
    /// * `Err(FetchError::Cancelled)` - 调用被取消
    pub async fn fetch(
        &self,
        rule: &SourceRule,
        request: &BuiltRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        let base = to_query_pairs(&request.params);
        let secret = rule.api_key.as_ref().map(|k| k.param_name());

        let probes = (0..self.batch_size).map(|index| {
            let base = &base;
            async move {
                let delay = self.stagger * index as u32;
                if !delay.is_zero() {
                    cancellable(cancel, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await
                    .ok()?;
                }
                let mut query = base.clone();
                query.push((
                    "_t".to_string(),
                    chrono::Utc::now().timestamp_millis().to_string(),
                ));
                query.push(("_r".to_string(), rand::random::<u32>().to_string()));

                let spec = RequestSpec::new(&request.url, &query, &request.headers).with_secret(secret);
                match self.http.resolve_final_url(spec, cancel).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        if e != FetchError::Cancelled {
                            metrics::record_probe_failure();
                        }
                        debug!(rule = %rule.id, index, error = %e, "Random probe failed");
                        None
                    }
                }
            }
        });

        let resolved = join_all(probes).await;
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let mut seen: Vec<String> = Vec::with_capacity(resolved.len());
        for url in resolved.into_iter().flatten() {
            let url = strip_query_params(&url, &CACHE_BUST_PARAMS);
            if !url.starts_with("http") || seen.contains(&url) {
                continue;
            }
            seen.push(url);
        }

        Ok(seen
            .into_iter()
            .map(|url| {
                let mut image = CanonicalImage::new(url.clone(), rule.id.clone());
                image.thumb_url = url.clone();
                image.full_url = url;
                image
            })
            .collect())
    }
}
