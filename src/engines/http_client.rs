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

use crate::config::settings::HttpSettings;
use crate::domain::source::engine::FetchError;
use crate::utils::redact::{mask_headers, mask_pairs, mask_url};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 单次HTTP请求描述
#[derive(Debug, Clone, Copy)]
pub struct RequestSpec<'a> {
    pub url: &'a str,
    pub query: &'a [(String, String)],
    pub headers: &'a BTreeMap<String, String>,
    /// 日志中需要额外掩码的参数或请求头名称
    pub secret_name: Option<&'a str>,
}

impl<'a> RequestSpec<'a> {
    pub fn new(
        url: &'a str,
        query: &'a [(String, String)],
        headers: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            url,
            query,
            headers,
            secret_name: None,
        }
    }

    pub fn with_secret(mut self, name: Option<&'a str>) -> Self {
        self.secret_name = name;
        self
    }
}

/// HTTP客户端
///
/// 基于reqwest，负责状态码分类、超时、取消和脱敏日志
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    json_timeout: Duration,
    probe_timeout: Duration,
    detail_timeout: Duration,
}

impl HttpClient {
    /// 创建HTTP客户端
    ///
    /// # 参数
    ///
    /// * `settings` - HTTP配置
    ///
    /// # 返回值
    ///
    /// * `Ok(HttpClient)` - 客户端
    /// * `Err(FetchError)` - 构建reqwest客户端失败
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            json_timeout: settings.json_timeout(),
            probe_timeout: settings.probe_timeout(),
            detail_timeout: settings.detail_timeout(),
        })
    }

    pub fn json_timeout(&self) -> Duration {
        self.json_timeout
    }

    pub fn detail_timeout(&self) -> Duration {
        self.detail_timeout
    }

    /// 发送GET请求并解码JSON响应体
    ///
    /// 状态码 >= 400 作为错误返回；无法解码的响应体视为 `Null`，由解析器得到空列表。
    ///
    /// # 参数
    ///
    /// * `spec` - 请求描述
    /// * `timeout` - 本次请求超时时间
    /// * `cancel` - 取消令牌
    pub async fn get_json(
        &self,
        spec: RequestSpec<'_>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError> {
        debug!(
            url = %mask_url(spec.url, spec.secret_name),
            query = ?mask_pairs(spec.query, spec.secret_name),
            headers = ?mask_headers(spec.headers, spec.secret_name),
            "GET"
        );
        let request = self
            .client
            .get(spec.url)
            .query(spec.query)
            .headers(header_map(spec.headers))
            .timeout(timeout);

        cancellable(cancel, async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            if let Some(err) = FetchError::from_status(status) {
                warn!(url = %mask_url(spec.url, spec.secret_name), status, "Request failed");
                return Err(err);
            }
            let bytes = response.bytes().await?;
            Ok(match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        url = %mask_url(spec.url, spec.secret_name),
                        error = %e,
                        "Response body is not valid JSON"
                    );
                    Value::Null
                }
            })
        })
        .await
    }

    /// 解析重定向后的最终地址
    ///
    /// 先发送跟随重定向的HEAD请求；HEAD失败或状态码 >= 400 时退回GET，
    /// 拿到最终地址后立即丢弃响应体，不读取内容。
    pub async fn resolve_final_url(
        &self,
        spec: RequestSpec<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let head = self
            .client
            .head(spec.url)
            .query(spec.query)
            .headers(header_map(spec.headers))
            .timeout(self.probe_timeout);

        match cancellable(cancel, async { Ok(head.send().await?) }).await {
            Ok(response) if response.status().as_u16() < 400 => {
                return Ok(response.url().to_string());
            }
            Ok(response) => {
                debug!(status = response.status().as_u16(), "HEAD probe rejected, retrying with GET");
            }
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => {
                debug!(error = %e, "HEAD probe failed, retrying with GET");
            }
        }

        let get = self
            .client
            .get(spec.url)
            .query(spec.query)
            .headers(header_map(spec.headers))
            .timeout(self.probe_timeout);
        cancellable(cancel, async move {
            let response = get.send().await?;
            if let Some(err) = FetchError::from_status(response.status().as_u16()) {
                return Err(err);
            }
            let final_url = response.url().to_string();
            drop(response);
            Ok(final_url)
        })
        .await
    }
}

/// 在取消令牌触发时放弃 `work`
pub async fn cancellable<T, F>(cancel: &CancellationToken, work: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        result = work => result,
    }
}

/// 构建请求头，非法的名称或值会被跳过
pub fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (k, v) in headers {
        if let (Ok(k), Ok(v)) = (
            HeaderName::from_bytes(k.as_bytes()),
            HeaderValue::from_str(v),
        ) {
            map.insert(k, v);
        }
    }
    map
}

#[cfg(test)]
#[path = "http_client_test.rs"]
mod tests;
