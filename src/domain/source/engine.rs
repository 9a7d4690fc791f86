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

use crate::domain::models::image::CanonicalImage;
use crate::domain::models::source_rule::SourceRule;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 抓取错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// 规则或调用参数无效，在任何网络请求之前失败
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// 请求超时
    #[error("Network timeout")]
    NetworkTimeout,
    /// 4xx 响应
    #[error("HTTP client error: {status}")]
    HttpClientError { status: u16 },
    /// 5xx 响应
    #[error("HTTP server error: {status}")]
    HttpServerError { status: u16 },
    /// 连接、TLS 或读取响应体失败
    #[error("Network error: {0}")]
    Network(String),
    /// 调用被取消
    #[error("Cancelled")]
    Cancelled,
}

impl FetchError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 超时、连接错误和5xx返回true
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkTimeout | FetchError::Network(_) | FetchError::HttpServerError { .. }
        )
    }

    /// 指标标签使用的错误种类
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidConfiguration(_) => "invalid_configuration",
            FetchError::NetworkTimeout => "timeout",
            FetchError::HttpClientError { .. } => "http_4xx",
            FetchError::HttpServerError { .. } => "http_5xx",
            FetchError::Network(_) => "network",
            FetchError::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::NetworkTimeout;
        }
        if let Some(status) = e.status() {
            return FetchError::from_status(status.as_u16()).unwrap_or(FetchError::Network(e.to_string()));
        }
        FetchError::Network(e.to_string())
    }
}

impl FetchError {
    /// 把状态码归类为错误；2xx/3xx 返回 None
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            s if s >= 500 => Some(FetchError::HttpServerError { status: s }),
            s if s >= 400 => Some(FetchError::HttpClientError { status: s }),
            _ => None,
        }
    }
}

/// 过滤器选中值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<String>),
    Single(String),
}

/// 一次抓取调用的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchQuery {
    /// 页码，从1开始
    pub page: u32,
    /// 用户关键词
    pub query: Option<String>,
    /// 过滤器选择，按键有序
    pub filters: BTreeMap<String, FilterValue>,
}

impl Default for FetchQuery {
    fn default() -> Self {
        Self {
            page: 1,
            query: None,
            filters: BTreeMap::new(),
        }
    }
}

impl FetchQuery {
    pub fn new(page: u32, query: Option<&str>) -> Self {
        Self {
            page,
            query: query.map(str::to_string),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, key: &str, value: FilterValue) -> Self {
        self.filters.insert(key.to_string(), value);
        self
    }
}

/// 登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginState {
    Unknown,
    Checking,
    LoggedIn,
    LoggedOut,
}

/// 图片源能力接口
///
/// 调用方持有有序的实现列表，并分派给第一个 `supports` 返回 true 的实现。
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// 源名称
    fn name(&self) -> &'static str;

    /// 是否能处理该规则
    fn supports(&self, rule: &SourceRule) -> bool;

    /// 抓取一页结果
    async fn fetch(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError>;

    /// 查找与种子相似的图片
    async fn similar(
        &self,
        rule: &SourceRule,
        seed: &CanonicalImage,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError>;

    /// 从持久化存储恢复会话
    async fn restore_session(&self, _rule: &SourceRule) -> Result<(), FetchError> {
        Ok(())
    }

    /// 检查登录状态
    async fn check_login_status(&self, _rule: &SourceRule) -> LoginState {
        LoginState::LoggedOut
    }

    /// 下载该源图片时应携带的请求头
    fn image_headers(&self, rule: &SourceRule) -> HashMap<String, String>;
}
