// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::image::CanonicalImage;
use crate::domain::models::source_rule::SourceRule;
use crate::domain::source::engine::{FetchError, FetchQuery, ImageSource, LoginState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 图片源路由器
///
/// 按顺序持有图片源实现，把调用分派给第一个 `supports` 返回 true 的实现
pub struct SourceRouter {
    /// 图片源列表，越靠前优先级越高
    sources: Vec<Arc<dyn ImageSource>>,
}

impl SourceRouter {
    /// 创建新的图片源路由器
    ///
    /// # 参数
    ///
    /// * `sources` - 按优先级排列的图片源
    pub fn new(sources: Vec<Arc<dyn ImageSource>>) -> Self {
        Self { sources }
    }

    /// 选择处理该规则的图片源
    ///
    /// # 返回值
    ///
    /// * `Ok(Arc<dyn ImageSource>)` - 第一个支持该规则的图片源
    /// * `Err(FetchError::InvalidConfiguration)` - 没有任何实现支持该规则
    pub fn select(&self, rule: &SourceRule) -> Result<Arc<dyn ImageSource>, FetchError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.supports(rule))
            .cloned()
            .ok_or_else(|| {
                FetchError::InvalidConfiguration(format!(
                    "no source supports rule '{}' (engine: {:?})",
                    rule.id, rule.engine
                ))
            })?;
        debug!(rule = %rule.id, source = source.name(), "Source selected");
        Ok(source)
    }

    pub async fn fetch(
        &self,
        rule: &SourceRule,
        query: &FetchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        self.select(rule)?.fetch(rule, query, cancel).await
    }

    pub async fn similar(
        &self,
        rule: &SourceRule,
        seed: &CanonicalImage,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalImage>, FetchError> {
        self.select(rule)?.similar(rule, seed, cancel).await
    }

    pub async fn restore_session(&self, rule: &SourceRule) -> Result<(), FetchError> {
        self.select(rule)?.restore_session(rule).await
    }

    pub async fn check_login_status(&self, rule: &SourceRule) -> Result<LoginState, FetchError> {
        Ok(self.select(rule)?.check_login_status(rule).await)
    }

    pub fn image_headers(&self, rule: &SourceRule) -> Result<HashMap<String, String>, FetchError> {
        Ok(self.select(rule)?.image_headers(rule))
    }
}
