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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// 应用程序配置设置
///
/// 包含HTTP、游标缓存、合并请求、随机探测和专用抓取客户端的配置项
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// HTTP客户端配置
    pub http: HttpSettings,
    /// 游标缓存配置
    pub cursor_cache: CursorCacheSettings,
    /// merge 扇出配置
    pub merge: MergeSettings,
    /// 随机探测配置
    pub random: RandomSettings,
    /// 专用抓取客户端配置
    pub scraper: ScraperSettings,
}

/// HTTP客户端配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// 请求使用的User-Agent
    pub user_agent: String,
    /// JSON请求超时时间（秒）
    pub json_timeout_secs: u64,
    /// 随机探测超时时间（秒）
    pub probe_timeout_secs: u64,
    /// 详情请求超时时间（秒）
    pub detail_timeout_secs: u64,
}

/// 游标缓存配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CursorCacheSettings {
    /// 最大条目数
    pub capacity: usize,
    /// 条目存活时间（秒）
    pub ttl_secs: u64,
}

/// merge 扇出配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MergeSettings {
    /// 同时在途的子请求数
    pub concurrency: usize,
}

/// 随机探测配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RandomSettings {
    /// 每批探测数量
    pub batch_size: usize,
    /// 相邻探测的启动间隔（毫秒）
    pub stagger_ms: u64,
}

/// 专用抓取客户端配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperSettings {
    /// 站点根地址
    pub base_url: String,
    /// 详情并发数
    pub detail_concurrency: usize,
    /// 单项详情超时时间（秒）
    pub item_timeout_secs: u64,
    /// 登录状态缓存时间（秒）
    pub login_ttl_secs: u64,
    /// 推荐接口返回数量
    pub recommend_limit: u32,
}

impl HttpSettings {
    pub fn json_timeout(&self) -> Duration {
        Duration::from_secs(self.json_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            json_timeout_secs: 15,
            probe_timeout_secs: 10,
            detail_timeout_secs: 25,
        }
    }
}

impl Default for CursorCacheSettings {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: 1800,
        }
    }
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

impl Default for RandomSettings {
    fn default() -> Self {
        Self {
            batch_size: 6,
            stagger_ms: 300,
        }
    }
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.pixiv.net".to_string(),
            detail_concurrency: 4,
            item_timeout_secs: 8,
            login_ttl_secs: 300,
            recommend_limit: 30,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和 `RULEFETCH__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let defaults = Settings::default();
        let builder = Config::builder()
            // HTTP
            .set_default("http.user_agent", defaults.http.user_agent)?
            .set_default("http.json_timeout_secs", defaults.http.json_timeout_secs)?
            .set_default("http.probe_timeout_secs", defaults.http.probe_timeout_secs)?
            .set_default("http.detail_timeout_secs", defaults.http.detail_timeout_secs)?
            // Cursor cache
            .set_default("cursor_cache.capacity", defaults.cursor_cache.capacity as u64)?
            .set_default("cursor_cache.ttl_secs", defaults.cursor_cache.ttl_secs)?
            // Fan-out
            .set_default("merge.concurrency", defaults.merge.concurrency as u64)?
            .set_default("random.batch_size", defaults.random.batch_size as u64)?
            .set_default("random.stagger_ms", defaults.random.stagger_ms)?
            // Scraper
            .set_default("scraper.base_url", defaults.scraper.base_url)?
            .set_default("scraper.detail_concurrency", defaults.scraper.detail_concurrency as u64)?
            .set_default("scraper.item_timeout_secs", defaults.scraper.item_timeout_secs)?
            .set_default("scraper.login_ttl_secs", defaults.scraper.login_ttl_secs)?
            .set_default("scraper.recommend_limit", defaults.scraper.recommend_limit)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("RULEFETCH").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
