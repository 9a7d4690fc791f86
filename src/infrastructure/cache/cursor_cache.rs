// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::CursorCacheSettings;
use crate::domain::source::engine::FilterValue;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

/// 游标缓存键：(规则ID, 规范化查询, 序列化过滤器)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey {
    pub rule_id: String,
    pub query: String,
    pub filters: String,
}

impl CursorKey {
    /// 创建缓存键
    ///
    /// 查询会被去除首尾空白、转小写并折叠连续空白；过滤器按键有序序列化。
    pub fn new(rule_id: &str, query: Option<&str>, filters: &BTreeMap<String, FilterValue>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            query: normalize_query(query.unwrap_or("")),
            filters: serde_json::to_string(filters).unwrap_or_default(),
        }
    }
}

/// 规范化查询文本
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

struct CursorEntry {
    token: String,
    stored_at: Instant,
}

/// 游标缓存
///
/// 有容量上限的LRU缓存，每个条目带TTL，过期条目视为不存在。
/// 令牌是不透明的，只存储和回放，从不解析。
pub struct CursorCache {
    entries: Mutex<LruCache<CursorKey, CursorEntry>>,
    ttl: Duration,
}

impl CursorCache {
    /// 创建游标缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数（至少为1）
    /// * `ttl` - 条目存活时间
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// 从配置创建游标缓存
    pub fn from_settings(settings: &CursorCacheSettings) -> Self {
        Self::new(settings.capacity, Duration::from_secs(settings.ttl_secs))
    }

    /// 读取令牌，过期条目会被移除
    pub fn get(&self, key: &CursorKey) -> Option<String> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => return Some(entry.token.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(rule = %key.rule_id, "Cursor token expired");
            entries.pop(key);
        }
        None
    }

    /// 写入令牌，覆盖已有值
    pub fn put(&self, key: CursorKey, token: String) {
        self.entries.lock().put(
            key,
            CursorEntry {
                token,
                stored_at: Instant::now(),
            },
        );
    }

    /// 移除令牌
    pub fn invalidate(&self, key: &CursorKey) {
        self.entries.lock().pop(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
