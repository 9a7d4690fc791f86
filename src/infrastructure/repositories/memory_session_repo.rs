// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::session_repository::SessionStore;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// 内存会话存储
///
/// 进程退出即丢失，供测试和不需要持久化的嵌入方使用
#[derive(Default)]
pub struct MemorySessionStore {
    credentials: DashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_credential(&self, source_id: &str) -> Result<Option<String>> {
        Ok(self.credentials.get(source_id).map(|c| c.value().clone()))
    }

    async fn save_credential(&self, source_id: &str, credential: Option<&str>) -> Result<()> {
        match credential.map(str::trim).filter(|c| !c.is_empty()) {
            Some(credential) => {
                self.credentials
                    .insert(source_id.to_string(), credential.to_string());
            }
            None => {
                self.credentials.remove(source_id);
            }
        }
        Ok(())
    }
}
