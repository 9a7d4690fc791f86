// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;

/// 会话存储特质
///
/// 跨进程重启保存凭据（如 Cookie）。核心只持有内存中的工作副本。
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取指定源的凭据
    async fn load_credential(&self, source_id: &str) -> Result<Option<String>>;

    /// 保存凭据，`None` 表示清除
    async fn save_credential(&self, source_id: &str, credential: Option<&str>) -> Result<()>;
}
