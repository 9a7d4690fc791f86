// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 专用抓取模块
///
/// 插画站点的会话管理、两阶段搜索与推荐
pub mod client;
pub mod urls;
