// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，提供对具体技术的抽象和封装。
///
/// 包含的子模块：
/// - 缓存（cache）：游标缓存与登录状态缓存
/// - 可观测性（observability）：抓取指标
/// - 仓库实现（repositories）：会话存储的内存实现
/// - 专用抓取（scraper）：插画站点客户端
///
/// 基础设施层依赖于领域层的抽象接口，领域层不感知具体实现。
pub mod cache;
pub mod observability;
pub mod repositories;
pub mod scraper;
