// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：源规则与规范化图片记录
/// - 仓库接口（repositories）：会话持久化抽象接口
/// - 服务（services）：相似查询等领域规则
/// - 图片源（source）：图片源能力接口与错误类型
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;
pub mod source;
