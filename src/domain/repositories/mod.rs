// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层的持久化抽象，具体实现由基础设施层提供。
/// - 会话仓库（session_repository）：跨进程保存源凭据
pub mod session_repository;
