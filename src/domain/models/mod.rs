// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 图片（image）：规范化图片记录与分级
/// - 源规则（source_rule）：描述第三方JSON接口的声明式配置
pub mod image;
pub mod source_rule;
