// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 相似查询（similar_query）：由种子图片构造回退查询
pub mod similar_query;
