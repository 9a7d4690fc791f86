// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 图片源领域模块
///
/// 定义图片源能力接口、抓取参数和错误类型
pub mod engine;
