// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
/// 包括日志初始化、敏感信息掩码和URL处理
pub mod redact;
pub mod telemetry;
pub mod url_utils;
