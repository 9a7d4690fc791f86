// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 命令行参数
pub mod cli;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含源规则、图片记录、图片源接口和会话存储接口
pub mod domain;

/// 引擎模块
///
/// 实现规则驱动的请求构造、分页、响应解析与抓取执行
pub mod engines;

/// 基础设施模块
///
/// 提供缓存、指标、会话存储和专用抓取客户端
pub mod infrastructure;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
