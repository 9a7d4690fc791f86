// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 提供游标令牌缓存和登录状态缓存，均按引擎实例注入
pub mod cursor_cache;
pub mod login_cache;
