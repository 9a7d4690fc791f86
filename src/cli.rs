// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use clap::Parser;
use std::path::PathBuf;

/// 命令行参数
///
/// 读取一个规则文件并抓取一页结果
#[derive(Debug, Parser)]
#[command(name = "rulefetch")]
#[command(about = "Fetch one page of images through a source rule", long_about = None)]
pub struct Args {
    /// 规则文件路径（.json / .yaml / .yml）
    pub rule_file: PathBuf,

    /// 搜索关键词，缺省时使用规则的默认关键词
    pub query: Option<String>,

    /// 页码，从1开始
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,
}

impl Args {
    /// 去掉空白后的关键词，空字符串视为未提供
    pub fn keyword(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}
