// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::Value;
use serde_json_path::JsonPath;

/// 以此开头的路径按 JSONPath 查询解析
const QUERY_SIGIL: char = '$';

/// 在JSON文档上求值路径表达式
///
/// - `""` 不命中，`"."` 返回整个文档
/// - 以 `$` 开头的路径是 JSONPath 查询，取第一个匹配
/// - 其余为点路径：对象按键取值，数组按非负下标取值
///
/// # 参数
///
/// * `path` - 路径表达式
/// * `document` - 已解码的JSON文档
///
/// # 返回值
///
/// 命中的值；键缺失、下标越界、中途遇到标量或值为 `null` 都返回 `None`，从不报错
pub fn resolve<'a>(path: &str, document: &'a Value) -> Option<&'a Value> {
    let path = path.trim();
    let found = if path.is_empty() {
        None
    } else if path == "." {
        Some(document)
    } else if path.starts_with(QUERY_SIGIL) {
        query_all(path, document).into_iter().next()
    } else {
        walk(path, document)
    };
    found.filter(|v| !v.is_null())
}

/// 解析指向记录列表的路径
///
/// 查询路径收集全部匹配（如 `$.data[*]`），唯一匹配本身是数组时展开；
/// 点路径必须落在数组上，否则没有记录。
pub fn resolve_list<'a>(path: &str, document: &'a Value) -> Vec<&'a Value> {
    let path = path.trim();
    if path.starts_with(QUERY_SIGIL) {
        let matches = query_all(path, document);
        if matches.len() == 1 {
            let only: &'a Value = matches[0];
            if let Value::Array(items) = only {
                return items.iter().collect();
            }
        }
        return matches.into_iter().filter(|v| !v.is_null()).collect();
    }
    match resolve(path, document) {
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}

/// 解析路径并把标量结果转换为去空白的字符串
///
/// 对象、数组、未命中和空字符串都返回 `None`
pub fn resolve_string(path: &str, document: &Value) -> Option<String> {
    resolve(path, document).and_then(scalar_to_string)
}

/// 标量JSON值转文本
pub fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn query_all<'a>(path: &str, document: &'a Value) -> Vec<&'a Value> {
    match JsonPath::parse(path) {
        Ok(compiled) => compiled.query(document).all(),
        Err(e) => {
            tracing::debug!(path, error = %e, "Invalid JSONPath expression");
            Vec::new()
        }
    }
}

fn walk<'a>(path: &str, document: &'a Value) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}
