// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::source::engine::{FetchError, LoginState};
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct LoginEntry {
    fingerprint: u64,
    logged_in: bool,
    checked_at: Instant,
}

/// 登录状态缓存
///
/// 结果按凭据指纹缓存一个TTL窗口。并发检查通过异步互斥门合并为一次网络调用，
/// 检查失败不写入缓存。
pub struct LoginCache {
    entry: RwLock<Option<LoginEntry>>,
    gate: Mutex<()>,
    checking: AtomicBool,
    ttl: Duration,
}

impl LoginCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entry: RwLock::new(None),
            gate: Mutex::new(()),
            checking: AtomicBool::new(false),
            ttl,
        }
    }

    /// 不发起检查，读取当前状态
    ///
    /// # 返回值
    ///
    /// 没有凭据时为 `LoggedOut`；缓存有效时为缓存结果；检查进行中为 `Checking`；否则 `Unknown`
    pub fn state(&self, credential: Option<&str>) -> LoginState {
        let Some(credential) = non_empty(credential) else {
            return LoginState::LoggedOut;
        };
        if let Some(state) = self.cached(fingerprint(credential)) {
            return state;
        }
        if self.checking.load(Ordering::Acquire) {
            LoginState::Checking
        } else {
            LoginState::Unknown
        }
    }

    /// 读取缓存状态，缓存缺失或过期时执行一次检查
    ///
    /// # 参数
    ///
    /// * `credential` - 当前凭据，空值直接返回 `LoggedOut` 而不调用 `check`
    /// * `check` - 实际的登录检查，`Ok(true)` 表示已登录
    ///
    /// # 返回值
    ///
    /// 检查出错时返回 `Unknown`，下次调用会重新检查
    pub async fn get_or_check<F, Fut>(&self, credential: Option<&str>, check: F) -> LoginState
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<bool, FetchError>>,
    {
        let Some(credential) = non_empty(credential) else {
            return LoginState::LoggedOut;
        };
        let fingerprint = fingerprint(credential);
        if let Some(state) = self.cached(fingerprint) {
            return state;
        }

        let _gate = self.gate.lock().await;
        if let Some(state) = self.cached(fingerprint) {
            debug!("Login status resolved by a concurrent check");
            return state;
        }

        let result = {
            let _flag = CheckingFlag::raise(&self.checking);
            check(credential.to_string()).await
        };
        match result {
            Ok(logged_in) => {
                *self.entry.write() = Some(LoginEntry {
                    fingerprint,
                    logged_in,
                    checked_at: Instant::now(),
                });
                debug!(logged_in, "Login status cached");
                to_state(logged_in)
            }
            Err(e) => {
                warn!(error = %e, "Login status check failed");
                LoginState::Unknown
            }
        }
    }

    /// 丢弃缓存结果，凭据变化时调用
    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }

    fn cached(&self, fingerprint: u64) -> Option<LoginState> {
        let entry = self.entry.read();
        entry
            .as_ref()
            .filter(|e| e.fingerprint == fingerprint && e.checked_at.elapsed() < self.ttl)
            .map(|e| to_state(e.logged_in))
    }
}

struct CheckingFlag<'a>(&'a AtomicBool);

impl<'a> CheckingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for CheckingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn non_empty(credential: Option<&str>) -> Option<&str> {
    credential.map(str::trim).filter(|c| !c.is_empty())
}

fn fingerprint(credential: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    credential.hash(&mut hasher);
    hasher.finish()
}

fn to_state(logged_in: bool) -> LoginState {
    if logged_in {
        LoginState::LoggedIn
    } else {
        LoginState::LoggedOut
    }
}
