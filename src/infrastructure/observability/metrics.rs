// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::time::Duration;

pub const REQUESTS_TOTAL: &str = "rulefetch_requests_total";
pub const REQUEST_FAILURES_TOTAL: &str = "rulefetch_request_failures_total";
pub const PROBE_FAILURES_TOTAL: &str = "rulefetch_probe_failures_total";
pub const DETAIL_FALLBACKS_TOTAL: &str = "rulefetch_detail_fallbacks_total";
pub const FETCH_DURATION_SECONDS: &str = "rulefetch_fetch_duration_seconds";

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// 注册指标描述
///
/// 安装导出器由调用方负责；重复调用只生效一次
pub fn describe_metrics() {
    DESCRIBED.get_or_init(|| {
        describe_counter!(REQUESTS_TOTAL, "Total number of upstream fetch calls by mode");
        describe_counter!(
            REQUEST_FAILURES_TOTAL,
            "Total number of failed fetch calls by error kind"
        );
        describe_counter!(
            PROBE_FAILURES_TOTAL,
            "Total number of random-mode probes that resolved nothing"
        );
        describe_counter!(
            DETAIL_FALLBACKS_TOTAL,
            "Total number of detail lookups that fell back to derived URLs"
        );
        describe_histogram!(
            FETCH_DURATION_SECONDS,
            "Duration of fetch calls in seconds by mode"
        );
    });
}

pub fn record_request(mode: &'static str) {
    counter!(REQUESTS_TOTAL, "mode" => mode).increment(1);
}

pub fn record_failure(kind: &'static str) {
    counter!(REQUEST_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_probe_failure() {
    counter!(PROBE_FAILURES_TOTAL).increment(1);
}

pub fn record_detail_fallback() {
    counter!(DETAIL_FALLBACKS_TOTAL).increment(1);
}

pub fn record_duration(mode: &'static str, elapsed: Duration) {
    histogram!(FETCH_DURATION_SECONDS, "mode" => mode).record(elapsed.as_secs_f64());
}
