// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::Parser;
use rulefetch::cli::Args;
use rulefetch::config::settings::Settings;
use rulefetch::domain::models::source_rule::SourceRule;
use rulefetch::domain::source::engine::{FetchQuery, ImageSource};
use rulefetch::engines::fetch_executor::RuleEngine;
use rulefetch::engines::router::SourceRouter;
use rulefetch::infrastructure::observability::metrics::describe_metrics;
use rulefetch::infrastructure::repositories::memory_session_repo::MemorySessionStore;
use rulefetch::infrastructure::scraper::client::ScraperClient;
use rulefetch::utils::telemetry;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 主函数
///
/// 读取规则文件，执行一次抓取，按行输出JSON结果
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1. Initialize logging
    telemetry::init_telemetry();
    describe_metrics();

    // 2. Load configuration and rule
    let settings = Settings::new()?;
    let rule = load_rule(&args.rule_file)?;
    info!(rule = %rule.id, "Rule loaded");

    // 3. Build sources, specialized first
    let store = Arc::new(MemorySessionStore::new());
    let scraper: Arc<dyn ImageSource> = Arc::new(ScraperClient::new(&settings, store)?);
    let generic: Arc<dyn ImageSource> = Arc::new(RuleEngine::new(&settings)?);
    let router = SourceRouter::new(vec![scraper, generic]);

    // 4. Fetch, cancelling on Ctrl-C
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    router.restore_session(&rule).await?;
    let images = router
        .fetch(&rule, &FetchQuery::new(args.page, args.keyword()), &cancel)
        .await?;
    for image in &images {
        println!("{}", serde_json::to_string(image)?);
    }
    info!(count = images.len(), "Done");
    Ok(())
}

fn load_rule(path: &Path) -> anyhow::Result<SourceRule> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file {}", path.display()))?;
    let rule = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => SourceRule::from_yaml_str(&text)?,
        _ => SourceRule::from_json_str(&text)?,
    };
    Ok(rule)
}
