// Copyright 2025 RISC Zero, Inc.
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

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use nodetz_indexer::{
    cache::FileAbiCache,
    client::{EtherscanClient, FetchClient, RateLimiter, RetryPolicy},
    deployments::Deployment,
    service::{AttributionIndexerConfig, AttributionIndexerService},
    store::SnapshotStore,
};
use url::Url;

/// Arguments for the timezone attribution indexer.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct TzIndexerArgs {
    /// URL of the Etherscan-compatible API endpoint.
    #[clap(long, env = "ETHERSCAN_API_URL", default_value = "https://api.etherscan.io/api")]
    api_url: Url,

    /// API key for the endpoint.
    #[clap(long, env = "ETHERSCAN_API_KEY")]
    api_key: String,

    /// Directory for transaction snapshots, cached ABIs and the output
    /// ledger.
    #[clap(long, env, default_value = "./data")]
    data_dir: PathBuf,

    /// Maximum API calls per rate-limit window.
    #[clap(long, default_value = "30")]
    max_calls: usize,

    /// Rate-limit window in seconds.
    #[clap(long, default_value = "60")]
    window_secs: u64,

    /// Number of retries for transient upstream statuses.
    #[clap(long, default_value = "30")]
    retries: u32,

    /// Compile the ledger from existing snapshots without fetching.
    #[clap(long, default_value_t = false)]
    compile_only: bool,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = TzIndexerArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    let limiter = RateLimiter::new(args.max_calls, Duration::from_secs(args.window_secs));
    let retry = RetryPolicy { max_retries: args.retries, ..RetryPolicy::default() };
    let client = EtherscanClient::new(FetchClient::new(limiter, retry), args.api_url, args.api_key);

    let service = AttributionIndexerService::new(
        client,
        Deployment::mainnet(),
        SnapshotStore::new(&args.data_dir),
        FileAbiCache::new(&args.data_dir),
        AttributionIndexerConfig { compile_only: args.compile_only },
    );

    service.run().await?;
    tracing::info!("Attribution ledger written to {}", args.data_dir.display());
    Ok(())
}
