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

//! Rate-limited, retrying access to the upstream transaction API.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use rand::Rng;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use nodetz_attribution::RawTransaction;

/// Statuses that indicate a transient upstream condition worth retrying.
const RETRYABLE_STATUSES: [StatusCode; 2] =
    [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE];

/// Sliding-window request quota.
///
/// The upstream API enforces a hard requests-per-minute ceiling; exceeding it
/// degrades to hard failures that are more costly to recover from than
/// waiting. The limiter owns its call ledger, so independent limiters can
/// coexist and tests can exercise one in isolation.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        // A zero quota could never record a call; treat it as one.
        Self { max_calls: max_calls.max(1), window, calls: Mutex::new(VecDeque::new()) }
    }

    /// Wait until a call slot is available within the trailing window, then
    /// record the call. Safe to share across tasks; the lock is never held
    /// across an await point.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().expect("rate limiter mutex poisoned");
                let now = Instant::now();
                while calls.front().is_some_and(|&t| now.duration_since(t) >= self.window) {
                    calls.pop_front();
                }
                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }
                // Sleep until the oldest recorded call ages out of the window.
                self.window - now.duration_since(calls[0])
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Retry schedule for transient upstream statuses.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 30,
            backoff_base: Duration::from_secs(20),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff for one attempt: fixed base plus uniform jitter so concurrent
    /// fetches do not retry in lockstep.
    fn backoff(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 { rand::rng().random_range(0..jitter_ms) } else { 0 };
        self.backoff_base + Duration::from_millis(jitter)
    }
}

/// HTTP client that funnels every request through a [`RateLimiter`] and
/// retries transient statuses up to a bound.
#[derive(Debug)]
pub struct FetchClient {
    http: reqwest::Client,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self { http: reqwest::Client::new(), limiter, retry }
    }

    /// Issue a GET under the quota.
    ///
    /// Statuses in [`RETRYABLE_STATUSES`] are retried with backoff up to the
    /// policy bound; when retries are exhausted the last response is returned
    /// as-is, so callers must check the status. Transport-level errors are
    /// fatal and propagate immediately.
    pub async fn fetch(&self, url: Url) -> Result<Response> {
        let mut remaining = self.retry.max_retries;
        loop {
            self.limiter.acquire().await;
            let response = self
                .http
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("Request to {url} failed"))?;
            if RETRYABLE_STATUSES.contains(&response.status()) && remaining > 0 {
                let wait = self.retry.backoff();
                tracing::warn!(
                    %url,
                    status = %response.status(),
                    remaining,
                    "Transient upstream status, retrying in {} ms",
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;
                remaining -= 1;
                continue;
            }
            return Ok(response);
        }
    }
}

/// Response envelope shared by all API modules.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    message: String,
    result: serde_json::Value,
}

/// Typed surface over the Etherscan-compatible HTTP API.
pub struct EtherscanClient {
    client: FetchClient,
    api_url: Url,
    api_key: String,
}

impl EtherscanClient {
    pub fn new(client: FetchClient, api_url: Url, api_key: String) -> Self {
        Self { client, api_url, api_key }
    }

    /// All normal transactions sent to `address`, ascending by block.
    pub async fn normal_transactions(&self, address: Address) -> Result<Vec<RawTransaction>> {
        let url = self.build_url(&[
            ("module", "account"),
            ("action", "txlist"),
            ("address", &format!("{address:#x}")),
            ("sort", "asc"),
        ]);
        let envelope = self.call(url).await?;
        // An address with no transactions comes back with status "0".
        if envelope.status != "1" && envelope.message != "No transactions found" {
            bail!("txlist query for {address} failed: {}", envelope.message);
        }
        serde_json::from_value(envelope.result)
            .with_context(|| format!("Malformed txlist result for {address}"))
    }

    /// Verified contract ABI, as the JSON string the API returns.
    pub async fn contract_abi(&self, address: Address) -> Result<String> {
        let url = self.build_url(&[
            ("module", "contract"),
            ("action", "getabi"),
            ("address", &format!("{address:#x}")),
        ]);
        let envelope = self.call(url).await?;
        if envelope.status != "1" {
            bail!("getabi query for {address} failed: {}", envelope.message);
        }
        envelope
            .result
            .as_str()
            .map(str::to_owned)
            .with_context(|| format!("Malformed getabi result for {address}"))
    }

    async fn call(&self, url: Url) -> Result<Envelope> {
        let response = self.client.fetch(url.clone()).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Request to {url} returned status {status} after retries were exhausted");
        }
        response.json::<Envelope>().await.context("Failed to parse API response envelope")
    }

    fn build_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.api_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("apikey", &self.api_key);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    /// Serve one canned status line per connection, repeating the last one,
    /// and count how many requests arrive.
    async fn serve_statuses(statuses: Vec<&'static str>) -> (Url, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(connection) => connection,
                    Err(_) => break,
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses.get(n).copied().unwrap_or(statuses[statuses.len() - 1]);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (url, hits)
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(5),
            jitter: Duration::from_millis(1),
        }
    }

    fn generous_limiter() -> RateLimiter {
        RateLimiter::new(100, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn transient_statuses_are_retried_until_success() {
        let (url, hits) = serve_statuses(vec![
            "429 Too Many Requests",
            "429 Too Many Requests",
            "200 OK",
        ])
        .await;
        let client = FetchClient::new(generous_limiter(), fast_policy(5));

        let response = client.fetch(url).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_return_the_last_response() {
        let (url, hits) = serve_statuses(vec!["503 Service Unavailable"]).await;
        let client = FetchClient::new(generous_limiter(), fast_policy(1));

        // Exhaustion surfaces the failing response, it does not error.
        let response = client.fetch(url).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_statuses_return_immediately() {
        let (url, hits) = serve_statuses(vec!["404 Not Found"]).await;
        let client = FetchClient::new(generous_limiter(), fast_policy(5));

        let response = client.fetch(url).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let client = FetchClient::new(generous_limiter(), fast_policy(5));
        assert!(client.fetch(url).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_calls_is_clamped_to_one() {
        let limiter = RateLimiter::new(0, Duration::from_secs(10));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_is_enforced_across_the_window() {
        let limiter = RateLimiter::new(30, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..30 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        // The 31st call cannot be recorded until a prior timestamp has aged
        // out of the trailing window.
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn slots_free_up_as_calls_age_out() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(10));
    }

    #[test]
    fn backoff_stays_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..32 {
            let wait = policy.backoff();
            assert!(wait >= policy.backoff_base);
            assert!(wait < policy.backoff_base + policy.jitter);
        }
    }

    #[test]
    fn zero_jitter_gives_fixed_backoff() {
        let policy = RetryPolicy {
            max_retries: 1,
            backoff_base: Duration::from_millis(500),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff(), Duration::from_millis(500));
    }

    #[test]
    fn api_key_is_appended_to_every_request() {
        let client = EtherscanClient::new(
            FetchClient::new(
                RateLimiter::new(1, Duration::from_secs(1)),
                RetryPolicy::default(),
            ),
            Url::parse("https://api.example.org/api").unwrap(),
            "secret".to_string(),
        );
        let url = client.build_url(&[("module", "account"), ("action", "txlist")]);
        assert_eq!(
            url.as_str(),
            "https://api.example.org/api?module=account&action=txlist&apikey=secret"
        );
    }
}
