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

//! Orchestration of the fetch and compile phases.

use alloy::primitives::Address;
use anyhow::Result;
use futures_util::future::try_join_all;
use nodetz_attribution::{
    compile_attribution_ledger, extract_deposit_events, extract_identity_events, is_relevant,
    RawTransaction, DEPOSIT_FUNCTION, REGISTER_FUNCTION, SET_TIMEZONE_FUNCTION,
};

use crate::{
    abi::AbiTimezoneDecoder, cache::AbiCache, client::EtherscanClient,
    deployments::Deployment, store::SnapshotStore,
};

#[derive(Clone, Debug, Default)]
pub struct AttributionIndexerConfig {
    /// Skip the network phases and compile from existing snapshots.
    pub compile_only: bool,
}

/// Fetches raw transactions for every known contract, decodes them into
/// event streams and compiles the attribution ledger.
pub struct AttributionIndexerService<C> {
    client: EtherscanClient,
    deployment: Deployment,
    store: SnapshotStore,
    abi_cache: C,
    config: AttributionIndexerConfig,
}

impl<C: AbiCache> AttributionIndexerService<C> {
    pub fn new(
        client: EtherscanClient,
        deployment: Deployment,
        store: SnapshotStore,
        abi_cache: C,
        config: AttributionIndexerConfig,
    ) -> Self {
        Self { client, deployment, store, abi_cache, config }
    }

    pub async fn run(&self) -> Result<()> {
        let start_time = std::time::Instant::now();
        tracing::info!("Starting attribution indexer run");

        let decoder = self.load_abis().await?;
        if !self.config.compile_only {
            self.fetch_identity_transactions().await?;
            self.fetch_deposit_transactions().await?;
        }
        self.compile(&decoder)?;

        tracing::info!(elapsed = ?start_time.elapsed(), "Attribution indexer run complete");
        Ok(())
    }

    /// Load the ABI for every known contract, from cache where possible.
    ///
    /// Misses are fetched concurrently and written back to the cache.
    pub async fn load_abis(&self) -> Result<AbiTimezoneDecoder> {
        let fetches = self.deployment.all_contracts().into_iter().map(|address| async move {
            match self.abi_cache.get(&address) {
                Some(cached) => Ok::<_, anyhow::Error>((address, cached)),
                None => {
                    let fetched = self.client.contract_abi(address).await?;
                    self.abi_cache.put(&address, &fetched)?;
                    Ok((address, fetched))
                }
            }
        });
        let abis = try_join_all(fetches).await?;

        let mut decoder = AbiTimezoneDecoder::new();
        for (address, abi_json) in abis {
            decoder.insert(address, &abi_json)?;
        }
        Ok(decoder)
    }

    /// Fetch and snapshot all non-reverted registration and timezone-change
    /// calls against the node manager contracts.
    async fn fetch_identity_transactions(&self) -> Result<()> {
        let txns = self
            .fetch_filtered(
                &self.deployment.node_managers,
                &[REGISTER_FUNCTION, SET_TIMEZONE_FUNCTION],
            )
            .await?;
        tracing::info!(count = txns.len(), "Fetched identity transactions");
        self.store.write(SnapshotStore::IDENTITY_SNAPSHOT, &txns)?;
        Ok(())
    }

    /// Fetch and snapshot all non-reverted deposit calls against the deposit
    /// pool contracts.
    async fn fetch_deposit_transactions(&self) -> Result<()> {
        let txns =
            self.fetch_filtered(&self.deployment.deposit_pools, &[DEPOSIT_FUNCTION]).await?;
        tracing::info!(count = txns.len(), "Fetched deposit transactions");
        self.store.write(SnapshotStore::DEPOSIT_SNAPSHOT, &txns)?;
        Ok(())
    }

    /// Query all contract versions concurrently; the rate limiter serializes
    /// the actual requests under the quota.
    async fn fetch_filtered(
        &self,
        addresses: &[Address],
        fragments: &[&str],
    ) -> Result<Vec<RawTransaction>> {
        let batches = try_join_all(
            addresses.iter().map(|&address| self.client.normal_transactions(address)),
        )
        .await?;
        Ok(batches.into_iter().flatten().filter(|tx| is_relevant(tx, fragments)).collect())
    }

    /// Merge the snapshots into the attribution ledger and persist it.
    pub fn compile(&self, decoder: &AbiTimezoneDecoder) -> Result<()> {
        let identity_txns: Vec<RawTransaction> =
            self.store.read(SnapshotStore::IDENTITY_SNAPSHOT)?;
        let deposit_txns: Vec<RawTransaction> =
            self.store.read(SnapshotStore::DEPOSIT_SNAPSHOT)?;

        let identity_events = extract_identity_events(&identity_txns, decoder);
        let deposits = extract_deposit_events(&deposit_txns);
        tracing::info!(
            identity_events = identity_events.len(),
            deposits = deposits.len(),
            "Decoded event streams"
        );

        let ledger = compile_attribution_ledger(&identity_events, &deposits);
        tracing::info!(entries = ledger.len(), "Compiled attribution ledger");
        self.store.write(SnapshotStore::LEDGER_OUTPUT, &ledger)?;
        Ok(())
    }
}
