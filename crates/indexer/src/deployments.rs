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

//! Known contract address sets for the analyzed staking protocol.

use alloy::primitives::{address, Address};

/// Contract addresses observed for one deployment of the staking protocol.
///
/// Node manager contracts receive the registration and timezone-change
/// calls; deposit pool contracts receive node deposits. Several versions of
/// each contract have been live over the observation period, so both sets
/// carry every historical address.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub node_managers: Vec<Address>,
    pub deposit_pools: Vec<Address>,
}

impl Deployment {
    /// Ethereum mainnet Rocket Pool deployment, all historical contract
    /// versions.
    pub fn mainnet() -> Self {
        Self {
            node_managers: vec![
                address!("0x372236c940f572020c0c0eb1ac7212460e4e5a33"),
                address!("0x4477fbf4af5b34e49662d9217681a763ddc0a322"),
                address!("0x67cde7af920682a29fcfea1a179ef0f30f48df3e"),
            ],
            deposit_pools: vec![
                address!("0x1cc9cf5586522c6f483e84a19c3c2b0b6d027bf0"),
                address!("0xdcd51fc5cd918e0461b9b7fb75967fdfd10dae2f"),
            ],
        }
    }

    /// Every contract address the indexer needs an ABI for.
    pub fn all_contracts(&self) -> Vec<Address> {
        self.node_managers.iter().chain(self.deposit_pools.iter()).copied().collect()
    }
}
