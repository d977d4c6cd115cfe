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

//! Calldata decoding against contract interfaces fetched at runtime.

use std::collections::HashMap;

use alloy::{dyn_abi::JsonAbiExt, json_abi::JsonAbi, primitives::Address};
use anyhow::{anyhow, Context, Result};
use nodetz_attribution::TimezoneDecoder;

/// Decodes timezone arguments using the JSON ABIs of the known contracts.
///
/// The manager contracts are not known at compile time (several historical
/// versions exist), so interfaces are parsed from the ABI JSON the API
/// returns rather than generated bindings.
#[derive(Debug, Default)]
pub struct AbiTimezoneDecoder {
    interfaces: HashMap<Address, JsonAbi>,
}

impl AbiTimezoneDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON ABI for a contract address.
    pub fn insert(&mut self, address: Address, abi_json: &str) -> Result<()> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .with_context(|| format!("Invalid ABI JSON for {address}"))?;
        self.interfaces.insert(address, abi);
        Ok(())
    }
}

impl TimezoneDecoder for AbiTimezoneDecoder {
    fn decode_timezone(
        &self,
        contract: Address,
        function_name: &str,
        input: &[u8],
    ) -> Result<String> {
        let abi = self
            .interfaces
            .get(&contract)
            .ok_or_else(|| anyhow!("No ABI loaded for contract {contract}"))?;
        // The API reports the full signature, e.g. "registerNode(string _timezoneLocation)".
        let name = function_name.split('(').next().unwrap_or(function_name).trim();
        let function = abi
            .function(name)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| anyhow!("Function {name} not present in ABI for {contract}"))?;
        let calldata = input
            .get(4..)
            .ok_or_else(|| anyhow!("Calldata for {name} is shorter than a selector"))?;
        let values = function
            .abi_decode_input(calldata)
            .with_context(|| format!("Failed to decode {name} calldata"))?;
        values
            .first()
            .and_then(|value| value.as_str())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("First argument of {name} is not a string"))
    }
}
