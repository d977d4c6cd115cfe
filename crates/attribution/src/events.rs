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

//! Raw transaction records and their extraction into typed event streams.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{DEPOSIT_FUNCTION, REGISTER_FUNCTION, SET_TIMEZONE_FUNCTION};

/// A normal transaction as returned by the account `txlist` endpoint.
///
/// Every field arrives as a string on the wire, including the numeric ones.
/// Records are parsed best-effort: anything malformed is logged and dropped
/// during extraction rather than failing the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub input: String,
    pub block_number: String,
    pub time_stamp: String,
    pub is_error: String,
    pub function_name: String,
}

/// Decodes the timezone string argument out of a manager-contract call.
///
/// Implemented outside this crate (the indexer decodes against contract ABIs
/// fetched at runtime); the extraction below depends only on this interface.
pub trait TimezoneDecoder {
    /// Decode the first parameter of the given call as a timezone string.
    fn decode_timezone(
        &self,
        contract: Address,
        function_name: &str,
        input: &[u8],
    ) -> anyhow::Result<String>;
}

/// Whether an identity event establishes or changes an operator's timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Register,
    SetTimezone,
}

/// A node registration or timezone change by one operator
#[derive(Debug, Clone)]
pub struct IdentityEvent {
    pub actor: Address,
    pub block_number: u64,
    pub timestamp: u64,
    pub timezone: String,
    pub kind: IdentityKind,
}

/// One unit of capital committed by an operator
#[derive(Debug, Clone)]
pub struct DepositEvent {
    pub actor: Address,
    pub block_number: u64,
    pub timestamp: u64,
}

/// Filter shared by the fetch and compile phases: keep non-reverted calls
/// whose function name contains one of the given fragments.
pub fn is_relevant(tx: &RawTransaction, fragments: &[&str]) -> bool {
    tx.is_error == "0" && fragments.iter().any(|f| tx.function_name.contains(f))
}

/// Extract registration and timezone-change events from raw transactions.
///
/// Records that fail to parse or decode are logged and skipped; a single bad
/// transaction never aborts the run.
pub fn extract_identity_events(
    txns: &[RawTransaction],
    decoder: &impl TimezoneDecoder,
) -> Vec<IdentityEvent> {
    let mut events = Vec::new();
    for tx in txns {
        if !is_relevant(tx, &[REGISTER_FUNCTION, SET_TIMEZONE_FUNCTION]) {
            continue;
        }
        let Some((actor, block_number, timestamp)) = parse_common(tx) else {
            continue;
        };
        let contract = match tx.to.parse::<Address>() {
            Ok(contract) => contract,
            Err(err) => {
                tracing::warn!(%err, hash = %tx.hash, "Invalid contract address, dropping transaction");
                continue;
            }
        };
        let input = match hex::decode(tx.input.trim_start_matches("0x")) {
            Ok(input) => input,
            Err(err) => {
                tracing::warn!(%err, hash = %tx.hash, "Invalid calldata hex, dropping transaction");
                continue;
            }
        };
        let timezone = match decoder.decode_timezone(contract, &tx.function_name, &input) {
            Ok(timezone) => timezone,
            Err(err) => {
                tracing::warn!(%err, hash = %tx.hash, "Failed to decode timezone argument, dropping transaction");
                continue;
            }
        };
        let kind = if tx.function_name.contains(REGISTER_FUNCTION) {
            IdentityKind::Register
        } else {
            IdentityKind::SetTimezone
        };
        events.push(IdentityEvent { actor, block_number, timestamp, timezone, kind });
    }
    events
}

/// Extract deposit events from raw transactions against the deposit pools.
pub fn extract_deposit_events(txns: &[RawTransaction]) -> Vec<DepositEvent> {
    txns.iter()
        .filter(|tx| is_relevant(tx, &[DEPOSIT_FUNCTION]))
        .filter_map(|tx| {
            let (actor, block_number, timestamp) = parse_common(tx)?;
            Some(DepositEvent { actor, block_number, timestamp })
        })
        .collect()
}

fn parse_common(tx: &RawTransaction) -> Option<(Address, u64, u64)> {
    let actor = match tx.from.parse::<Address>() {
        Ok(actor) => actor,
        Err(err) => {
            tracing::warn!(%err, hash = %tx.hash, "Invalid sender address, dropping transaction");
            return None;
        }
    };
    let block_number = match tx.block_number.parse::<u64>() {
        Ok(block_number) => block_number,
        Err(err) => {
            tracing::warn!(%err, hash = %tx.hash, "Invalid block number, dropping transaction");
            return None;
        }
    };
    let timestamp = match tx.time_stamp.parse::<u64>() {
        Ok(timestamp) => timestamp,
        Err(err) => {
            tracing::warn!(%err, hash = %tx.hash, "Invalid timestamp, dropping transaction");
            return None;
        }
    };
    Some((actor, block_number, timestamp))
}
