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

//! Reconciliation of identity and deposit event streams into the ledger.

use std::collections::HashMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::events::{DepositEvent, IdentityEvent, IdentityKind};

/// One signed line of the attribution ledger: at `block_number`, the
/// attribution of one unit of `actor`'s capital to `timezone` changed by
/// `weight` (always -1 or +1). Entries are append-only output and never
/// mutated once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorEntry {
    pub actor: Address,
    pub block_number: u64,
    pub timestamp: u64,
    pub timezone: String,
    pub weight: i64,
}

/// Merge identity and deposit event streams into the ordered attribution
/// ledger.
///
/// Each deposit picks up its initial timezone from the actor's registration.
/// Timezone changes are applied per actor in ascending block order: a change
/// at or after a deposit's block emits a removal/addition pair at the
/// change's block (netting to zero, so one unit of capital maps to exactly
/// one timezone at every instant), while a change before the deposit
/// reassigns the deposit's initial timezone in place, since the deposit never
/// existed under the old one.
///
/// A deposit with no matching registration is a data-integrity defect in the
/// source data; it is logged and excluded from the ledger. A registration at
/// a later block than the deposit still supplies its timezone (the protocol
/// requires registering before depositing, so such records only appear in
/// inconsistent source data); this is logged at debug level. The returned
/// sequence is stably sorted by block height; relative order within a block
/// carries no meaning.
pub fn compile_attribution_ledger(
    identity_events: &[IdentityEvent],
    deposits: &[DepositEvent],
) -> Vec<AccumulatorEntry> {
    let mut registrations: HashMap<Address, &IdentityEvent> = HashMap::new();
    let mut changes_by_actor: HashMap<Address, Vec<&IdentityEvent>> = HashMap::new();

    for event in identity_events {
        match event.kind {
            IdentityKind::Register => {
                if let Some(existing) = registrations.get(&event.actor) {
                    tracing::warn!(
                        actor = %event.actor,
                        "Multiple registrations for actor, keeping earliest"
                    );
                    if event.block_number < existing.block_number {
                        registrations.insert(event.actor, event);
                    }
                } else {
                    registrations.insert(event.actor, event);
                }
            }
            IdentityKind::SetTimezone => {
                changes_by_actor.entry(event.actor).or_default().push(event)
            }
        }
    }
    for changes in changes_by_actor.values_mut() {
        changes.sort_by_key(|event| event.block_number);
    }

    let mut initial_entries = Vec::with_capacity(deposits.len());
    let mut migration_entries = Vec::new();

    for deposit in deposits {
        let Some(registration) = registrations.get(&deposit.actor) else {
            tracing::warn!(
                actor = %deposit.actor,
                block = deposit.block_number,
                "Deposit has no matching registration, excluding from ledger"
            );
            continue;
        };
        if registration.block_number > deposit.block_number {
            tracing::debug!(
                actor = %deposit.actor,
                deposit_block = deposit.block_number,
                registration_block = registration.block_number,
                "Deposit precedes its registration"
            );
        }

        // `initial` is the timezone the deposit's own +1 entry is attributed
        // to; `current` additionally tracks migrations that postdate the
        // deposit, so each removal carries the timezone held immediately
        // before its change.
        let mut initial = registration.timezone.clone();
        let mut current = registration.timezone.clone();

        for change in
            changes_by_actor.get(&deposit.actor).map(Vec::as_slice).unwrap_or_default()
        {
            if deposit.block_number <= change.block_number {
                migration_entries.push(AccumulatorEntry {
                    actor: deposit.actor,
                    block_number: change.block_number,
                    timestamp: change.timestamp,
                    timezone: current.clone(),
                    weight: -1,
                });
                migration_entries.push(AccumulatorEntry {
                    actor: deposit.actor,
                    block_number: change.block_number,
                    timestamp: change.timestamp,
                    timezone: change.timezone.clone(),
                    weight: 1,
                });
                current = change.timezone.clone();
            } else {
                initial = change.timezone.clone();
                current = change.timezone.clone();
            }
        }

        initial_entries.push(AccumulatorEntry {
            actor: deposit.actor,
            block_number: deposit.block_number,
            timestamp: deposit.timestamp,
            timezone: initial,
            weight: 1,
        });
    }

    let mut ledger = initial_entries;
    ledger.extend(migration_entries);
    // Stable sort: entries sharing a block keep their insertion order.
    ledger.sort_by_key(|entry| entry.block_number);
    ledger
}
