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

//! Flat-file JSON persistence for transaction snapshots and the ledger.

use std::{fs, path::PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },
}

/// JSON files under a single data directory.
///
/// Fetch phases snapshot the filtered raw transactions here so the compile
/// phase can run repeatedly (or offline) against the same inputs; the
/// compiled ledger is written alongside.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Raw registration/timezone-change transactions, post-filter.
    pub const IDENTITY_SNAPSHOT: &'static str = "identity_transactions.json";
    /// Raw deposit transactions, post-filter.
    pub const DEPOSIT_SNAPSHOT: &'static str = "deposit_transactions.json";
    /// The compiled attribution ledger.
    pub const LEDGER_OUTPUT: &'static str = "attribution_ledger.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;
        let path = self.path(name);
        let data = serde_json::to_vec(value)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        fs::write(&path, data).map_err(|source| StoreError::Io { path, source })
    }

    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.path(name);
        let data =
            fs::read(&path).map_err(|source| StoreError::Io { path: path.clone(), source })?;
        serde_json::from_slice(&data).map_err(|source| StoreError::Json { path, source })
    }
}

#[cfg(test)]
mod tests {
    use nodetz_attribution::RawTransaction;

    use super::*;

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let txns = vec![RawTransaction {
            hash: "0xabc".to_string(),
            from: "0x1111111111111111111111111111111111111111".to_string(),
            to: "0x2222222222222222222222222222222222222222".to_string(),
            input: "0x".to_string(),
            block_number: "100".to_string(),
            time_stamp: "1600000000".to_string(),
            is_error: "0".to_string(),
            function_name: "deposit()".to_string(),
        }];
        store.write(SnapshotStore::DEPOSIT_SNAPSHOT, &txns).unwrap();

        let loaded: Vec<RawTransaction> = store.read(SnapshotStore::DEPOSIT_SNAPSHOT).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].hash, "0xabc");
    }

    #[test]
    fn missing_snapshot_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let result: Result<Vec<RawTransaction>, _> =
            store.read(SnapshotStore::IDENTITY_SNAPSHOT);
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn malformed_snapshot_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path(SnapshotStore::IDENTITY_SNAPSHOT), b"not json").unwrap();
        let result: Result<Vec<RawTransaction>, _> =
            store.read(SnapshotStore::IDENTITY_SNAPSHOT);
        assert!(matches!(result, Err(StoreError::Json { .. })));
    }
}
