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

//! Keyed storage for fetched contract ABIs.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Mutex,
};

use alloy::primitives::Address;
use anyhow::{Context, Result};

/// Cache consulted before fetching a contract ABI from the network.
///
/// Verified ABIs are immutable, so entries never invalidate. A miss simply
/// means the caller fetches and then `put`s.
pub trait AbiCache {
    fn get(&self, address: &Address) -> Option<String>;
    fn put(&self, address: &Address, abi: &str) -> Result<()>;
}

/// One file per contract under the data directory.
pub struct FileAbiCache {
    dir: PathBuf,
}

impl FileAbiCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, address: &Address) -> PathBuf {
        self.dir.join(format!("contract_abi_{address:#x}.json"))
    }
}

impl AbiCache for FileAbiCache {
    fn get(&self, address: &Address) -> Option<String> {
        fs::read_to_string(self.path_for(address)).ok()
    }

    fn put(&self, address: &Address, abi: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;
        fs::write(self.path_for(address), abi)
            .with_context(|| format!("Failed to write cached ABI for {address}"))
    }
}

/// In-memory cache, used in tests.
#[derive(Default)]
pub struct MemoryAbiCache {
    inner: Mutex<HashMap<Address, String>>,
}

impl MemoryAbiCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AbiCache for MemoryAbiCache {
    fn get(&self, address: &Address) -> Option<String> {
        self.inner.lock().expect("abi cache mutex poisoned").get(address).cloned()
    }

    fn put(&self, address: &Address, abi: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("abi cache mutex poisoned")
            .insert(*address, abi.to_string());
        Ok(())
    }
}
