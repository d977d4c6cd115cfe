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

//! Timezone attribution computation for staked node capital.
//!
//! Node operators declare a timezone when they register and may change it
//! later. This crate reconstructs, from decoded transaction records, a
//! chronological ledger of signed entries attributing each unit of deposited
//! capital to a timezone at every block in history.

// Declare modules
pub mod events;
pub mod ledger;

// Re-export commonly used types
pub use events::{
    extract_deposit_events, extract_identity_events, is_relevant, DepositEvent, IdentityEvent,
    IdentityKind, RawTransaction, TimezoneDecoder,
};

pub use ledger::{compile_attribution_ledger, AccumulatorEntry};

/// Function name fragment identifying node registration calls
pub const REGISTER_FUNCTION: &str = "registerNode";
/// Function name fragment identifying timezone change calls
pub const SET_TIMEZONE_FUNCTION: &str = "setTimezone";
/// Function name fragment identifying node deposit calls
pub const DEPOSIT_FUNCTION: &str = "deposit";
