// Copyright 2018 Chris Pearce
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Incrementally maintained FP-trees with FP-Growth and H-Mine miners.
//!
//! Transactions are inserted one at a time into an [`FPTree`] that keeps
//! every path in item priority order, restructuring paths in place when an
//! item's count overtakes another's. The tree can be mined directly, spilled
//! to disk and restored, or the transactions mined with H-Mine instead.

pub mod arena;
pub mod error;
pub mod fpgrowth;
pub mod fptree;
pub mod hmine;
pub mod index;
pub mod item;
pub mod item_counter;
pub mod itemizer;
pub mod pattern_file;
mod reconstruct;
pub mod spill;
pub mod transaction_reader;

#[cfg(test)]
mod proptests;

pub use crate::error::{Error, Result};
pub use crate::fpgrowth::{mine, mine_with, ItemSet, MiningConfig};
pub use crate::fptree::FPTree;
pub use crate::hmine::{mine_hlink, Strategy};
pub use crate::index::Index;
pub use crate::item::Item;
pub use crate::itemizer::Itemizer;
