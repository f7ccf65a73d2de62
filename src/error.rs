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

use std::fmt;
use std::io;

use crate::item::Item;

/// Errors raised while building, mining or spilling a tree.
///
/// There are three families. Input errors reject a single call and leave the
/// tree untouched. Invariant violations mean the tree is corrupt and must be
/// rebuilt from its source transactions. I/O errors come from the spill and
/// pattern file formats.
#[derive(Debug)]
pub enum Error {
    // Input errors.
    DuplicateItem(Item),
    EmptyTransaction,
    NullItem,
    QuotaLengthMismatch { quotas: usize, longest: usize },
    InvalidSupport(f64),

    // Invariant violations.
    MonotonicityViolation { item: Item, counter: u32, child_counter: u32 },
    UnreachableRoot(Item),
    CycleDetected(Item),
    DeleteLiveNode(Item),
    DeleteNonZeroCounter { item: Item, counter: u32 },
    DeleteWithChildren(Item),
    IsolateTombstoned,
    IsolateRoot,
    StaleNode,
    ChainBroken(Item),
    OrderViolation { parent: Item, child: Item },
    CountMismatch { item: Item, expected: u32, found: u32 },

    // I/O errors.
    Io(io::Error),
    Json(serde_json::Error),
    Malformed { line: usize, reason: String },
    Truncated,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the error means the tree's internal state can no longer be
    /// trusted.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::MonotonicityViolation { .. }
                | Error::UnreachableRoot(_)
                | Error::CycleDetected(_)
                | Error::DeleteLiveNode(_)
                | Error::DeleteNonZeroCounter { .. }
                | Error::DeleteWithChildren(_)
                | Error::IsolateTombstoned
                | Error::IsolateRoot
                | Error::StaleNode
                | Error::ChainBroken(_)
                | Error::OrderViolation { .. }
                | Error::CountMismatch { .. }
        )
    }

    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateItem(_)
                | Error::EmptyTransaction
                | Error::NullItem
                | Error::QuotaLengthMismatch { .. }
                | Error::InvalidSupport(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateItem(item) => {
                write!(f, "items are not unique: {:?} appears more than once", item)
            }
            Error::EmptyTransaction => write!(f, "transaction has no items"),
            Error::NullItem => write!(f, "the null item cannot be inserted"),
            Error::QuotaLengthMismatch { quotas, longest } => write!(
                f,
                "{} per-length quotas given but patterns have up to {} items",
                quotas, longest
            ),
            Error::InvalidSupport(support) => {
                write!(f, "support threshold {} is out of range", support)
            }
            Error::MonotonicityViolation {
                item,
                counter,
                child_counter,
            } => write!(
                f,
                "monotonic property broken at {:?}: counter {} below child counter {}",
                item, counter, child_counter
            ),
            Error::UnreachableRoot(item) => {
                write!(f, "unable to reach the root from {:?}", item)
            }
            Error::CycleDetected(item) => write!(f, "cycle found while walking {:?}", item),
            Error::DeleteLiveNode(item) => {
                write!(f, "unable to delete {:?}: node is not tombstoned", item)
            }
            Error::DeleteNonZeroCounter { item, counter } => write!(
                f,
                "unable to delete {:?}: counter is still {}",
                item, counter
            ),
            Error::DeleteWithChildren(item) => {
                write!(f, "unable to delete {:?}: node still has children", item)
            }
            Error::IsolateTombstoned => write!(f, "unable to isolate a tombstoned node"),
            Error::IsolateRoot => write!(f, "unable to isolate the root node"),
            Error::StaleNode => write!(f, "node handle refers to a freed or tombstoned node"),
            Error::ChainBroken(item) => {
                write!(f, "node for {:?} is not reachable from its chain head", item)
            }
            Error::OrderViolation { parent, child } => write!(
                f,
                "{:?} sits above {:?} but ranks below it",
                parent, child
            ),
            Error::CountMismatch {
                item,
                expected,
                found,
            } => write!(
                f,
                "chain counters for {:?} sum to {} but the global count is {}",
                item, found, expected
            ),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "bad record: {}", err),
            Error::Malformed { line, reason } => write!(f, "line {}: {}", line, reason),
            Error::Truncated => write!(f, "stream ended before the tree was complete"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
