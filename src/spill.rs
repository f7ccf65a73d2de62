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

//! Level-order spill format for trees.
//!
//! One JSON record per line. The root comes first, then for each level every
//! node's children in item-id order, each group closed by a `$` record and
//! each level closed by a `#` record. The stream ends after the `#` of the
//! first level with no children.

use crate::arena::{FPNode, NodeId};
use crate::error::{Error, Result};
use crate::fptree::FPTree;
use crate::itemizer::Itemizer;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use tracing::debug;

const ROOT_COUNTER: i64 = -1;
const SEPARATOR_COUNTER: i64 = -2;
const LEVEL_SEPARATOR: &str = "#";
const SIBLING_SEPARATOR: &str = "$";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub item: String,
    pub counter: i64,
}

impl NodeRecord {
    fn separator(item: &str) -> NodeRecord {
        NodeRecord {
            item: String::from(item),
            counter: SEPARATOR_COUNTER,
        }
    }

    fn is_separator(&self, item: &str) -> bool {
        self.counter == SEPARATOR_COUNTER && self.item == item
    }
}

fn write_record<W: Write>(writer: &mut W, record: &NodeRecord) -> Result<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

pub fn write_tree<W: Write>(tree: &FPTree, itemizer: &Itemizer, mut writer: W) -> Result<()> {
    write_record(
        &mut writer,
        &NodeRecord {
            item: String::new(),
            counter: ROOT_COUNTER,
        },
    )?;
    write_record(&mut writer, &NodeRecord::separator(LEVEL_SEPARATOR))?;

    let mut level = vec![tree.root()];
    let mut records = 1;
    loop {
        let mut next_level = vec![];
        for &id in &level {
            let node = tree.node(id)?;
            let mut children: Vec<NodeId> = node.children.values().copied().collect();
            children.sort_by_key(|&child| tree.get(child).map(|n| n.item));
            for child in children {
                let child_node = tree.node(child)?;
                write_record(
                    &mut writer,
                    &NodeRecord {
                        item: String::from(itemizer.str_of(child_node.item)),
                        counter: i64::from(child_node.count),
                    },
                )?;
                next_level.push(child);
                records += 1;
            }
            write_record(&mut writer, &NodeRecord::separator(SIBLING_SEPARATOR))?;
        }
        write_record(&mut writer, &NodeRecord::separator(LEVEL_SEPARATOR))?;
        if next_level.is_empty() {
            break;
        }
        level = next_level;
    }
    writer.flush()?;
    debug!(records, "wrote tree");
    Ok(())
}

struct RecordReader<R: BufRead> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> RecordReader<R> {
    fn next(&mut self) -> Result<NodeRecord> {
        let text = match self.lines.next() {
            Some(text) => text?,
            None => return Err(Error::Truncated),
        };
        self.line += 1;
        serde_json::from_str(&text).map_err(|err| self.malformed(err.to_string()))
    }

    fn malformed(&self, reason: String) -> Error {
        Error::Malformed {
            line: self.line,
            reason,
        }
    }
}

/// Rebuilds a tree written by [`write_tree`]. Labels are interned into
/// `itemizer`, and the restored paths must follow the priority order those
/// ids give, so restore with the itemizer the tree was built with.
pub fn read_tree<R: BufRead>(reader: R, itemizer: &mut Itemizer) -> Result<FPTree> {
    let mut records = RecordReader {
        lines: reader.lines(),
        line: 0,
    };
    let root = records.next()?;
    if root.counter != ROOT_COUNTER {
        return Err(records.malformed(String::from("expected root record")));
    }
    if !records.next()?.is_separator(LEVEL_SEPARATOR) {
        return Err(records.malformed(String::from("expected level separator after root")));
    }

    let mut tree = FPTree::new();
    let mut parents = vec![tree.root()];
    loop {
        let mut children = vec![];
        for &parent in &parents {
            loop {
                let record = records.next()?;
                if record.is_separator(SIBLING_SEPARATOR) {
                    break;
                }
                if record.counter < 1 {
                    return Err(records.malformed(format!(
                        "unexpected record {:?} in sibling group",
                        record
                    )));
                }
                let count = u32::try_from(record.counter)
                    .map_err(|err| records.malformed(err.to_string()))?;
                let item = itemizer.id_of(&record.item);
                if tree.child_of(parent, item).is_some() {
                    return Err(records.malformed(format!("duplicate child {}", record.item)));
                }
                let child = tree.nodes.alloc(FPNode::new(item, count, Some(parent)));
                tree.node_mut(parent)?.children.insert(item, child);
                tree.append_to_chain(child)?;
                tree.item_count.add(&item, count);
                children.push(child);
            }
        }
        if !records.next()?.is_separator(LEVEL_SEPARATOR) {
            return Err(records.malformed(String::from(
                "sibling groups do not match the previous level",
            )));
        }
        if children.is_empty() {
            break;
        }
        parents = children;
    }

    // Every transaction passes through exactly one child of the root.
    let root = tree.root();
    tree.num_transactions = tree
        .node(root)?
        .children
        .values()
        .filter_map(|&id| tree.get(id))
        .map(|node| node.count)
        .sum();
    tree.check_invariants()?;
    debug!(nodes = tree.num_nodes(), "restored tree");
    Ok(tree)
}

pub fn spill_to_file<P: AsRef<Path>>(tree: &FPTree, itemizer: &Itemizer, path: P) -> Result<()> {
    let file = File::create(path)?;
    write_tree(tree, itemizer, BufWriter::new(file))
}

pub fn restore_from_file<P: AsRef<Path>>(path: P, itemizer: &mut Itemizer) -> Result<FPTree> {
    let file = File::open(path)?;
    read_tree(BufReader::new(file), itemizer)
}
