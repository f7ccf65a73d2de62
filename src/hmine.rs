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

//! H-Mine: frequent itemsets mined straight off the transactions.
//!
//! Each transaction is kept as a row of cells in priority order. A header
//! table holds, per frequent item, its support and a queue of rows threaded
//! through the cells' hyperlinks. Mining an entry projects its queue onto a
//! local header, recurses, then moves every row in the queue on to the
//! queue of its next item.

use crate::error::{Error, Result};
use crate::fpgrowth::{mine_with, ItemSet, MiningConfig};
use crate::fptree::FPTree;
use crate::item::Item;
use crate::item_counter::ItemCounter;
use fnv::{FnvHashMap, FnvHashSet};
use std::str::FromStr;
use tracing::{debug, info_span};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Link {
    row: usize,
    pos: usize,
}

#[derive(Debug)]
struct Cell {
    item: Item,
    next: Option<Link>,
}

#[derive(Debug)]
struct HeaderEntry {
    item: Item,
    count: u32,
    head: Option<Link>,
}

#[derive(Debug)]
struct Header {
    entries: Vec<HeaderEntry>,
    index: FnvHashMap<Item, usize>,
}

impl Header {
    // `items` must already be in priority order.
    fn new(items: Vec<(Item, u32)>) -> Header {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, &(item, _))| (item, i))
            .collect();
        let entries = items
            .into_iter()
            .map(|(item, count)| HeaderEntry {
                item,
                count,
                head: None,
            })
            .collect();
        Header { entries, index }
    }

    fn contains(&self, item: &Item) -> bool {
        self.index.contains_key(item)
    }

    fn link(&mut self, rows: &mut [Vec<Cell>], at: Link) {
        let cell = &mut rows[at.row][at.pos];
        if let Some(&i) = self.index.get(&cell.item) {
            cell.next = self.entries[i].head;
            self.entries[i].head = Some(at);
        }
    }
}

struct HStruct {
    rows: Vec<Vec<Cell>>,
    rank: FnvHashMap<Item, usize>,
    min_count: u32,
    max_pattern_length: usize,
    itemsets: Vec<ItemSet>,
}

impl HStruct {
    fn queue(&self, head: Option<Link>) -> Vec<Link> {
        let mut links = vec![];
        let mut next = head;
        while let Some(link) = next {
            links.push(link);
            next = self.rows[link.row][link.pos].next;
        }
        links
    }

    /// Counts the items following each queued cell and threads every row
    /// onto its first locally frequent item.
    fn local_header(&mut self, queue: &[Link]) -> Option<Header> {
        let mut counts: FnvHashMap<Item, u32> = FnvHashMap::default();
        for link in queue {
            for cell in &self.rows[link.row][link.pos + 1..] {
                *counts.entry(cell.item).or_insert(0) += 1;
            }
        }
        let mut items: Vec<(Item, u32)> = counts
            .into_iter()
            .filter(|&(_, count)| count >= self.min_count)
            .collect();
        if items.is_empty() {
            return None;
        }
        items.sort_by_key(|(item, _)| self.rank[item]);
        let mut header = Header::new(items);
        for link in queue {
            if let Some(pos) = self.next_in(&header, *link) {
                header.link(&mut self.rows, Link { row: link.row, pos });
            }
        }
        Some(header)
    }

    fn next_in(&self, header: &Header, link: Link) -> Option<usize> {
        let row = &self.rows[link.row];
        (link.pos + 1..row.len()).find(|&pos| header.contains(&row[pos].item))
    }

    fn mine(&mut self, header: &mut Header, prefix: &mut Vec<Item>) {
        for i in 0..header.entries.len() {
            let (item, count, head) = {
                let entry = &header.entries[i];
                (entry.item, entry.count, entry.head)
            };
            prefix.push(item);
            self.itemsets.push(ItemSet::new(prefix.clone(), count));
            let queue = self.queue(head);
            if prefix.len() < self.max_pattern_length {
                if let Some(mut local) = self.local_header(&queue) {
                    self.mine(&mut local, prefix);
                }
            }
            prefix.pop();

            for link in queue {
                if let Some(pos) = self.next_in(header, link) {
                    header.link(&mut self.rows, Link { row: link.row, pos });
                }
            }
        }
    }
}

/// Mines every itemset occurring in at least `support_threshold`
/// transactions, up to `max_pattern_length` items long.
pub fn mine_hlink(
    transactions: &[Vec<Item>],
    support_threshold: u32,
    max_pattern_length: usize,
) -> Result<Vec<ItemSet>> {
    let _span = info_span!(
        "h_mine",
        transactions = transactions.len(),
        support_threshold
    )
    .entered();
    let min_count = support_threshold.max(1);

    let mut item_count = ItemCounter::new();
    for transaction in transactions {
        let mut seen = FnvHashSet::default();
        for &item in transaction {
            if item.is_null() {
                return Err(Error::NullItem);
            }
            if !seen.insert(item) {
                return Err(Error::DuplicateItem(item));
            }
        }
        for item in transaction {
            item_count.add(item, 1);
        }
    }
    if max_pattern_length == 0 {
        return Ok(vec![]);
    }

    let frequent = item_count.items_with_count_at_least(min_count);
    let rank: FnvHashMap<Item, usize> = frequent
        .iter()
        .enumerate()
        .map(|(i, &item)| (item, i))
        .collect();

    let mut rows: Vec<Vec<Cell>> = vec![];
    for transaction in transactions {
        let mut kept: Vec<Item> = transaction
            .iter()
            .filter(|item| rank.contains_key(*item))
            .cloned()
            .collect();
        if kept.is_empty() {
            continue;
        }
        kept.sort_by_key(|item| rank[item]);
        rows.push(
            kept.into_iter()
                .map(|item| Cell { item, next: None })
                .collect(),
        );
    }

    let mut header = Header::new(
        frequent
            .iter()
            .map(|&item| (item, item_count.get(&item)))
            .collect(),
    );
    for row in 0..rows.len() {
        header.link(&mut rows, Link { row, pos: 0 });
    }
    debug!(
        rows = rows.len(),
        frequent_items = frequent.len(),
        "built hyperlinked structure"
    );

    let mut hstruct = HStruct {
        rows,
        rank,
        min_count,
        max_pattern_length,
        itemsets: vec![],
    };
    hstruct.mine(&mut header, &mut vec![]);

    let mut itemsets = hstruct.itemsets;
    itemsets.sort();
    Ok(itemsets)
}

/// Which miner to run over a set of transactions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    FpGrowth,
    HMine,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Strategy, String> {
        match s.to_ascii_lowercase().as_str() {
            "fpgrowth" | "fp-growth" => Ok(Strategy::FpGrowth),
            "hmine" | "h-mine" => Ok(Strategy::HMine),
            _ => Err(format!("Unknown algorithm '{}'", s)),
        }
    }
}

impl Strategy {
    /// Mines `transactions` with either engine. Empty transactions are
    /// skipped; both engines report the same itemsets for the same config.
    pub fn mine_transactions(
        &self,
        transactions: &[Vec<Item>],
        config: &MiningConfig,
    ) -> Result<Vec<ItemSet>> {
        match self {
            Strategy::FpGrowth => {
                let mut tree = FPTree::new();
                for transaction in transactions.iter().filter(|t| !t.is_empty()) {
                    tree.insert(transaction)?;
                }
                mine_with(&tree, config)
            }
            Strategy::HMine => {
                let itemsets =
                    mine_hlink(transactions, config.min_count, config.max_pattern_length)?;
                if config.top_k == usize::MAX {
                    return Ok(itemsets);
                }
                // Starting from the top-k items only ever pairs them with
                // higher-priority items, so every item must be in the top k.
                let mut item_count = ItemCounter::new();
                for item in transactions.iter().flatten() {
                    item_count.add(item, 1);
                }
                let top: FnvHashSet<Item> = item_count.top_k(config.top_k).into_iter().collect();
                Ok(itemsets
                    .into_iter()
                    .filter(|itemset| itemset.items.iter().all(|item| top.contains(item)))
                    .collect())
            }
        }
    }
}
