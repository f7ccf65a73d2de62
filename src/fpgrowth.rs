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

use crate::error::Result;
use crate::fptree::{ConditionalPattern, FPTree};
use crate::item::Item;
use crate::itemizer::Itemizer;
use fnv::FnvHashMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::cmp;
use tracing::{debug, info_span};

#[derive(Clone, Hash, PartialEq, Eq, Debug)]
pub struct ItemSet {
    pub items: Vec<Item>,
    pub count: u32,
}

impl Ord for ItemSet {
    fn cmp(&self, other: &ItemSet) -> cmp::Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.items.cmp(&other.items))
            .then_with(|| self.count.cmp(&other.count))
    }
}

impl PartialOrd for ItemSet {
    fn partial_cmp(&self, other: &ItemSet) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl ItemSet {
    pub fn new(items: Vec<Item>, count: u32) -> ItemSet {
        ItemSet {
            items: items.into_iter().sorted().collect(),
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn labels(&self, itemizer: &Itemizer) -> Vec<String> {
        itemizer.to_str_vec(&self.items)
    }
}

/// Knobs for a mining run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningConfig {
    /// How many of the tree's highest-priority items to start from.
    pub top_k: usize,
    /// Itemsets occurring fewer times than this are not reported.
    pub min_count: u32,
    pub max_pattern_length: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            top_k: usize::MAX,
            min_count: 1,
            max_pattern_length: usize::MAX,
        }
    }
}

impl MiningConfig {
    pub fn with_top_k(top_k: usize) -> MiningConfig {
        MiningConfig {
            top_k,
            ..MiningConfig::default()
        }
    }
}

/// Mines every itemset made up only of the tree's `top_k` highest-priority
/// items. Each of those items is the lowest-priority member of the itemsets
/// mined from it.
pub fn mine(tree: &FPTree, top_k: usize) -> Result<Vec<ItemSet>> {
    mine_with(tree, &MiningConfig::with_top_k(top_k))
}

pub fn mine_with(tree: &FPTree, config: &MiningConfig) -> Result<Vec<ItemSet>> {
    let _span = info_span!(
        "fp_growth",
        top_k = config.top_k,
        min_count = config.min_count,
        transactions = tree.num_transactions()
    )
    .entered();
    if config.max_pattern_length == 0 {
        return Ok(vec![]);
    }
    let min_count = config.min_count.max(1);
    let items: Vec<Item> = tree
        .item_count()
        .top_k(config.top_k)
        .into_iter()
        .filter(|item| tree.item_count().get(item) >= min_count)
        .collect();

    // Each top-level item builds and owns its conditional tree.
    let per_item = items
        .par_iter()
        .map(|&item| -> Result<Vec<ItemSet>> {
            let mut itemsets = vec![];
            mine_item(tree, item, &[], min_count, config.max_pattern_length, &mut itemsets)?;
            Ok(itemsets)
        })
        .collect::<Result<Vec<Vec<ItemSet>>>>()?;

    let mut itemsets: Vec<ItemSet> = per_item.into_iter().flatten().collect();
    itemsets.sort();
    debug!(itemsets = itemsets.len(), "mining finished");
    Ok(itemsets)
}

fn mine_item(
    tree: &FPTree,
    item: Item,
    path: &[Item],
    min_count: u32,
    max_pattern_length: usize,
    itemsets: &mut Vec<ItemSet>,
) -> Result<()> {
    let mut itemset: Vec<Item> = Vec::from(path);
    itemset.push(item);
    let count = tree.item_count().get(&item);
    if itemset.len() < max_pattern_length {
        let conditional_tree = build_conditional_tree(&tree.conditional_patterns(item)?, min_count)?;
        for next in conditional_tree.item_count().items_with_count_at_least(min_count) {
            mine_item(
                &conditional_tree,
                next,
                &itemset,
                min_count,
                max_pattern_length,
                itemsets,
            )?;
        }
    }
    itemsets.push(ItemSet::new(itemset, count));
    Ok(())
}

/// Builds a fresh tree from a conditional pattern base. Items that cannot
/// reach `min_count` within the base are dropped from the paths first.
pub fn build_conditional_tree(patterns: &[ConditionalPattern], min_count: u32) -> Result<FPTree> {
    let mut counts: FnvHashMap<Item, u32> = FnvHashMap::default();
    for pattern in patterns {
        for &item in &pattern.items {
            *counts.entry(item).or_insert(0) += pattern.count;
        }
    }
    let mut conditional_tree = FPTree::new();
    for pattern in patterns {
        let kept: Vec<Item> = pattern
            .items
            .iter()
            .filter(|item| counts.get(*item).map_or(false, |&count| count >= min_count))
            .cloned()
            .collect();
        if kept.is_empty() {
            continue;
        }
        conditional_tree.insert_conditional(&kept, pattern.count)?;
    }
    Ok(conditional_tree)
}
