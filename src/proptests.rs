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

use crate::fpgrowth::{mine_with, ItemSet, MiningConfig};
use crate::fptree::FPTree;
use crate::hmine::{mine_hlink, Strategy as Miner};
use crate::index::Index;
use crate::item::Item;
use crate::itemizer::Itemizer;
use crate::spill::{read_tree, write_tree};

use proptest::prelude::*;

const NUM_ITEMS: u32 = 8;

fn transactions_strategy() -> impl Strategy<Value = Vec<Vec<Item>>> {
    let transaction = prop::collection::btree_set(1u32..=NUM_ITEMS, 1..=5)
        .prop_map(|ids| ids.into_iter().map(Item::with_id).collect::<Vec<Item>>())
        .prop_shuffle();
    prop::collection::vec(transaction, 0..=40)
}

fn build(transactions: &[Vec<Item>]) -> FPTree {
    let mut tree = FPTree::new();
    for transaction in transactions {
        tree.insert(transaction).unwrap();
    }
    tree
}

// Every non-empty subset of the item universe that occurs at least
// `min_count` times.
fn brute_force(transactions: &[Vec<Item>], min_count: u32) -> Vec<ItemSet> {
    let mut index = Index::new();
    for transaction in transactions {
        index.insert(transaction);
    }
    let mut itemsets = vec![];
    for mask in 1u32..(1 << NUM_ITEMS) {
        let items: Vec<Item> = (0..NUM_ITEMS)
            .filter(|bit| mask & (1 << bit) != 0)
            .map(|bit| Item::with_id(bit + 1))
            .collect();
        let count = index.count(&items);
        if count >= min_count.max(1) {
            itemsets.push(ItemSet::new(items, count));
        }
    }
    itemsets.sort();
    itemsets
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_invariants_hold_after_every_insert(transactions in transactions_strategy()) {
        let mut tree = FPTree::new();
        for (n, transaction) in transactions.iter().enumerate() {
            tree.insert(transaction).unwrap();
            prop_assert!(tree.check_invariants().is_ok(), "{:?}", tree.check_invariants());
            prop_assert_eq!(tree.num_transactions() as usize, n + 1);
        }
        prop_assert_eq!(tree.nodes.num_tombstoned(), 0);
        for id in 1..=NUM_ITEMS {
            let item = Item::with_id(id);
            let expected = transactions.iter().filter(|t| t.contains(&item)).count() as u32;
            prop_assert_eq!(tree.item_count().get(&item), expected);
        }
    }

    #[test]
    fn prop_fp_growth_matches_brute_force(
        transactions in transactions_strategy(),
        min_count in 1u32..4,
    ) {
        let tree = build(&transactions);
        let config = MiningConfig { min_count, ..MiningConfig::default() };
        let mined = mine_with(&tree, &config).unwrap();
        prop_assert_eq!(&mined, &brute_force(&transactions, min_count));
        prop_assert_eq!(mine_with(&tree, &config).unwrap(), mined);
    }

    #[test]
    fn prop_h_mine_matches_fp_growth(
        transactions in transactions_strategy(),
        min_count in 1u32..4,
        max_pattern_length in 1usize..5,
        top_k in 1usize..10,
    ) {
        let config = MiningConfig { top_k, min_count, max_pattern_length };
        let fp = Miner::FpGrowth.mine_transactions(&transactions, &config).unwrap();
        let hm = Miner::HMine.mine_transactions(&transactions, &config).unwrap();
        prop_assert_eq!(&fp, &hm);

        let unbounded = mine_hlink(&transactions, min_count, max_pattern_length).unwrap();
        let expected: Vec<ItemSet> = brute_force(&transactions, min_count)
            .into_iter()
            .filter(|itemset| itemset.len() <= max_pattern_length)
            .collect();
        prop_assert_eq!(unbounded, expected);
    }

    #[test]
    fn prop_spill_round_trip(transactions in transactions_strategy()) {
        let mut itemizer = Itemizer::new();
        for id in 1..=NUM_ITEMS {
            itemizer.id_of(&format!("item{}", id));
        }
        let tree = build(&transactions);
        let mut buffer = vec![];
        write_tree(&tree, &itemizer, &mut buffer).unwrap();
        let restored = read_tree(&buffer[..], &mut itemizer).unwrap();

        prop_assert!(restored.check_invariants().is_ok());
        prop_assert_eq!(restored.num_nodes(), tree.num_nodes());
        prop_assert_eq!(restored.num_transactions(), tree.num_transactions());
        let config = MiningConfig::default();
        prop_assert_eq!(mine_with(&restored, &config).unwrap(), mine_with(&tree, &config).unwrap());
    }
}
