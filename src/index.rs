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

use crate::item::Item;

/// Per-item transaction id lists, for counting itemsets by brute force.
#[derive(Debug, Default)]
pub struct Index {
    index: Vec<Vec<usize>>,
    transaction_count: usize,
}

impl Index {
    pub fn new() -> Index {
        Index {
            index: Vec::new(),
            transaction_count: 0,
        }
    }

    pub fn insert(&mut self, transaction: &[Item]) {
        let tid = self.transaction_count;
        self.transaction_count += 1;
        for item in transaction {
            let item_index = item.as_index();
            if self.index.len() <= item_index {
                self.index.resize(item_index + 1, vec![]);
            }
            self.index[item_index].push(tid);
        }
    }

    pub fn num_transactions(&self) -> usize {
        self.transaction_count
    }

    /// Number of transactions containing every item of `itemset`.
    pub fn count(&self, itemset: &[Item]) -> u32 {
        if itemset.is_empty() {
            return 0;
        }
        let mut tid_lists: Vec<&Vec<usize>> = vec![];
        for item in itemset {
            match self.index.get(item.as_index()) {
                Some(tids) => tid_lists.push(tids),
                None => return 0,
            }
        }
        if tid_lists.len() == 1 {
            return tid_lists[0].len() as u32;
        }

        let mut p: Vec<usize> = vec![0; tid_lists.len()];

        // For each tid in the first item's list of tids.
        let mut count = 0;
        for &tid in tid_lists[0].iter() {
            // Check whether all the other tid lists contain that tid.
            let mut tid_in_all_item_tid_lists = true;
            for i in 1..tid_lists.len() {
                while p[i] < tid_lists[i].len() && tid_lists[i][p[i]] < tid {
                    p[i] += 1;
                }
                if p[i] == tid_lists[i].len() || tid_lists[i][p[i]] != tid {
                    tid_in_all_item_tid_lists = false;
                    break;
                }
            }
            if tid_in_all_item_tid_lists {
                count += 1
            }
        }
        count
    }

    pub fn support(&self, itemset: &[Item]) -> f64 {
        if self.transaction_count == 0 {
            return 0.0;
        }
        self.count(itemset) as f64 / self.transaction_count as f64
    }
}
