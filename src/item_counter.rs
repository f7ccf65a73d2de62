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
use fnv::{FnvHashMap, FnvHashSet};
use std::cmp::Ordering;

/// Global item counts plus the inverted `count -> items` index.
///
/// Priority is `(count desc, id asc)`: a higher count ranks higher, and on a
/// tie the lower id ranks higher. This is a total order, so every path in
/// the tree can agree on it.
#[derive(Debug, Clone, Default)]
pub struct ItemCounter {
    counter: Vec<u32>,
    count_index: FnvHashMap<u32, FnvHashSet<Item>>,
}

impl ItemCounter {
    pub fn new() -> ItemCounter {
        ItemCounter {
            counter: vec![],
            count_index: FnvHashMap::default(),
        }
    }

    pub fn get(&self, item: &Item) -> u32 {
        let index = item.as_index();
        if index >= self.counter.len() {
            0
        } else {
            self.counter[index]
        }
    }

    /// Overwrites an item's count, keeping the count index in step.
    pub fn set(&mut self, item: &Item, count: u32) {
        let index = item.as_index();
        if self.counter.len() <= index {
            self.counter.resize(index + 1, 0);
        }
        let previous = self.counter[index];
        self.unindex(*item, previous);
        self.counter[index] = count;
        if count > 0 {
            self.count_index.entry(count).or_default().insert(*item);
        }
    }

    pub fn add(&mut self, item: &Item, count: u32) {
        let total = self.get(item) + count;
        self.set(item, total);
    }

    /// Increments `item` by one and returns the losers: the items that
    /// ranked above `item` before the increment and rank below it now.
    ///
    /// With count `c` going to `c + 1` those are the items at `c` with a
    /// lower id, and the items at `c + 1` with a higher id.
    pub fn increment(&mut self, item: Item) -> FnvHashSet<Item> {
        let old = self.get(&item);
        let new = old + 1;
        let mut losers = FnvHashSet::default();
        if let Some(tied) = self.count_index.get(&old) {
            losers.extend(tied.iter().filter(|other| other.id() < item.id()));
        }
        if let Some(above) = self.count_index.get(&new) {
            losers.extend(above.iter().filter(|other| other.id() > item.id()));
        }
        self.set(&item, new);
        losers
    }

    /// Items whose count is exactly `count`.
    pub fn items_with_count(&self, count: u32) -> impl Iterator<Item = &Item> {
        self.count_index.get(&count).into_iter().flatten()
    }

    /// Orders `a` before `b` when `a` has the higher priority.
    pub fn cmp_priority(&self, a: &Item, b: &Item) -> Ordering {
        self.get(b).cmp(&self.get(a)).then_with(|| a.cmp(b))
    }

    pub fn outranks(&self, a: &Item, b: &Item) -> bool {
        self.cmp_priority(a, b) == Ordering::Less
    }

    pub fn sort_descending(&self, v: &mut [Item]) {
        v.sort_by(|a, b| self.cmp_priority(a, b));
    }

    /// Counted items in priority order.
    pub fn items(&self) -> Vec<Item> {
        self.items_with_count_at_least(1)
    }

    /// Items at or above `min_count`, in priority order.
    pub fn items_with_count_at_least(&self, min_count: u32) -> Vec<Item> {
        let min_count = min_count.max(1);
        let mut v: Vec<Item> = vec![];
        for i in 1..self.counter.len() {
            if self.counter[i] >= min_count {
                v.push(Item::with_id(i as u32));
            }
        }
        self.sort_descending(&mut v);
        v
    }

    pub fn top_k(&self, k: usize) -> Vec<Item> {
        let mut items = self.items();
        items.truncate(k);
        items
    }

    pub fn num_items(&self) -> usize {
        self.counter.iter().skip(1).filter(|&&c| c > 0).count()
    }

    fn unindex(&mut self, item: Item, count: u32) {
        if count == 0 {
            return;
        }
        if let Some(items) = self.count_index.get_mut(&count) {
            items.remove(&item);
            if items.is_empty() {
                self.count_index.remove(&count);
            }
        }
    }
}
