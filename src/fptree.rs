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

use crate::arena::{FPNode, NodeArena, NodeId};
use crate::error::{Error, Result};
use crate::item::Item;
use crate::item_counter::ItemCounter;
use fnv::{FnvHashMap, FnvHashSet};
use tracing::{debug, error};

/// A prefix path leading to one occurrence of an item, root first, with the
/// counter of that occurrence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConditionalPattern {
    pub items: Vec<Item>,
    pub count: u32,
}

/// An FP-tree that stays in priority order while transactions are added one
/// at a time.
///
/// Every path from the root lists its items in strictly decreasing priority
/// (see [`ItemCounter`]). When an insertion changes the relative rank of two
/// items, the affected paths are rebuilt in place before the transaction's
/// own path is added.
#[derive(Debug, Clone)]
pub struct FPTree {
    pub(crate) nodes: NodeArena,
    pub(crate) root: NodeId,
    pub(crate) head: FnvHashMap<Item, NodeId>,
    pub(crate) tail: FnvHashMap<Item, NodeId>,
    pub(crate) item_count: ItemCounter,
    pub(crate) num_transactions: u32,
    num_insertions: u64,
}

impl Default for FPTree {
    fn default() -> Self {
        FPTree::new()
    }
}

impl FPTree {
    pub fn new() -> FPTree {
        let mut nodes = NodeArena::new();
        // Add root.
        let root = nodes.alloc(FPNode::new(Item::null(), 0, None));
        FPTree {
            nodes,
            root,
            head: FnvHashMap::default(),
            tail: FnvHashMap::default(),
            item_count: ItemCounter::new(),
            num_transactions: 0,
            num_insertions: 0,
        }
    }

    /// Adds one transaction.
    ///
    /// The items are ranked by their counts before this transaction. Each
    /// item's count is then bumped in that order, and any path where the
    /// item has just overtaken an ancestor is rebuilt. Finally the
    /// transaction's path is added.
    pub fn insert(&mut self, transaction: &[Item]) -> Result<()> {
        check_transaction(transaction)?;
        let mut sorted = transaction.to_vec();
        self.item_count.sort_descending(&mut sorted);
        for &item in &sorted {
            let losers = self.item_count.increment(item);
            if !losers.is_empty() {
                debug!(winner = ?item, losers = ?losers, "calling reconstruction");
                self.reconstruct(item, &losers)?;
            }
        }
        self.insert_path(&sorted)?;
        self.num_transactions += 1;
        Ok(())
    }

    /// Adds the same pattern `repeat` times.
    pub fn insert_conditional(&mut self, items: &[Item], repeat: u32) -> Result<()> {
        check_transaction(items)?;
        for _ in 0..repeat {
            self.insert(items)?;
        }
        Ok(())
    }

    fn insert_path(&mut self, sorted: &[Item]) -> Result<()> {
        // Start iterating at the root node.
        let mut id = self.root;
        for &item in sorted {
            self.num_insertions += 1;
            let existing = self.node(id)?.children.get(&item).copied();
            id = match existing {
                Some(child) => {
                    self.node_mut(child)?.count += 1;
                    child
                }
                None => {
                    let child = self.nodes.alloc(FPNode::new(item, 1, Some(id)));
                    self.node_mut(id)?.children.insert(item, child);
                    self.append_to_chain(child)?;
                    child
                }
            };
        }
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn item_count(&self) -> &ItemCounter {
        &self.item_count
    }

    pub fn num_transactions(&self) -> u32 {
        self.num_transactions
    }

    /// Item-level insert steps performed so far.
    pub fn num_insertions(&self) -> u64 {
        self.num_insertions
    }

    /// Nodes in the tree, not counting the root.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len() - 1
    }

    /// The live node behind `id`.
    pub fn get(&self, id: NodeId) -> Option<&FPNode> {
        self.nodes.get(id)
    }

    pub fn child_of(&self, id: NodeId, item: Item) -> Option<NodeId> {
        self.nodes.get(id)?.children.get(&item).copied()
    }

    /// Follows `path` from the root, returning the node it ends at.
    pub fn find_path(&self, path: &[Item]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root, |id, &item| self.child_of(id, item))
    }

    pub fn head_of(&self, item: Item) -> Option<NodeId> {
        self.head.get(&item).copied()
    }

    pub fn tail_of(&self, item: Item) -> Option<NodeId> {
        self.tail.get(&item).copied()
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&FPNode> {
        self.nodes.get(id).ok_or(Error::StaleNode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut FPNode> {
        self.nodes.get_mut(id).ok_or(Error::StaleNode)
    }

    /// Every occurrence of `item`, in chain order.
    pub fn chain(&self, item: Item) -> Result<Vec<NodeId>> {
        let mut occurrences = vec![];
        let mut visited = FnvHashSet::default();
        let mut next = self.head.get(&item).copied();
        while let Some(id) = next {
            if !visited.insert(id) {
                error!(item = ?item, "cycle found in item chain");
                return Err(Error::CycleDetected(item));
            }
            let node = self.node(id)?;
            if node.item != item {
                return Err(Error::ChainBroken(item));
            }
            occurrences.push(id);
            next = node.aux;
        }
        Ok(occurrences)
    }

    pub(crate) fn append_to_chain(&mut self, id: NodeId) -> Result<()> {
        let item = {
            let node = self.node_mut(id)?;
            node.aux = None;
            node.item
        };
        match self.tail.get(&item).copied() {
            Some(last) => self.node_mut(last)?.aux = Some(id),
            None => {
                self.head.insert(item, id);
            }
        }
        self.tail.insert(item, id);
        Ok(())
    }

    fn previous_in_chain(&self, id: NodeId, item: Item) -> Result<Option<NodeId>> {
        let mut current = match self.head.get(&item) {
            Some(&head) => head,
            None => return Err(Error::ChainBroken(item)),
        };
        if current == id {
            return Ok(None);
        }
        let mut visited = FnvHashSet::default();
        loop {
            if !visited.insert(current) {
                error!(item = ?item, "cycle found looking for previous node");
                return Err(Error::CycleDetected(item));
            }
            match self.node(current)?.aux {
                Some(next) if next == id => return Ok(Some(current)),
                Some(next) => current = next,
                None => {
                    error!(item = ?item, "unable to reach node from chain head");
                    return Err(Error::ChainBroken(item));
                }
            }
        }
    }

    /// Short-circuits the chain around `id`, promoting `next` into the head
    /// or the previous node into the tail as needed.
    pub(crate) fn unlink_from_chain(
        &mut self,
        id: NodeId,
        item: Item,
        next: Option<NodeId>,
    ) -> Result<()> {
        match self.previous_in_chain(id, item)? {
            None => match next {
                Some(next) => {
                    self.head.insert(item, next);
                }
                None => {
                    self.head.remove(&item);
                    self.tail.remove(&item);
                }
            },
            Some(prev) => {
                self.node_mut(prev)?.aux = next;
                if self.tail.get(&item) == Some(&id) {
                    self.tail.insert(item, prev);
                }
            }
        }
        Ok(())
    }

    /// Removes a tombstoned node with a zero counter and no children from
    /// its chain and its parent, then frees its slot.
    pub(crate) fn delete_node(&mut self, id: NodeId) -> Result<()> {
        if let Some(node) = self.nodes.get(id) {
            error!(item = ?node.item, "unable to delete node, tombstone not set");
            return Err(Error::DeleteLiveNode(node.item));
        }
        let (item, count, parent, aux, children) = match self.nodes.tombstoned_mut(id) {
            Some(node) => (
                node.item,
                node.count,
                node.parent,
                node.aux,
                node.children.values().copied().collect::<Vec<NodeId>>(),
            ),
            None => return Err(Error::StaleNode),
        };
        for child in &children {
            if let Some(child) = self.nodes.get(*child) {
                if child.count > count {
                    error!(item = ?item, "monotonic property violated, child has higher count");
                    return Err(Error::MonotonicityViolation {
                        item,
                        counter: count,
                        child_counter: child.count,
                    });
                }
            }
        }
        if !children.is_empty() {
            return Err(Error::DeleteWithChildren(item));
        }
        if count != 0 {
            return Err(Error::DeleteNonZeroCounter {
                item,
                counter: count,
            });
        }

        self.unlink_from_chain(id, item, aux)?;
        if let Some(parent) = parent {
            if let Some(parent) = self.nodes.get_mut(parent) {
                if parent.children.get(&item) == Some(&id) {
                    parent.children.remove(&item);
                }
            }
        }
        self.nodes.free(id);
        debug!(item = ?item, "deleted node");
        Ok(())
    }

    fn path_from_root_to_excluding(&self, id: NodeId) -> Result<Vec<Item>> {
        let start = self.node(id)?;
        let mut path = vec![];
        let mut next = start.parent;
        while let Some(id) = next {
            let node = self.node(id)?;
            if node.is_root() {
                path.reverse();
                return Ok(path);
            }
            if path.len() > self.nodes.len() {
                return Err(Error::CycleDetected(start.item));
            }
            path.push(node.item);
            next = node.parent;
        }
        Err(Error::UnreachableRoot(start.item))
    }

    /// The conditional pattern base of `item`: one prefix path per
    /// occurrence, skipping occurrences directly below the root.
    pub fn conditional_patterns(&self, item: Item) -> Result<Vec<ConditionalPattern>> {
        let mut patterns = vec![];
        for id in self.chain(item)? {
            let path = self.path_from_root_to_excluding(id)?;
            if !path.is_empty() {
                patterns.push(ConditionalPattern {
                    items: path,
                    count: self.node(id)?.count,
                });
            }
        }
        Ok(patterns)
    }

    /// Checks links, counters and chains: every node reachable from the
    /// root is live and points back at its parent, counters never grow
    /// towards the leaves, each chain visits exactly the nodes of its item
    /// and their counters add up to the item's global count.
    pub fn check_structure(&self) -> Result<()> {
        let mut visited = FnvHashSet::default();
        let mut per_item: FnvHashMap<Item, (u32, usize)> = FnvHashMap::default();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if !visited.insert(id) {
                return Err(Error::CycleDetected(node.item));
            }
            for (&child_item, &child_id) in &node.children {
                let child = self.node(child_id)?;
                if visited.contains(&child_id) {
                    return Err(Error::CycleDetected(child.item));
                }
                if child.item != child_item || child.parent != Some(id) {
                    return Err(Error::UnreachableRoot(child.item));
                }
                if !node.is_root() && child.count > node.count {
                    return Err(Error::MonotonicityViolation {
                        item: node.item,
                        counter: node.count,
                        child_counter: child.count,
                    });
                }
                stack.push(child_id);
            }
            if !node.is_root() {
                let entry = per_item.entry(node.item).or_insert((0, 0));
                entry.0 += node.count;
                entry.1 += 1;
            }
        }
        if visited.len() != self.nodes.len() {
            // Tombstoned or orphaned slots left behind.
            return Err(Error::StaleNode);
        }

        for (&item, &(_, num_nodes)) in &per_item {
            let chain = self.chain(item)?;
            if chain.len() != num_nodes || chain.last() != self.tail.get(&item) {
                return Err(Error::ChainBroken(item));
            }
        }
        if self.head.len() != per_item.len() || self.tail.len() != per_item.len() {
            let item = self
                .head
                .keys()
                .chain(self.tail.keys())
                .find(|item| !per_item.contains_key(*item))
                .copied()
                .unwrap_or_default();
            return Err(Error::ChainBroken(item));
        }
        for item in self.item_count.items() {
            let expected = self.item_count.get(&item);
            let found = per_item.get(&item).map_or(0, |&(sum, _)| sum);
            if found != expected {
                return Err(Error::CountMismatch {
                    item,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// [`check_structure`](Self::check_structure) plus the priority order
    /// along every path.
    pub fn check_invariants(&self) -> Result<()> {
        self.check_structure()?;
        for (_, node) in self.nodes.iter_live() {
            if node.is_root() {
                continue;
            }
            for &child in node.children.keys() {
                if !self.item_count.outranks(&node.item, &child) {
                    return Err(Error::OrderViolation {
                        parent: node.item,
                        child,
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_transaction(items: &[Item]) -> Result<()> {
    if items.is_empty() {
        return Err(Error::EmptyTransaction);
    }
    let mut seen = FnvHashSet::default();
    for &item in items {
        if item.is_null() {
            return Err(Error::NullItem);
        }
        if !seen.insert(item) {
            return Err(Error::DuplicateItem(item));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::FPTree;
    use crate::error::Error;
    use crate::item::Item;
    use crate::itemizer::Itemizer;

    fn build(transactions: &[&[&str]], itemizer: &mut Itemizer) -> FPTree {
        let mut tree = FPTree::new();
        for transaction in transactions {
            let items = itemizer.to_id_vec(transaction);
            tree.insert(&items).unwrap();
            tree.check_invariants().unwrap();
        }
        tree
    }

    #[test]
    fn test_insert_shares_prefixes() {
        let mut itemizer = Itemizer::new();
        let tree = build(&[&["a", "b", "c"], &["a", "b"], &["a", "d"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let c = itemizer.id_of("c");
        let d = itemizer.id_of("d");

        let node_a = tree.find_path(&[a]).unwrap();
        assert_eq!(tree.get(node_a).unwrap().count, 3);
        assert_eq!(tree.get(tree.find_path(&[a, b]).unwrap()).unwrap().count, 2);
        assert_eq!(tree.get(tree.find_path(&[a, b, c]).unwrap()).unwrap().count, 1);
        assert_eq!(tree.get(tree.find_path(&[a, d]).unwrap()).unwrap().count, 1);
        assert_eq!(tree.num_nodes(), 4);
        assert_eq!(tree.num_transactions(), 3);
        assert_eq!(tree.num_insertions(), 7);
        assert_eq!(tree.head_of(a), Some(node_a));
        assert_eq!(tree.tail_of(a), Some(node_a));
    }

    #[test]
    fn test_example_global_counts() {
        let mut itemizer = Itemizer::new();
        let tree = build(
            &[&["a", "b", "c"], &["a", "b"], &["a", "c"], &["b", "c"], &["a"]],
            &mut itemizer,
        );
        let counts = tree.item_count();
        assert_eq!(counts.get(&itemizer.id_of("a")), 4);
        assert_eq!(counts.get(&itemizer.id_of("b")), 3);
        assert_eq!(counts.get(&itemizer.id_of("c")), 3);
    }

    #[test]
    fn test_transaction_sorted_by_priority() {
        let mut itemizer = Itemizer::new();
        // "z" is interned after "y" but is more frequent by the time the
        // last transaction arrives, so it goes first on that path.
        let tree = build(&[&["y"], &["z"], &["z"], &["y", "z"]], &mut itemizer);
        let y = itemizer.id_of("y");
        let z = itemizer.id_of("z");
        assert!(tree.find_path(&[z, y]).is_some());
        assert!(tree.find_path(&[y, z]).is_none());
        assert_eq!(tree.get(tree.find_path(&[z]).unwrap()).unwrap().count, 3);
    }

    #[test]
    fn test_reconstruction_moves_winner_above_loser() {
        let mut itemizer = Itemizer::new();
        let c = itemizer.id_of("c");
        let b = itemizer.id_of("b");
        let mut tree = FPTree::new();

        // Tree: root -> c(2) -> b(1).
        tree.insert(&[c, b]).unwrap();
        tree.insert(&[c]).unwrap();
        let old_b = tree.find_path(&[c, b]).unwrap();
        assert_eq!(tree.get(old_b).unwrap().count, 1);

        // b catches up with c but loses the tie-break: no surgery yet.
        tree.insert(&[b]).unwrap();
        assert!(tree.find_path(&[c, b]).is_some());
        tree.check_invariants().unwrap();

        // b overtakes c; the c -> b path is rebuilt as b -> c and merged
        // into the b node hanging off the root.
        tree.insert(&[b]).unwrap();
        tree.check_invariants().unwrap();
        assert!(tree.find_path(&[c, b]).is_none());
        assert!(tree.get(old_b).is_none());

        let top_b = tree.find_path(&[b]).unwrap();
        assert_eq!(tree.get(top_b).unwrap().count, 3);
        let b_c = tree.find_path(&[b, c]).unwrap();
        assert_eq!(tree.get(b_c).unwrap().count, 1);
        let top_c = tree.find_path(&[c]).unwrap();
        assert_eq!(tree.get(top_c).unwrap().count, 1);

        assert_eq!(tree.item_count().get(&b), 3);
        assert_eq!(tree.item_count().get(&c), 2);
        assert_eq!(tree.chain(b).unwrap(), vec![top_b]);
        assert_eq!(tree.chain(c).unwrap().len(), 2);
    }

    #[test]
    fn test_reconstruction_rebuilds_skipped_segment() {
        let mut itemizer = Itemizer::new();
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let c = itemizer.id_of("c");
        let d = itemizer.id_of("d");
        let mut tree = FPTree::new();

        // root -> a(3) -> b(2) -> c(2) -> d(2).
        tree.insert(&[a, b, c, d]).unwrap();
        tree.insert(&[a, b, c, d]).unwrap();
        tree.insert(&[a]).unwrap();
        tree.insert(&[d]).unwrap();
        tree.check_invariants().unwrap();
        // d now has 3: it overtook b and c (2) and ties a (3) but loses.
        let a_d = tree.find_path(&[a, d]).unwrap();
        assert_eq!(tree.get(a_d).unwrap().count, 2);
        let a_d_b_c = tree.find_path(&[a, d, b, c]).unwrap();
        assert_eq!(tree.get(a_d_b_c).unwrap().count, 2);
        assert!(tree.find_path(&[a, b]).is_none());
        assert_eq!(tree.get(tree.find_path(&[d]).unwrap()).unwrap().count, 1);
    }

    #[test]
    fn test_duplicate_items_rejected_without_change() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        match tree.insert(&[a, b, a]) {
            Err(Error::DuplicateItem(item)) => assert_eq!(item, a),
            other => panic!("expected duplicate item error, got {:?}", other),
        }
        assert!(matches!(
            tree.insert_conditional(&[b, b], 3),
            Err(Error::DuplicateItem(_))
        ));
        assert!(matches!(tree.insert(&[]), Err(Error::EmptyTransaction)));
        assert!(matches!(tree.insert(&[Item::null()]), Err(Error::NullItem)));
        assert_eq!(tree.item_count().get(&a), 1);
        assert_eq!(tree.num_transactions(), 1);
        assert_eq!(tree.num_nodes(), 2);
    }

    #[test]
    fn test_insert_conditional_repeats() {
        let mut itemizer = Itemizer::new();
        let items = itemizer.to_id_vec(&["x", "y"]);
        let mut tree = FPTree::new();
        tree.insert_conditional(&items, 4).unwrap();
        assert_eq!(tree.num_transactions(), 4);
        let leaf = tree.find_path(&items).unwrap();
        assert_eq!(tree.get(leaf).unwrap().count, 4);
        tree.insert_conditional(&items, 0).unwrap();
        assert_eq!(tree.num_transactions(), 4);
    }

    #[test]
    fn test_conditional_patterns() {
        let mut itemizer = Itemizer::new();
        let tree = build(
            &[&["a", "b", "c"], &["a", "b"], &["a", "c"], &["b", "c"], &["a"]],
            &mut itemizer,
        );
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let c = itemizer.id_of("c");
        let mut patterns = tree.conditional_patterns(c).unwrap();
        patterns.sort_by(|x, y| x.items.cmp(&y.items));
        let flat: Vec<(Vec<_>, u32)> = patterns
            .into_iter()
            .map(|p| (p.items, p.count))
            .collect();
        assert_eq!(flat, vec![(vec![a], 1), (vec![a, b], 1), (vec![b], 1)]);
        assert!(tree.conditional_patterns(a).unwrap().is_empty());
    }

    #[test]
    fn test_delete_requires_tombstone() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let node_a = tree.find_path(&[a]).unwrap();
        let node_b = tree.find_path(&[a, b]).unwrap();

        assert!(matches!(tree.delete_node(node_b), Err(Error::DeleteLiveNode(_))));

        // a still has b hanging off it.
        tree.node_mut(node_a).unwrap().count = 0;
        tree.nodes.tombstone(node_a);
        match tree.delete_node(node_a) {
            Err(Error::MonotonicityViolation { child_counter, .. }) => {
                assert_eq!(child_counter, 1)
            }
            other => panic!("expected monotonicity violation, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_unlinks_chain_and_parent() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"], &["a"], &["b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let first_b = tree.find_path(&[a, b]).unwrap();
        let second_b = tree.find_path(&[b]).unwrap();
        assert_eq!(tree.chain(b).unwrap(), vec![first_b, second_b]);

        tree.node_mut(first_b).unwrap().count = 0;
        tree.nodes.tombstone(first_b);
        tree.delete_node(first_b).unwrap();
        assert_eq!(tree.chain(b).unwrap(), vec![second_b]);
        assert_eq!(tree.head_of(b), Some(second_b));
        assert_eq!(tree.tail_of(b), Some(second_b));
        assert!(tree.child_of(tree.find_path(&[a]).unwrap(), b).is_none());
        assert!(matches!(tree.delete_node(first_b), Err(Error::StaleNode)));
    }

    #[test]
    fn test_chain_cycles_are_fatal() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let node_a = tree.find_path(&[a]).unwrap();
        tree.node_mut(node_a).unwrap().aux = Some(node_a);
        assert!(matches!(tree.chain(a), Err(Error::CycleDetected(item)) if item == a));
        assert!(matches!(tree.check_structure(), Err(Error::CycleDetected(_))));

        let mut tree = build(&[&["a", "b"], &["a"], &["b"]], &mut itemizer);
        let b = itemizer.id_of("b");
        let node_a = tree.find_path(&[a]).unwrap();
        let first_b = tree.find_path(&[a, b]).unwrap();
        let second_b = tree.find_path(&[b]).unwrap();
        tree.node_mut(second_b).unwrap().aux = Some(first_b);
        assert!(matches!(
            tree.previous_in_chain(node_a, b),
            Err(Error::CycleDetected(item)) if item == b
        ));
        assert!(matches!(tree.chain(b), Err(Error::CycleDetected(_))));
    }

    #[test]
    fn test_parent_cycle_is_fatal() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let node_a = tree.find_path(&[a]).unwrap();
        let node_b = tree.find_path(&[a, b]).unwrap();
        tree.node_mut(node_a).unwrap().parent = Some(node_b);
        assert!(matches!(
            tree.path_from_root_to_excluding(node_b),
            Err(Error::CycleDetected(item)) if item == b
        ));
        assert!(matches!(tree.conditional_patterns(b), Err(Error::CycleDetected(_))));
    }

    #[test]
    fn test_check_structure_detects_child_cycle() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let node_a = tree.find_path(&[a]).unwrap();
        let node_b = tree.find_path(&[a, itemizer.id_of("b")]).unwrap();
        tree.node_mut(node_b).unwrap().children.insert(a, node_a);
        assert!(matches!(
            tree.check_structure(),
            Err(Error::CycleDetected(item)) if item == a
        ));
    }

    #[test]
    fn test_check_structure_detects_broken_chain() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"], &["a"], &["b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let first_b = tree.find_path(&[a, b]).unwrap();
        let second_b = tree.find_path(&[b]).unwrap();
        tree.node_mut(first_b).unwrap().aux = None;
        assert!(matches!(
            tree.check_structure(),
            Err(Error::ChainBroken(item)) if item == b
        ));
        assert!(matches!(
            tree.previous_in_chain(second_b, b),
            Err(Error::ChainBroken(_))
        ));

        // A head pointing at another item's node.
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let node_a = tree.find_path(&[a]).unwrap();
        tree.head.insert(b, node_a);
        assert!(matches!(tree.chain(b), Err(Error::ChainBroken(item)) if item == b));
    }

    #[test]
    fn test_delete_rejects_children_and_counts() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let node_b = tree.find_path(&[a, b]).unwrap();

        tree.nodes.tombstone(node_b);
        match tree.delete_node(node_b) {
            Err(Error::DeleteNonZeroCounter { item, counter }) => {
                assert_eq!(item, b);
                assert_eq!(counter, 1);
            }
            other => panic!("expected non-zero counter error, got {:?}", other),
        }

        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let node_a = tree.find_path(&[a]).unwrap();
        let node_b = tree.find_path(&[a, b]).unwrap();
        tree.node_mut(node_b).unwrap().count = 0;
        tree.node_mut(node_a).unwrap().count = 0;
        tree.nodes.tombstone(node_a);
        assert!(matches!(
            tree.delete_node(node_a),
            Err(Error::DeleteWithChildren(item)) if item == a
        ));
        assert!(tree.nodes.is_tombstoned(node_a));
        assert!(tree.get(node_b).is_some());
    }

    #[test]
    fn test_check_invariants_detects_swapped_order() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let b = itemizer.id_of("b");
        let root = tree.root();
        let node_a = tree.find_path(&[a]).unwrap();
        let node_b = tree.find_path(&[a, b]).unwrap();

        // Relabel the path as b -> a while keeping every link consistent.
        {
            let upper = tree.node_mut(node_a).unwrap();
            upper.item = b;
            upper.children.clear();
            upper.children.insert(a, node_b);
        }
        tree.node_mut(node_b).unwrap().item = a;
        {
            let root = tree.node_mut(root).unwrap();
            root.children.clear();
            root.children.insert(b, node_a);
        }
        tree.head.insert(a, node_b);
        tree.tail.insert(a, node_b);
        tree.head.insert(b, node_a);
        tree.tail.insert(b, node_a);

        tree.check_structure().unwrap();
        match tree.check_invariants() {
            Err(Error::OrderViolation { parent, child }) => {
                assert_eq!(parent, b);
                assert_eq!(child, a);
            }
            other => panic!("expected order violation, got {:?}", other),
        }
    }

    #[test]
    fn test_check_structure_detects_count_drift() {
        let mut itemizer = Itemizer::new();
        let mut tree = build(&[&["a", "b"]], &mut itemizer);
        let a = itemizer.id_of("a");
        let node_a = tree.find_path(&[a]).unwrap();
        tree.node_mut(node_a).unwrap().count = 2;
        match tree.check_structure() {
            Err(Error::CountMismatch {
                item,
                expected,
                found,
            }) => {
                assert_eq!(item, a);
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected count mismatch, got {:?}", other),
        }
        assert!(tree.check_invariants().is_err());
    }
}
