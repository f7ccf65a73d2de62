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

//! Path surgery run when an item overtakes others in priority.
//!
//! For each occurrence `W` of the winning item below a loser, the segment
//! between `W` and its farthest loser ancestor is copied under `W`, the
//! original segment gives up `W`'s counter, and `W` is re-attached above
//! where the segment started, merging into an existing sibling if one
//! carries the same item.

use crate::arena::{FPNode, NodeId};
use crate::error::{Error, Result};
use crate::fptree::FPTree;
use crate::item::Item;
use fnv::{FnvHashMap, FnvHashSet};
use tracing::{debug, error};

impl FPTree {
    pub(crate) fn reconstruct(&mut self, winner: Item, losers: &FnvHashSet<Item>) -> Result<()> {
        let occurrences = self.chain(winner)?;
        for w in occurrences {
            // Earlier merges may have absorbed this occurrence.
            if !self.nodes.is_live(w) {
                continue;
            }
            let (far, path_length) = match self.far_ancestor(w, losers)? {
                Some(found) => found,
                None => continue,
            };
            let count = self.node(w)?.count;
            debug!(
                winner = ?winner,
                count,
                path_length,
                "moving occurrence above farthest loser"
            );
            let (old_parent, held) = self.isolate(w)?;
            let (segment, anchor) = self.reduce_count(old_parent, far, count, path_length)?;
            let path = self.create_path(&segment, count)?;
            self.rewire(w, path, held)?;
            self.splice(anchor, w)?;
        }
        Ok(())
    }

    /// Walks from `w` towards the root and returns the loser ancestor
    /// farthest from `w` along with its distance, or `None` if no ancestor
    /// is a loser.
    pub(crate) fn far_ancestor(
        &self,
        w: NodeId,
        losers: &FnvHashSet<Item>,
    ) -> Result<Option<(NodeId, usize)>> {
        let node = self.node(w)?;
        let item = node.item;
        let mut floor = node.count;
        let mut next = node.parent;
        let mut far = None;
        let mut path_length = 0;
        while let Some(id) = next {
            let ancestor = self.node(id)?;
            if ancestor.is_root() {
                return Ok(far);
            }
            path_length += 1;
            if path_length > self.nodes.len() {
                error!(item = ?item, "cycle found walking to root");
                return Err(Error::CycleDetected(item));
            }
            if ancestor.count < floor {
                error!(item = ?ancestor.item, "monotonic property violated on path to root");
                return Err(Error::MonotonicityViolation {
                    item: ancestor.item,
                    counter: ancestor.count,
                    child_counter: floor,
                });
            }
            if losers.contains(&ancestor.item) {
                far = Some((id, path_length));
            }
            floor = ancestor.count;
            next = ancestor.parent;
        }
        error!(item = ?item, "unable to reach the root");
        Err(Error::UnreachableRoot(item))
    }

    /// Detaches `w` from its parent and its chain. Its children are handed
    /// back parentless so they can be re-attached once the copied segment
    /// is in place.
    pub(crate) fn isolate(&mut self, w: NodeId) -> Result<(NodeId, FnvHashMap<Item, NodeId>)> {
        if self.nodes.is_tombstoned(w) {
            return Err(Error::IsolateTombstoned);
        }
        let (item, parent, aux) = {
            let node = self.node(w)?;
            if node.is_root() {
                return Err(Error::IsolateRoot);
            }
            (node.item, node.parent, node.aux)
        };
        let parent = parent.ok_or(Error::UnreachableRoot(item))?;
        self.node_mut(parent)?.children.remove(&item);

        let held = std::mem::take(&mut self.node_mut(w)?.children);
        for &child in held.values() {
            self.node_mut(child)?.parent = None;
        }
        self.unlink_from_chain(w, item, aux)?;
        let node = self.node_mut(w)?;
        node.aux = None;
        node.parent = None;
        Ok((parent, held))
    }

    /// Takes `count` off the `path_length` nodes from `start` up to and
    /// including `far`, deleting any that reach zero. Returns the items of
    /// that segment root-first, and the node above `far`.
    pub(crate) fn reduce_count(
        &mut self,
        start: NodeId,
        far: NodeId,
        count: u32,
        path_length: usize,
    ) -> Result<(Vec<Item>, NodeId)> {
        let far_node = self.node(far)?;
        let anchor = far_node
            .parent
            .ok_or(Error::UnreachableRoot(far_node.item))?;

        let mut segment = Vec::with_capacity(path_length);
        let mut current = start;
        for _ in 0..path_length {
            let node = self.node_mut(current)?;
            let item = node.item;
            node.count = match node.count.checked_sub(count) {
                Some(reduced) => reduced,
                None => {
                    error!(item = ?item, "counter would go negative");
                    return Err(Error::MonotonicityViolation {
                        item,
                        counter: node.count,
                        child_counter: count,
                    });
                }
            };
            let reduced = node.count;
            let parent = node.parent;
            segment.push(item);
            if reduced == 0 {
                self.nodes.tombstone(current);
                self.delete_node(current)?;
            }
            current = parent.ok_or(Error::UnreachableRoot(item))?;
        }
        segment.reverse();
        Ok((segment, anchor))
    }

    /// Builds a detached chain of fresh nodes for `segment`, each carrying
    /// `count`, and returns its first and last nodes.
    pub(crate) fn create_path(
        &mut self,
        segment: &[Item],
        count: u32,
    ) -> Result<Option<(NodeId, NodeId)>> {
        let mut first = None;
        let mut last: Option<NodeId> = None;
        for &item in segment {
            let id = self.nodes.alloc(FPNode::new(item, count, last));
            match last {
                Some(parent) => {
                    self.node_mut(parent)?.children.insert(item, id);
                }
                None => first = Some(id),
            }
            self.append_to_chain(id)?;
            last = Some(id);
        }
        Ok(first.zip(last))
    }

    /// Hangs the new segment under `w` and the held children under the
    /// segment's last node.
    pub(crate) fn rewire(
        &mut self,
        w: NodeId,
        path: Option<(NodeId, NodeId)>,
        held: FnvHashMap<Item, NodeId>,
    ) -> Result<()> {
        let attach_to = match path {
            Some((first, last)) => {
                let first_node = self.node_mut(first)?;
                first_node.parent = Some(w);
                let first_item = first_node.item;
                self.node_mut(w)?.children.insert(first_item, first);
                last
            }
            None => w,
        };
        for (item, child) in held {
            self.node_mut(child)?.parent = Some(attach_to);
            self.node_mut(attach_to)?.children.insert(item, child);
        }
        Ok(())
    }

    /// Re-inserts `w` below `anchor`. If `anchor` already has a child with
    /// the same item, `w` is merged into it.
    pub(crate) fn splice(&mut self, anchor: NodeId, w: NodeId) -> Result<()> {
        let item = self.node(w)?.item;
        let existing = self.node(anchor)?.children.get(&item).copied();
        self.append_to_chain(w)?;
        match existing {
            Some(dst) => self.merge_nodes(dst, w),
            None => {
                self.node_mut(anchor)?.children.insert(item, w);
                self.node_mut(w)?.parent = Some(anchor);
                Ok(())
            }
        }
    }

    /// Folds the subtree at `src` into the subtree at `dst`.
    ///
    /// Matching pairs are found top-down with an explicit stack; children
    /// only `src` has are moved across as they are found. Counters are then
    /// combined bottom-up so each emptied `src` node is deleted after its
    /// own children.
    pub(crate) fn merge_nodes(&mut self, dst: NodeId, src: NodeId) -> Result<()> {
        let mut pairs = vec![];
        let mut seen = FnvHashSet::default();
        let mut stack = vec![(dst, src)];
        while let Some((d, s)) = stack.pop() {
            if !seen.insert((d, s)) {
                continue;
            }
            pairs.push((d, s));
            let src_children: Vec<(Item, NodeId)> = self
                .node(s)?
                .children
                .iter()
                .map(|(&item, &child)| (item, child))
                .collect();
            for (item, child) in src_children {
                match self.node(d)?.children.get(&item).copied() {
                    Some(dst_child) => stack.push((dst_child, child)),
                    None => {
                        self.node_mut(s)?.children.remove(&item);
                        self.node_mut(d)?.children.insert(item, child);
                        self.node_mut(child)?.parent = Some(d);
                    }
                }
            }
        }

        for &(d, s) in pairs.iter().rev() {
            let count = std::mem::replace(&mut self.node_mut(s)?.count, 0);
            self.node_mut(d)?.count += count;
            self.nodes.tombstone(s);
            self.delete_node(s)?;
        }
        debug!(merged = pairs.len(), "merged subtrees");
        Ok(())
    }
}
