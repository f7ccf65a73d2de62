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

//! Slab storage for tree nodes.
//!
//! Slots move through `Live -> Tombstoned -> Freed`. A `NodeId` carries the
//! slot generation it was issued for; freeing a slot bumps the generation,
//! so a stale id never resolves to the slot's next occupant.

use crate::item::Item;
use fnv::FnvHashMap;

#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct FPNode {
    pub item: Item,
    pub count: u32,
    pub children: FnvHashMap<Item, NodeId>,
    pub parent: Option<NodeId>,
    /// Next node carrying the same item.
    pub aux: Option<NodeId>,
}

impl FPNode {
    pub fn new(item: Item, count: u32, parent: Option<NodeId>) -> FPNode {
        FPNode {
            item,
            count,
            children: FnvHashMap::default(),
            parent,
            aux: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.item.is_null()
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Live(FPNode),
    Tombstoned(FPNode),
    Freed,
}

#[derive(Debug, Clone)]
struct Entry {
    generation: u32,
    slot: Slot,
}

#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    entries: Vec<Entry>,
    free_list: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> NodeArena {
        NodeArena {
            entries: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    pub fn alloc(&mut self, node: FPNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let entry = &mut self.entries[index as usize];
            entry.slot = Slot::Live(node);
            NodeId {
                index,
                generation: entry.generation,
            }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry {
                generation: 0,
                slot: Slot::Live(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
    }

    /// The node behind `id`, if it is live.
    pub fn get(&self, id: NodeId) -> Option<&FPNode> {
        match self.entry(id) {
            Some(Entry {
                slot: Slot::Live(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut FPNode> {
        match self.entry_mut(id) {
            Some(Entry {
                slot: Slot::Live(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_tombstoned(&self, id: NodeId) -> bool {
        matches!(
            self.entry(id),
            Some(Entry {
                slot: Slot::Tombstoned(_),
                ..
            })
        )
    }

    /// Marks a live node for removal. Returns false if it was not live.
    pub fn tombstone(&mut self, id: NodeId) -> bool {
        let entry = match self.entry_mut(id) {
            Some(entry) => entry,
            None => return false,
        };
        match std::mem::replace(&mut entry.slot, Slot::Freed) {
            Slot::Live(node) => {
                entry.slot = Slot::Tombstoned(node);
                true
            }
            other => {
                entry.slot = other;
                false
            }
        }
    }

    /// Access to a node that is mid-removal.
    pub fn tombstoned_mut(&mut self, id: NodeId) -> Option<&mut FPNode> {
        match self.entry_mut(id) {
            Some(Entry {
                slot: Slot::Tombstoned(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    /// Releases a tombstoned slot. Live and already-freed slots are refused.
    pub fn free(&mut self, id: NodeId) -> Option<FPNode> {
        let entry = self.entry_mut(id)?;
        match std::mem::replace(&mut entry.slot, Slot::Freed) {
            Slot::Tombstoned(node) => {
                entry.generation = entry.generation.wrapping_add(1);
                self.free_list.push(id.index);
                self.live -= 1;
                Some(node)
            }
            other => {
                entry.slot = other;
                None
            }
        }
    }

    /// Number of slots holding a live or tombstoned node.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter_live(&self) -> impl Iterator<Item = (NodeId, &FPNode)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match &entry.slot {
                Slot::Live(node) => Some((
                    NodeId {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    node,
                )),
                _ => None,
            })
    }

    pub fn num_tombstoned(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.slot, Slot::Tombstoned(_)))
            .count()
    }
}
