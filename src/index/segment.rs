//! Segment bookkeeping: generations, id → slot mapping, tombstones
//!
//! Every flush registers one segment (a generation number plus the set of
//! slots it produced). The id map always points at the most recent location
//! of an id, so a re-inserted id supersedes its older slot, which becomes a
//! tombstone. Tombstoned slots stay in the graph as routers until a merge
//! reclaims them.
//!
//! Invariants:
//! - every id map entry points at a live (non-tombstoned) slot
//! - every tombstone belongs to some segment
//! - live slots are disjoint from tombstones

use crate::types::{Slot, VectorId};
use crate::{IndexError, Result};
use ahash::AHashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

/// Authoritative location of an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub slot: Slot,
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct Segment {
    generation: u64,
    slots: RoaringBitmap,
}

/// Result of folding segments together
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Tombstoned slots dropped from the segments; the caller removes them
    /// from the graph and frees them in the store
    pub reclaimed: Vec<Slot>,
    /// Number of segments folded into the newest one
    pub merged: usize,
}

#[derive(Debug, Default)]
pub struct SegmentManager {
    id_map: AHashMap<VectorId, Location>,
    segments: Vec<Segment>,
    next_generation: u64,
    tombstones: RoaringBitmap,
}

/// Serialized form stored in the id-map checkpoint region
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentManagerState {
    pub entries: Vec<(VectorId, Slot, u64)>,
    pub segments: Vec<(u64, Vec<Slot>)>,
    pub next_generation: u64,
    pub tombstones: Vec<Slot>,
}

impl SegmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live ids
    pub fn count(&self) -> usize {
        self.id_map.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len() as usize
    }

    pub fn resolve(&self, id: &str) -> Option<Slot> {
        self.id_map.get(id).map(|loc| loc.slot)
    }

    pub fn location(&self, id: &str) -> Option<Location> {
        self.id_map.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_map.contains_key(id)
    }

    #[inline]
    pub fn is_tombstoned(&self, slot: Slot) -> bool {
        self.tombstones.contains(slot)
    }

    pub fn ids(&self) -> impl Iterator<Item = &VectorId> {
        self.id_map.keys()
    }

    /// Register a flushed batch as a new segment.
    ///
    /// Returns the slots superseded by this batch (the older locations of
    /// re-inserted ids); they are tombstoned here.
    pub fn register(&mut self, entries: Vec<(VectorId, Slot)>) -> Vec<Slot> {
        let generation = self.next_generation;
        self.next_generation += 1;

        let mut slots = RoaringBitmap::new();
        let mut superseded = Vec::new();
        for (id, slot) in entries {
            slots.insert(slot);
            if let Some(old) = self.id_map.insert(id, Location { slot, generation }) {
                self.tombstones.insert(old.slot);
                superseded.push(old.slot);
            }
        }
        self.segments.push(Segment { generation, slots });
        superseded
    }

    /// Logically delete an id; returns the slot that became a tombstone
    pub fn tombstone(&mut self, id: &str) -> Option<Slot> {
        let loc = self.id_map.remove(id)?;
        self.tombstones.insert(loc.slot);
        Some(loc.slot)
    }

    /// Fold every segment into the newest one and reclaim tombstones.
    ///
    /// Live count is unchanged: only tombstoned slots are dropped.
    pub fn merge(&mut self) -> MergeOutcome {
        let Some(newest) = self.segments.pop() else {
            return MergeOutcome::default();
        };
        let merged = self.segments.len();

        let mut slots = newest.slots;
        for segment in self.segments.drain(..) {
            slots |= segment.slots;
        }
        let reclaimed_set = &slots & &self.tombstones;
        slots -= &reclaimed_set;
        self.tombstones -= &reclaimed_set;

        let generation = newest.generation;
        for loc in self.id_map.values_mut() {
            loc.generation = generation;
        }
        if !slots.is_empty() {
            self.segments.push(Segment { generation, slots });
        }

        MergeOutcome {
            reclaimed: reclaimed_set.iter().collect(),
            merged,
        }
    }

    pub fn clear(&mut self) {
        self.id_map.clear();
        self.segments.clear();
        self.tombstones.clear();
    }

    pub fn memory_usage(&self) -> usize {
        let ids: usize = self
            .id_map
            .keys()
            .map(|k| k.capacity() + std::mem::size_of::<(VectorId, Location)>())
            .sum();
        let bitmaps: usize = self
            .segments
            .iter()
            .map(|s| s.slots.serialized_size())
            .sum();
        ids + bitmaps + self.tombstones.serialized_size()
    }

    pub fn to_state(&self) -> SegmentManagerState {
        let mut entries: Vec<(VectorId, Slot, u64)> = self
            .id_map
            .iter()
            .map(|(id, loc)| (id.clone(), loc.slot, loc.generation))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        SegmentManagerState {
            entries,
            segments: self
                .segments
                .iter()
                .map(|s| (s.generation, s.slots.iter().collect()))
                .collect(),
            next_generation: self.next_generation,
            tombstones: self.tombstones.iter().collect(),
        }
    }

    /// Rebuild from a checkpointed state, checking the invariants above
    pub fn from_state(state: SegmentManagerState) -> Result<Self> {
        let corrupt = |msg: String| IndexError::CorruptPersistence(format!("idmap region: {}", msg));

        let mut all_slots = RoaringBitmap::new();
        let mut segments = Vec::with_capacity(state.segments.len());
        for (generation, slots) in state.segments {
            if generation >= state.next_generation {
                return Err(corrupt(format!("segment generation {} not yet issued", generation)));
            }
            let slots: RoaringBitmap = slots.into_iter().collect();
            if !(&all_slots & &slots).is_empty() {
                return Err(corrupt("segments overlap".into()));
            }
            all_slots |= &slots;
            segments.push(Segment { generation, slots });
        }

        let tombstones: RoaringBitmap = state.tombstones.into_iter().collect();
        if !tombstones.is_subset(&all_slots) {
            return Err(corrupt("tombstone outside every segment".into()));
        }

        let mut id_map = AHashMap::with_capacity(state.entries.len());
        let mut live = RoaringBitmap::new();
        for (id, slot, generation) in state.entries {
            if !all_slots.contains(slot) || tombstones.contains(slot) || !live.insert(slot) {
                return Err(corrupt(format!("id '{}' maps to invalid slot {}", id, slot)));
            }
            if id_map.insert(id, Location { slot, generation }).is_some() {
                return Err(corrupt("duplicate id".into()));
            }
        }

        Ok(Self {
            id_map,
            segments,
            next_generation: state.next_generation,
            tombstones,
        })
    }

    /// Slots held by segments (live and tombstoned)
    pub fn all_slots(&self) -> RoaringBitmap {
        let mut all = RoaringBitmap::new();
        for segment in &self.segments {
            all |= &segment.slots;
        }
        all
    }
}
