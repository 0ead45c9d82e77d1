//! Vamana navigable graph over store slots
//!
//! ## Layout
//! Adjacency lists live in an arena indexed by slot (`Vec<Option<Vec<Slot>>>`),
//! so back-edges are plain integers and there are no ownership cycles.
//! A slot whose entry is `None` is not part of the graph.
//!
//! ## Construction
//! - `batch_build`: random R-regular initialization, then two refinement
//!   passes in random order (alpha = 1.0, then the configured alpha)
//! - `batch_insert`: the same per-node procedure against the existing graph,
//!   in progressively larger rounds so new nodes can find each other
//!
//! Each round runs in three phases:
//! 1. parallel greedy search + robust prune per node (rayon)
//! 2. forward edges written
//! 3. reverse edges collected concurrently in a `DashMap` keyed by target,
//!    merged per target and re-pruned when a list exceeds R
//!
//! ## Invariants
//! - no list contains its own slot, no list exceeds R
//! - every present node is reachable from an entry point
//!   (`check_connectivity`, repaired by `repair_connectivity`)

use super::config::VamanaConfig;
use super::pruner::{robust_prune, sort_by_distance, Candidate};
use crate::storage::bytes::{put_u32, ByteReader};
use crate::types::Slot;
use crate::{IndexError, Result};
use ahash::AHashSet;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::VecDeque;
use tracing::debug;

const MAGIC: &[u8; 4] = b"GRPH";
const FORMAT_VERSION: u32 = 1;
const ABSENT: u16 = u16::MAX;

/// Rounds of connectivity repair before giving up
const MAX_REPAIR_ROUNDS: usize = 4;

/// Distance oracle over indexed nodes
pub trait NodeDistance: Sync {
    /// Full-precision distance between two stored records
    fn node_distance(&self, a: Slot, b: Slot) -> f32;

    /// Node closest to the centroid of `slots`
    fn medoid(&self, slots: &[Slot]) -> Option<Slot>;

    /// Pruning alpha in this oracle's distance units
    fn prune_alpha(&self, alpha: f32) -> f32 {
        alpha
    }
}

/// Result of one greedy search
struct SearchOutcome {
    /// Closest L nodes seen, ascending
    list: Vec<Candidate>,
    /// Nodes whose neighbor lists were expanded
    expanded: Vec<Candidate>,
}

pub struct VamanaGraph {
    config: VamanaConfig,
    nodes: Vec<Option<Vec<Slot>>>,
    entry_points: Vec<Slot>,
    node_count: usize,
    rng: StdRng,
}

impl VamanaGraph {
    pub fn new(config: VamanaConfig, seed: u64) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            entry_points: Vec::new(),
            node_count: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &VamanaConfig {
        &self.config
    }

    /// Present nodes (tombstoned routers included)
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    pub fn entry_points(&self) -> &[Slot] {
        &self.entry_points
    }

    #[inline]
    pub fn contains(&self, slot: Slot) -> bool {
        matches!(self.nodes.get(slot as usize), Some(Some(_)))
    }

    #[inline]
    pub fn neighbors(&self, slot: Slot) -> Option<&[Slot]> {
        self.nodes.get(slot as usize)?.as_deref()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.entry_points.clear();
        self.node_count = 0;
    }

    /// Approximate heap bytes held by adjacency lists
    pub fn memory_usage(&self) -> usize {
        let lists: usize = self
            .nodes
            .iter()
            .flatten()
            .map(|n| n.capacity() * std::mem::size_of::<Slot>())
            .sum();
        lists
            + self.nodes.capacity() * std::mem::size_of::<Option<Vec<Slot>>>()
            + self.entry_points.capacity() * std::mem::size_of::<Slot>()
    }

    fn present_slots(&self) -> Vec<Slot> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| i as Slot)
            .collect()
    }

    fn reserve_slots(&mut self, slots: &[Slot]) -> Result<()> {
        let mut seen = AHashSet::with_capacity(slots.len());
        for &slot in slots {
            if self.contains(slot) || !seen.insert(slot) {
                return Err(IndexError::InvalidArgument(format!(
                    "slot {} is already part of the graph",
                    slot
                )));
            }
        }
        if let Some(&max) = slots.iter().max() {
            if self.nodes.len() <= max as usize {
                self.nodes.resize(max as usize + 1, None);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    fn greedy_search<F>(&self, start: &[Slot], dist: F, l: usize, budget: usize) -> SearchOutcome
    where
        F: Fn(Slot) -> f32,
    {
        let l = l.max(1);
        let mut visited: AHashSet<Slot> = AHashSet::with_capacity(l * 4);
        // (candidate, expanded)
        let mut list: Vec<(Candidate, bool)> = Vec::with_capacity(l + 1);

        for &s in start {
            if self.contains(s) && visited.insert(s) {
                insert_bounded(&mut list, Candidate::new(s, dist(s)), l);
            }
        }

        let mut expanded = Vec::new();
        while expanded.len() < budget {
            let Some(pos) = list.iter().position(|(_, done)| !done) else {
                break;
            };
            list[pos].1 = true;
            let current = list[pos].0;
            expanded.push(current);

            let Some(neighbors) = self.neighbors(current.id) else {
                continue;
            };
            for &n in neighbors {
                if !visited.insert(n) || !self.contains(n) {
                    continue;
                }
                let d = dist(n);
                let full = list.len() >= l;
                if !full || d < list[list.len() - 1].0.distance {
                    insert_bounded(&mut list, Candidate::new(n, d), l);
                }
            }
        }

        SearchOutcome {
            list: list.into_iter().map(|(c, _)| c).collect(),
            expanded,
        }
    }

    /// Beam search from the entry points.
    ///
    /// `dist` gives the query distance of a node. Nodes failing `is_live`
    /// are traversed but take no room in the beam, so the search keeps
    /// expanding until it holds `beam` live nodes or the reachable graph is
    /// exhausted. Returns up to `beam` live candidates, closest first.
    pub fn search<F, G>(&self, dist: F, beam: usize, is_live: G) -> Vec<Candidate>
    where
        F: Fn(Slot) -> f32,
        G: Fn(Slot) -> bool,
    {
        if self.is_empty() {
            return Vec::new();
        }
        let l = beam.max(1);
        let budget = l * 8 + 64;
        let mut visited: AHashSet<Slot> = AHashSet::with_capacity(l * 4);
        let mut list = FilteredList::new(l);

        for s in self.start_points() {
            if self.contains(s) && visited.insert(s) {
                list.offer(Candidate::new(s, dist(s)), is_live(s));
            }
        }

        let mut expansions = 0usize;
        while expansions < budget || !list.is_full() {
            let Some(current) = list.next_unexpanded() else {
                break;
            };
            expansions += 1;

            let Some(neighbors) = self.neighbors(current) else {
                continue;
            };
            for &n in neighbors {
                if !visited.insert(n) || !self.contains(n) {
                    continue;
                }
                let d = dist(n);
                if list.admits(d) {
                    list.offer(Candidate::new(n, d), is_live(n));
                }
            }
        }

        list.into_live()
    }

    fn start_points(&self) -> Vec<Slot> {
        if !self.entry_points.is_empty() {
            return self.entry_points.clone();
        }
        self.nodes
            .iter()
            .position(|n| n.is_some())
            .map(|i| vec![i as Slot])
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build from scratch over `slots`. The graph must be empty.
    pub fn batch_build<D: NodeDistance>(&mut self, slots: &[Slot], store: &D) -> Result<()> {
        if !self.is_empty() {
            return Err(IndexError::InvalidArgument(
                "batch_build requires an empty graph".into(),
            ));
        }
        if slots.is_empty() {
            return Ok(());
        }
        self.reserve_slots(slots)?;

        let n = slots.len();
        let init_degree = self.config.max_degree.min(n - 1);
        for &slot in slots {
            let neighbors = if n - 1 <= init_degree {
                slots.iter().copied().filter(|&s| s != slot).collect()
            } else {
                let mut picked = Vec::with_capacity(init_degree);
                while picked.len() < init_degree {
                    let candidate = slots[self.rng.gen_range(0..n)];
                    if candidate != slot && !picked.contains(&candidate) {
                        picked.push(candidate);
                    }
                }
                picked
            };
            self.nodes[slot as usize] = Some(neighbors);
        }
        self.node_count = n;
        self.entry_points = vec![store.medoid(slots).unwrap_or(slots[0])];

        let passes = [1.0, self.config.alpha];
        for (pass, &alpha) in passes.iter().enumerate() {
            let mut order = slots.to_vec();
            order.shuffle(&mut self.rng);
            let rounds = self.refine(&order, store, alpha, self.config.build_chunk_size);
            debug!(pass, alpha, rounds, nodes = n, "vamana build pass done");
        }
        Ok(())
    }

    /// Insert `slots` into a non-empty graph without rebuilding it.
    pub fn batch_insert<D: NodeDistance>(&mut self, slots: &[Slot], store: &D) -> Result<()> {
        if self.is_empty() {
            return self.batch_build(slots, store);
        }
        if slots.is_empty() {
            return Ok(());
        }
        self.reserve_slots(slots)?;

        let existing = self.node_count;
        let mut order = slots.to_vec();
        order.shuffle(&mut self.rng);

        // Rounds grow with the graph so each round is mostly linked to
        // nodes that already have edges.
        let alpha = self.config.alpha;
        let mut done = 0;
        while done < order.len() {
            let round = (self.node_count.max(16)).min(self.config.build_chunk_size);
            let end = (done + round).min(order.len());
            for &slot in &order[done..end] {
                self.nodes[slot as usize] = Some(Vec::new());
            }
            self.node_count += end - done;
            self.refine(&order[done..end], store, alpha, round);
            done = end;
        }

        if slots.len() >= existing {
            // Batch dominates the graph: refine once more and re-center
            order.shuffle(&mut self.rng);
            self.refine(&order, store, alpha, self.config.build_chunk_size);
            let present = self.present_slots();
            if let Some(medoid) = store.medoid(&present) {
                self.entry_points = vec![medoid];
            }
        }

        debug!(inserted = slots.len(), existing, "vamana batch insert done");
        Ok(())
    }

    /// One refinement pass over `order`; returns the number of rounds.
    fn refine<D: NodeDistance>(
        &mut self,
        order: &[Slot],
        store: &D,
        alpha: f32,
        chunk_size: usize,
    ) -> usize {
        let mut rounds = 0;
        for chunk in order.chunks(chunk_size.max(1)) {
            // Phase 1: candidate search + prune, independent per node
            let updates: Vec<(Slot, Vec<Slot>)> = chunk
                .par_iter()
                .map(|&node| (node, self.select_neighbors(node, store, alpha)))
                .collect();

            // Phase 3 input: reverse edges grouped by target
            let reverse: DashMap<Slot, Vec<Slot>> = DashMap::new();
            updates.par_iter().for_each(|(node, neighbors)| {
                for &n in neighbors {
                    reverse.entry(n).or_default().push(*node);
                }
            });

            // Phase 2: forward edges
            for (node, neighbors) in updates {
                self.nodes[node as usize] = Some(neighbors);
            }

            self.apply_reverse_edges(reverse, store, alpha);
            rounds += 1;
        }
        rounds
    }

    fn select_neighbors<D: NodeDistance>(&self, node: Slot, store: &D, alpha: f32) -> Vec<Slot> {
        let l = self.config.search_list_size.max(self.config.max_degree);
        let start = self.start_points();
        let outcome = self.greedy_search(&start, |s| store.node_distance(node, s), l, l * 4);

        let mut seen: AHashSet<Slot> = AHashSet::with_capacity(l * 2);
        seen.insert(node);
        let mut pool: Vec<Candidate> = Vec::with_capacity(l * 2);
        for c in outcome.expanded.into_iter().chain(outcome.list) {
            if seen.insert(c.id) {
                pool.push(c);
            }
        }
        if let Some(current) = self.neighbors(node) {
            for &n in current {
                if self.contains(n) && seen.insert(n) {
                    pool.push(Candidate::new(n, store.node_distance(node, n)));
                }
            }
        }

        robust_prune(pool, self.config.max_degree, store.prune_alpha(alpha), |a, b| {
            store.node_distance(a, b)
        })
    }

    fn apply_reverse_edges<D: NodeDistance>(
        &mut self,
        reverse: DashMap<Slot, Vec<Slot>>,
        store: &D,
        alpha: f32,
    ) {
        let pending: Vec<(Slot, Vec<Slot>)> = reverse.into_iter().collect();
        let max_degree = self.config.max_degree;

        let updates: Vec<(Slot, Vec<Slot>)> = pending
            .into_par_iter()
            .filter_map(|(target, sources)| {
                let current = self.neighbors(target)?;
                let mut merged = current.to_vec();
                for s in sources {
                    if s != target && !merged.contains(&s) {
                        merged.push(s);
                    }
                }
                if merged.len() == current.len() {
                    return None;
                }
                if merged.len() > max_degree {
                    let candidates = merged
                        .iter()
                        .map(|&n| Candidate::new(n, store.node_distance(target, n)))
                        .collect();
                    merged = robust_prune(candidates, max_degree, store.prune_alpha(alpha), |a, b| {
                        store.node_distance(a, b)
                    });
                }
                Some((target, merged))
            })
            .collect();

        for (target, neighbors) in updates {
            self.nodes[target as usize] = Some(neighbors);
        }
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Remove `removed` from the graph, rewiring their in-neighbors.
    ///
    /// For each node p pointing into the removed set D, the new candidate
    /// pool is (N(p) \ D) ∪ (N(d) \ D) for every d ∈ N(p) ∩ D, pruned back
    /// to R. Returns the number of rewired nodes.
    pub fn consolidate<D: NodeDistance>(&mut self, removed: &AHashSet<Slot>, store: &D) -> usize {
        let removed: AHashSet<Slot> = removed
            .iter()
            .copied()
            .filter(|&s| self.contains(s))
            .collect();
        if removed.is_empty() {
            return 0;
        }

        let max_degree = self.config.max_degree;
        let alpha = self.config.alpha;

        let affected: Vec<Slot> = self
            .present_slots()
            .into_iter()
            .filter(|s| !removed.contains(s))
            .filter(|&s| {
                self.neighbors(s)
                    .is_some_and(|ns| ns.iter().any(|n| removed.contains(n)))
            })
            .collect();

        let updates: Vec<(Slot, Vec<Slot>)> = affected
            .par_iter()
            .map(|&p| {
                let mut seen: AHashSet<Slot> = AHashSet::new();
                seen.insert(p);
                let mut pool = Vec::new();
                let mut push = |n: Slot, pool: &mut Vec<Candidate>| {
                    if !removed.contains(&n) && seen.insert(n) {
                        pool.push(Candidate::new(n, store.node_distance(p, n)));
                    }
                };
                for &n in self.neighbors(p).unwrap_or(&[]) {
                    if removed.contains(&n) {
                        for &nn in self.neighbors(n).unwrap_or(&[]) {
                            push(nn, &mut pool);
                        }
                    } else {
                        push(n, &mut pool);
                    }
                }
                let neighbors = if pool.len() > max_degree {
                    robust_prune(pool, max_degree, store.prune_alpha(alpha), |a, b| {
                        store.node_distance(a, b)
                    })
                } else {
                    sort_by_distance(&mut pool);
                    pool.into_iter().map(|c| c.id).collect()
                };
                (p, neighbors)
            })
            .collect();

        let rewired = updates.len();
        for (p, neighbors) in updates {
            self.nodes[p as usize] = Some(neighbors);
        }
        for &d in &removed {
            self.nodes[d as usize] = None;
        }
        self.node_count -= removed.len();

        self.entry_points.retain(|e| !removed.contains(e));
        if self.entry_points.is_empty() && self.node_count > 0 {
            let present = self.present_slots();
            if let Some(medoid) = store.medoid(&present) {
                self.entry_points.push(medoid);
            }
        }
        rewired
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Present nodes not reachable from any entry point (BFS)
    pub fn unreachable_nodes(&self) -> Vec<Slot> {
        let mut reached = vec![false; self.nodes.len()];
        let mut queue: VecDeque<Slot> = VecDeque::new();
        for &e in &self.start_points() {
            if self.contains(e) && !reached[e as usize] {
                reached[e as usize] = true;
                queue.push_back(e);
            }
        }
        while let Some(current) = queue.pop_front() {
            for &n in self.neighbors(current).unwrap_or(&[]) {
                if self.contains(n) && !reached[n as usize] {
                    reached[n as usize] = true;
                    queue.push_back(n);
                }
            }
        }
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| n.is_some() && !reached[*i])
            .map(|(i, _)| i as Slot)
            .collect()
    }

    /// Internal consistency check: every present node reachable, no
    /// self-loops, no list above R, no dangling edges.
    pub fn check_connectivity(&self) -> Result<()> {
        for (i, node) in self.nodes.iter().enumerate() {
            let Some(neighbors) = node else { continue };
            if neighbors.len() > self.config.max_degree {
                return Err(IndexError::InvalidArgument(format!(
                    "node {} has degree {} > R={}",
                    i,
                    neighbors.len(),
                    self.config.max_degree
                )));
            }
            if neighbors.iter().any(|&n| n as usize == i || !self.contains(n)) {
                return Err(IndexError::InvalidArgument(format!(
                    "node {} has a self-loop or dangling edge",
                    i
                )));
            }
        }
        let unreachable = self.unreachable_nodes();
        if !unreachable.is_empty() {
            return Err(IndexError::GraphDisconnected {
                unreachable: unreachable.len(),
                total: self.node_count,
            });
        }
        Ok(())
    }

    /// Link unreachable nodes back into the reachable component.
    ///
    /// Each orphan gets an in-edge from its nearest reachable node (found by
    /// greedy search, so it is reachable by construction). A full list drops
    /// its farthest neighbor, which a later round re-attaches if needed.
    /// Returns the number of edges added.
    pub fn repair_connectivity<D: NodeDistance>(&mut self, store: &D) -> usize {
        let max_degree = self.config.max_degree;
        let l = self.config.search_list_size;
        let mut added = 0;

        for _ in 0..MAX_REPAIR_ROUNDS {
            let unreachable = self.unreachable_nodes();
            if unreachable.is_empty() {
                break;
            }
            let orphans: AHashSet<Slot> = unreachable.iter().copied().collect();

            for &u in &unreachable {
                let start = self.start_points();
                let outcome = self.greedy_search(&start, |s| store.node_distance(u, s), l, l * 4);
                let reachable: Vec<Candidate> = outcome
                    .list
                    .into_iter()
                    .filter(|c| c.id != u && !orphans.contains(&c.id))
                    .collect();
                let Some(anchor) = reachable
                    .iter()
                    .find(|c| self.neighbors(c.id).is_some_and(|ns| ns.len() < max_degree))
                    .or_else(|| reachable.first())
                    .map(|c| c.id)
                else {
                    continue;
                };

                if let Some(list) = self.nodes[anchor as usize].as_mut() {
                    if list.contains(&u) {
                        continue;
                    }
                    if list.len() >= max_degree {
                        let farthest = list
                            .iter()
                            .enumerate()
                            .max_by(|a, b| {
                                store
                                    .node_distance(anchor, *a.1)
                                    .total_cmp(&store.node_distance(anchor, *b.1))
                            })
                            .map(|(i, _)| i);
                        if let Some(i) = farthest {
                            list.swap_remove(i);
                        }
                    }
                    list.push(u);
                    added += 1;
                }
                if let Some(list) = self.nodes[u as usize].as_mut() {
                    if list.len() < max_degree && !list.contains(&anchor) {
                        list.push(anchor);
                    }
                }
            }
        }
        added
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize for the graph checkpoint region (footer added by the caller)
    ///
    /// ```text
    /// [GRPH][version u32][R u32][slots u32][entries u32][entry u32 ...]
    /// per slot: [degree u16 | 0xFFFF absent][neighbor u32 ...]
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            20 + self.entry_points.len() * 4 + self.nodes.len() * 2 + self.node_count * 32 * 4,
        );
        buf.extend_from_slice(MAGIC);
        put_u32(&mut buf, FORMAT_VERSION);
        put_u32(&mut buf, self.config.max_degree as u32);
        put_u32(&mut buf, self.nodes.len() as u32);
        put_u32(&mut buf, self.entry_points.len() as u32);
        for &e in &self.entry_points {
            put_u32(&mut buf, e);
        }
        for node in &self.nodes {
            match node {
                None => buf.extend_from_slice(&ABSENT.to_le_bytes()),
                Some(neighbors) => {
                    buf.extend_from_slice(&(neighbors.len() as u16).to_le_bytes());
                    for &n in neighbors {
                        put_u32(&mut buf, n);
                    }
                }
            }
        }
        buf
    }

    /// Rebuild from a verified region payload. `config.max_degree` is
    /// replaced by the degree bound recorded in the file.
    pub fn from_bytes(payload: &[u8], mut config: VamanaConfig, seed: u64) -> Result<Self> {
        let mut reader = ByteReader::new(payload, "graph");
        reader.expect_magic(MAGIC)?;
        let version = reader.u32()?;
        if version != FORMAT_VERSION {
            return Err(reader.corrupt(format!("unsupported format version {}", version)));
        }
        let max_degree = reader.u32()? as usize;
        let slot_count = reader.u32()? as usize;
        let entry_count = reader.u32()? as usize;
        let mut entry_points = Vec::with_capacity(entry_count.min(1024));
        for _ in 0..entry_count {
            entry_points.push(reader.u32()?);
        }

        let mut nodes = Vec::with_capacity(slot_count.min(1 << 24));
        let mut node_count = 0;
        for i in 0..slot_count {
            let degree = reader.u16()?;
            if degree == ABSENT {
                nodes.push(None);
                continue;
            }
            let degree = degree as usize;
            if degree > max_degree {
                return Err(reader.corrupt(format!("node {} degree {} > R={}", i, degree, max_degree)));
            }
            let mut neighbors = Vec::with_capacity(degree);
            for _ in 0..degree {
                let n = reader.u32()?;
                if n as usize >= slot_count || n as usize == i {
                    return Err(reader.corrupt(format!("node {} has invalid edge to {}", i, n)));
                }
                neighbors.push(n);
            }
            nodes.push(Some(neighbors));
            node_count += 1;
        }
        reader.finish()?;

        let graph_contains = |s: Slot| matches!(nodes.get(s as usize), Some(Some(_)));
        if entry_points.iter().any(|&e| !graph_contains(e)) {
            return Err(reader.corrupt("entry point is not a graph node"));
        }
        for (i, node) in nodes.iter().enumerate() {
            if let Some(neighbors) = node {
                if neighbors.iter().any(|&n| !graph_contains(n)) {
                    return Err(reader.corrupt(format!("node {} points at an absent node", i)));
                }
            }
        }

        config.max_degree = max_degree;
        Ok(Self {
            config,
            nodes,
            entry_points,
            node_count,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

/// Insert into an ascending list and keep at most `l` entries
/// Query-time candidate list bounded by its live entries.
///
/// Entries stay sorted by distance. Everything past the `l`-th live entry is
/// dropped; dead entries before it are kept so they can still be expanded.
struct FilteredList {
    l: usize,
    /// (candidate, expanded, live)
    entries: Vec<(Candidate, bool, bool)>,
    live: usize,
    /// Entries before this index are all expanded
    cursor: usize,
}

impl FilteredList {
    fn new(l: usize) -> Self {
        Self {
            l,
            entries: Vec::with_capacity(l + 1),
            live: 0,
            cursor: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.live >= self.l
    }

    /// Whether a node at distance `d` could still enter the list
    fn admits(&self, d: f32) -> bool {
        !self.is_full() || self.entries.last().is_some_and(|(c, _, _)| d < c.distance)
    }

    fn offer(&mut self, candidate: Candidate, live: bool) {
        let pos = self
            .entries
            .partition_point(|(c, _, _)| c.distance <= candidate.distance);
        if self.is_full() && pos >= self.entries.len() {
            return;
        }
        self.entries.insert(pos, (candidate, false, live));
        self.cursor = self.cursor.min(pos);
        if live {
            self.live += 1;
        }
        if self.live > self.l {
            let mut seen = 0;
            let cut = self
                .entries
                .iter()
                .position(|(_, _, live)| {
                    seen += usize::from(*live);
                    seen == self.l
                })
                .map_or(self.entries.len(), |i| i + 1);
            self.entries.truncate(cut);
            self.live = self.l;
        }
    }

    fn next_unexpanded(&mut self) -> Option<Slot> {
        while self.cursor < self.entries.len() {
            let entry = &mut self.entries[self.cursor];
            self.cursor += 1;
            if !entry.1 {
                entry.1 = true;
                return Some(entry.0.id);
            }
        }
        None
    }

    fn into_live(self) -> Vec<Candidate> {
        self.entries
            .into_iter()
            .filter(|(_, _, live)| *live)
            .map(|(c, _, _)| c)
            .collect()
    }
}

fn insert_bounded(list: &mut Vec<(Candidate, bool)>, candidate: Candidate, l: usize) {
    let pos = list.partition_point(|(c, _)| c.distance <= candidate.distance);
    if pos >= l {
        return;
    }
    list.insert(pos, (candidate, false));
    list.truncate(l);
}
