//! Robust Prune algorithm for Vamana
//!
//! The pruning strategy maintains graph connectivity while limiting node degree.

use crate::types::Slot;
use std::cmp::Ordering;

/// Candidate neighbor with distance
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: Slot,
    pub distance: f32,
}

impl Candidate {
    pub fn new(id: Slot, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance.total_cmp(&other.distance) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.distance.total_cmp(&self.distance)
    }
}

/// Sort ascending by distance (closest first)
pub fn sort_by_distance(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Robust Prune algorithm
///
/// Greedily keeps the closest remaining candidate, then discards every
/// candidate `c` it dominates, i.e. `alpha * d(kept, c) < d(node, c)`.
/// Larger alpha keeps more long-range edges. When `distance_fn` returns
/// squared L2, pass `alpha²` to get the same geometry.
///
/// # Arguments
/// * `candidates` - Candidate neighbors with their distance to the node being
///   pruned; must not contain the node itself
/// * `max_degree` - Maximum number of neighbors (R parameter)
/// * `alpha` - Diversity parameter (>= 1.0, typically 1.2)
/// * `distance_fn` - Distance between two candidates
///
/// # Returns
/// At most `max_degree` neighbors, closest first
pub fn robust_prune<F>(
    mut candidates: Vec<Candidate>,
    max_degree: usize,
    alpha: f32,
    distance_fn: F,
) -> Vec<Slot>
where
    F: Fn(Slot, Slot) -> f32,
{
    sort_by_distance(&mut candidates);
    candidates.dedup_by_key(|c| c.id);

    let mut pruned: Vec<Slot> = Vec::with_capacity(max_degree);

    for candidate in candidates {
        if pruned.len() >= max_degree {
            break;
        }
        if pruned.contains(&candidate.id) {
            continue;
        }

        let dominated = pruned
            .iter()
            .any(|&kept| alpha * distance_fn(kept, candidate.id) < candidate.distance);

        if !dominated {
            pruned.push(candidate.id);
        }
    }

    pruned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ordering() {
        let c1 = Candidate::new(1, 1.0);
        let c2 = Candidate::new(2, 2.0);

        // c1 should be "greater" (min-heap)
        assert!(c1 > c2);

        let mut heap = std::collections::BinaryHeap::new();
        heap.push(c2);
        heap.push(c1);
        assert_eq!(heap.pop().map(|c| c.id), Some(1));
    }

    #[test]
    fn test_robust_prune_basic() {
        let candidates = vec![
            Candidate::new(1, 1.0),
            Candidate::new(2, 2.0),
            Candidate::new(3, 3.0),
        ];

        // Candidates far apart from each other: nothing is dominated
        let dist_fn = |_a: Slot, _b: Slot| 10.0;

        let pruned = robust_prune(candidates, 2, 1.2, dist_fn);

        assert_eq!(pruned, vec![1, 2]); // Closest kept, degree bound respected
    }

    #[test]
    fn test_robust_prune_diversity() {
        let candidates = vec![
            Candidate::new(1, 1.0),
            Candidate::new(2, 1.1), // Very close to id:1
            Candidate::new(3, 5.0),
        ];

        let dist_fn = |a: Slot, b: Slot| {
            if (a == 1 && b == 2) || (a == 2 && b == 1) {
                0.5
            } else {
                10.0
            }
        };

        let pruned = robust_prune(candidates, 2, 1.2, dist_fn);

        // 1.2 * d(1, 2) = 0.6 < 1.1, so id:2 is dominated by id:1
        assert_eq!(pruned, vec![1, 3]);
    }

    #[test]
    fn test_larger_alpha_keeps_fewer_dominated_edges() {
        // node at origin; candidates on a line: 1 at 1.0, 2 at 2.0
        let candidates = vec![Candidate::new(1, 1.0), Candidate::new(2, 2.0)];
        let dist_fn = |_a: Slot, _b: Slot| 1.0;

        // alpha 1.0: 1.0 * 1.0 < 2.0 → dominated
        assert_eq!(robust_prune(candidates.clone(), 4, 1.0, dist_fn), vec![1]);
        // alpha 2.5: 2.5 > 2.0 → kept as a long-range edge
        assert_eq!(robust_prune(candidates, 4, 2.5, dist_fn), vec![1, 2]);
    }

    #[test]
    fn test_domination_is_strict() {
        let candidates = vec![Candidate::new(1, 1.0), Candidate::new(2, 2.0)];
        // alpha * d(1, 2) == d(node, 2): on the boundary, not dominated
        assert_eq!(robust_prune(candidates.clone(), 4, 2.0, |_, _| 1.0), vec![1, 2]);
        assert_eq!(robust_prune(candidates, 4, 1.5, |_, _| 1.0), vec![1]);
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let candidates = vec![
            Candidate::new(7, 1.0),
            Candidate::new(7, 1.0),
            Candidate::new(8, 3.0),
        ];
        let pruned = robust_prune(candidates, 4, 1.2, |_, _| 10.0);
        assert_eq!(pruned, vec![7, 8]);
    }
}
