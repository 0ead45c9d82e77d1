//! Columnar vector arena
//!
//! Slot-indexed storage for every flushed record:
//! - `raw`: the caller's original f32 vector (returned by `get`)
//! - `unit`: normalized search copy (cosine, unquantized only)
//! - `codes`: codec output replacing the search copy in quantized modes
//! - `inv_norms`: 1/‖raw‖ under cosine, for exact re-ranking from `raw`
//!
//! The store owns no search logic; the graph refers to records by slot
//! only. Released slots go to a free list and are reused by later flushes.

use crate::codec::{Codec, PreparedQuery, Quantization};
use crate::config::Metric;
use crate::distance::{dot_product, euclidean_distance_squared, l2_norm, DistanceMetric};
use crate::index::vamana::NodeDistance;
use crate::storage::bytes::{put_blob, put_u32, ByteReader};
use crate::types::{Slot, VectorId};
use crate::{IndexError, Result};

const MAGIC: &[u8; 4] = b"VVEC";
const FORMAT_VERSION: u32 = 1;

/// Largest number of slots addressable by a u32 slot id
pub const MAX_SLOTS: usize = u32::MAX as usize;

/// Centroid estimation samples at most this many slots
const MEDOID_SAMPLE: usize = 10_000;

pub struct VectorStore {
    dimension: usize,
    metric: Metric,
    codec: Codec,
    raw: Vec<f32>,
    unit: Vec<f32>,
    codes: Vec<u8>,
    inv_norms: Vec<f32>,
    metadata: Vec<Vec<u8>>,
    ids: Vec<Option<VectorId>>,
    free: Vec<Slot>,
    occupied: usize,
}

impl VectorStore {
    pub fn new(dimension: usize, metric: Metric, quantization: Quantization) -> Self {
        Self {
            dimension,
            metric,
            codec: Codec::new(quantization, dimension),
            raw: Vec::new(),
            unit: Vec::new(),
            codes: Vec::new(),
            inv_norms: Vec::new(),
            metadata: Vec::new(),
            ids: Vec::new(),
            free: Vec::new(),
            occupied: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn quantization(&self) -> Quantization {
        self.codec.quantization()
    }

    /// Occupied records
    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Slot space in use (occupied + free)
    pub fn slot_count(&self) -> usize {
        self.ids.len()
    }

    /// Slots still allocatable
    pub fn remaining_capacity(&self) -> usize {
        self.free.len() + (MAX_SLOTS - self.ids.len())
    }

    fn keeps_unit_copy(&self) -> bool {
        self.metric == Metric::Cosine && !self.codec.quantization().is_quantized()
    }

    /// Store a record and return its slot.
    ///
    /// The vector must already be validated for dimension and finiteness;
    /// a zero vector under cosine is still rejected here.
    pub fn allocate(&mut self, id: VectorId, vector: &[f32], metadata: Vec<u8>) -> Result<Slot> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let (unit, inv_norm) = match self.metric {
            Metric::Cosine => {
                let norm = l2_norm(vector);
                if norm == 0.0 || !norm.is_finite() {
                    return Err(IndexError::InvalidVector(format!(
                        "vector for '{}' has no direction (norm {})",
                        id, norm
                    )));
                }
                let inv = 1.0 / norm;
                (Some(vector.iter().map(|x| x * inv).collect::<Vec<f32>>()), inv)
            }
            Metric::Euclidean => (None, 1.0),
        };

        let mut code = Vec::with_capacity(self.codec.code_len());
        self.codec
            .encode_into(unit.as_deref().unwrap_or(vector), &mut code)?;

        let slot = match self.free.pop() {
            Some(slot) => {
                let i = slot as usize;
                let d = self.dimension;
                self.raw[i * d..(i + 1) * d].copy_from_slice(vector);
                if self.keeps_unit_copy() {
                    if let Some(unit) = &unit {
                        self.unit[i * d..(i + 1) * d].copy_from_slice(unit);
                    }
                }
                let c = self.codec.code_len();
                self.codes[i * c..(i + 1) * c].copy_from_slice(&code);
                if self.metric == Metric::Cosine {
                    self.inv_norms[i] = inv_norm;
                }
                self.metadata[i] = metadata;
                self.ids[i] = Some(id);
                slot
            }
            None => {
                if self.ids.len() >= MAX_SLOTS {
                    return Err(IndexError::CapacityExceeded(format!(
                        "slot space exhausted ({} slots)",
                        MAX_SLOTS
                    )));
                }
                let slot = self.ids.len() as Slot;
                self.raw.extend_from_slice(vector);
                if self.keeps_unit_copy() {
                    if let Some(unit) = &unit {
                        self.unit.extend_from_slice(unit);
                    }
                }
                self.codes.extend_from_slice(&code);
                if self.metric == Metric::Cosine {
                    self.inv_norms.push(inv_norm);
                }
                self.metadata.push(metadata);
                self.ids.push(Some(id));
                slot
            }
        };

        self.occupied += 1;
        Ok(slot)
    }

    /// Free a slot for reuse; returns the id it held
    pub fn release(&mut self, slot: Slot) -> Option<VectorId> {
        let entry = self.ids.get_mut(slot as usize)?;
        let id = entry.take()?;
        self.metadata[slot as usize] = Vec::new();
        self.free.push(slot);
        self.occupied -= 1;
        Some(id)
    }

    #[inline]
    pub fn is_occupied(&self, slot: Slot) -> bool {
        matches!(self.ids.get(slot as usize), Some(Some(_)))
    }

    pub fn id(&self, slot: Slot) -> Option<&str> {
        self.ids.get(slot as usize)?.as_deref()
    }

    /// Original (non-normalized) vector
    #[inline]
    pub fn raw(&self, slot: Slot) -> &[f32] {
        let i = slot as usize * self.dimension;
        &self.raw[i..i + self.dimension]
    }

    pub fn metadata(&self, slot: Slot) -> &[u8] {
        &self.metadata[slot as usize]
    }

    #[inline]
    fn code(&self, slot: Slot) -> &[u8] {
        let c = self.codec.code_len();
        let i = slot as usize * c;
        &self.codes[i..i + c]
    }

    #[inline]
    fn unit(&self, slot: Slot) -> &[f32] {
        let i = slot as usize * self.dimension;
        &self.unit[i..i + self.dimension]
    }

    /// Validate and prepare a query for repeated distance calls
    pub fn prepare_query(&self, query: &[f32]) -> Result<PreparedQuery> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let prepared = match self.metric {
            Metric::Cosine => crate::distance::normalized(query).ok_or_else(|| {
                IndexError::InvalidVector("query vector has zero norm".into())
            })?,
            Metric::Euclidean => query.to_vec(),
        };
        Ok(self.codec.prepare(prepared))
    }

    /// Full-precision distance from a prepared query
    #[inline]
    pub fn exact_query_distance(&self, query: &PreparedQuery, slot: Slot) -> f32 {
        match self.metric {
            Metric::Cosine if self.keeps_unit_copy() => {
                1.0 - dot_product(&query.vector, self.unit(slot))
            }
            Metric::Cosine => {
                1.0 - dot_product(&query.vector, self.raw(slot)) * self.inv_norms[slot as usize]
            }
            Metric::Euclidean => euclidean_distance_squared(&query.vector, self.raw(slot)),
        }
    }

    /// Search-path distance: codec distance when quantized, exact otherwise
    #[inline]
    pub fn query_distance(&self, query: &PreparedQuery, slot: Slot) -> f32 {
        if self.codec.quantization().is_quantized() {
            self.codec.query_distance(query, self.code(slot), self.metric)
        } else {
            self.exact_query_distance(query, slot)
        }
    }

    /// Bytes held for vectors (raw + search copy + codes) and for metadata
    pub fn memory_usage(&self) -> (usize, usize) {
        let vectors = self.raw.len() * 4
            + self.unit.len() * 4
            + self.codes.len()
            + self.inv_norms.len() * 4;
        let metadata = self
            .metadata
            .iter()
            .map(|m| m.len())
            .sum::<usize>()
            + self
                .ids
                .iter()
                .map(|id| id.as_ref().map_or(0, |s| s.len()))
                .sum::<usize>();
        (vectors, metadata)
    }

    /// Serialize for the vectors checkpoint region (footer added by the caller)
    pub fn to_bytes(&self) -> Vec<u8> {
        let code_len = self.codec.code_len();
        let mut buf = Vec::with_capacity(
            24 + self.occupied * (self.dimension * 4 + code_len + 16),
        );
        buf.extend_from_slice(MAGIC);
        put_u32(&mut buf, FORMAT_VERSION);
        put_u32(&mut buf, self.dimension as u32);
        put_u32(&mut buf, self.ids.len() as u32);
        buf.push(self.codec.quantization().tag());
        buf.push(self.metric.tag());
        buf.extend_from_slice(&[0u8; 2]);

        for (i, id) in self.ids.iter().enumerate() {
            let Some(id) = id else {
                buf.push(0);
                continue;
            };
            let slot = i as Slot;
            buf.push(1);
            for v in self.raw(slot) {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            buf.extend_from_slice(self.code(slot));
            put_blob(&mut buf, &self.metadata[i]);
            put_blob(&mut buf, id.as_bytes());
        }
        buf
    }

    /// Rebuild from a verified region payload
    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(payload, "vectors");
        reader.expect_magic(MAGIC)?;
        let version = reader.u32()?;
        if version != FORMAT_VERSION {
            return Err(reader.corrupt(format!("unsupported format version {}", version)));
        }
        let dimension = reader.u32()? as usize;
        let slot_count = reader.u32()? as usize;
        let quantization = Quantization::from_tag(reader.u8()?)
            .ok_or_else(|| reader.corrupt("unknown quantization tag"))?;
        let metric =
            Metric::from_tag(reader.u8()?).ok_or_else(|| reader.corrupt("unknown metric tag"))?;
        reader.u16()?;

        let mut store = Self::new(dimension, metric, quantization);
        let code_len = store.codec.code_len();
        let d = dimension;

        for i in 0..slot_count {
            match reader.u8()? {
                0 => {
                    store.raw.extend(std::iter::repeat(0.0).take(d));
                    if store.keeps_unit_copy() {
                        store.unit.extend(std::iter::repeat(0.0).take(d));
                    }
                    store.codes.extend(std::iter::repeat(0u8).take(code_len));
                    if metric == Metric::Cosine {
                        store.inv_norms.push(0.0);
                    }
                    store.metadata.push(Vec::new());
                    store.ids.push(None);
                    store.free.push(i as Slot);
                }
                1 => {
                    let start = store.raw.len();
                    reader.f32s_into(d, &mut store.raw)?;
                    store.codes.extend_from_slice(reader.take(code_len)?);
                    let metadata = reader.blob()?.to_vec();
                    let id = std::str::from_utf8(reader.blob()?)
                        .map_err(|e| reader.corrupt(format!("id is not utf-8: {}", e)))?
                        .to_string();

                    if metric == Metric::Cosine {
                        let norm = l2_norm(&store.raw[start..start + d]);
                        if norm == 0.0 || !norm.is_finite() {
                            return Err(reader.corrupt(format!("zero-norm vector in slot {}", i)));
                        }
                        let inv = 1.0 / norm;
                        if store.keeps_unit_copy() {
                            let unit: Vec<f32> =
                                store.raw[start..start + d].iter().map(|x| x * inv).collect();
                            store.unit.extend_from_slice(&unit);
                        }
                        store.inv_norms.push(inv);
                    }
                    store.metadata.push(metadata);
                    store.ids.push(Some(id));
                    store.occupied += 1;
                }
                flag => return Err(reader.corrupt(format!("bad slot flag {}", flag))),
            }
        }
        reader.finish()?;

        // Lowest free slot is reused first
        store.free.reverse();
        Ok(store)
    }
}

/// Node distances on the stored codes instead of the full vectors
pub struct CodeDistances<'a>(&'a VectorStore);

impl VectorStore {
    /// Code-to-code view for graph maintenance in quantized modes
    pub fn code_distances(&self) -> CodeDistances<'_> {
        CodeDistances(self)
    }
}

impl NodeDistance for CodeDistances<'_> {
    #[inline]
    fn node_distance(&self, a: Slot, b: Slot) -> f32 {
        let store = self.0;
        store
            .codec
            .code_distance(store.code(a), store.code(b), store.metric)
    }

    fn medoid(&self, slots: &[Slot]) -> Option<Slot> {
        self.0.medoid(slots)
    }

    fn prune_alpha(&self, alpha: f32) -> f32 {
        self.0.prune_alpha(alpha)
    }
}

impl NodeDistance for VectorStore {
    #[inline]
    fn node_distance(&self, a: Slot, b: Slot) -> f32 {
        match self.metric {
            Metric::Cosine if self.keeps_unit_copy() => self.metric.distance(self.unit(a), self.unit(b)),
            Metric::Cosine => {
                1.0 - dot_product(self.raw(a), self.raw(b))
                    * self.inv_norms[a as usize]
                    * self.inv_norms[b as usize]
            }
            Metric::Euclidean => euclidean_distance_squared(self.raw(a), self.raw(b)),
        }
    }

    /// Euclidean distances are squared, so alpha is squared with them
    fn prune_alpha(&self, alpha: f32) -> f32 {
        match self.metric {
            Metric::Cosine => alpha,
            Metric::Euclidean => alpha * alpha,
        }
    }

    /// Slot closest to the centroid of `slots`
    fn medoid(&self, slots: &[Slot]) -> Option<Slot> {
        let first = *slots.first()?;
        let d = self.dimension;
        let step = (slots.len() / MEDOID_SAMPLE).max(1);

        let mut centroid = vec![0.0f32; d];
        let mut sampled = 0usize;
        for &slot in slots.iter().step_by(step) {
            let scale = match self.metric {
                Metric::Cosine => self.inv_norms[slot as usize],
                Metric::Euclidean => 1.0,
            };
            for (c, v) in centroid.iter_mut().zip(self.raw(slot)) {
                *c += v * scale;
            }
            sampled += 1;
        }
        for c in centroid.iter_mut() {
            *c /= sampled as f32;
        }

        // Symmetric data can average to the origin
        let Ok(query) = self.prepare_query(&centroid) else {
            return Some(first);
        };

        slots
            .iter()
            .step_by(step)
            .map(|&slot| (slot, self.exact_query_distance(&query, slot)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(slot, _)| slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(metric: Metric, quantization: Quantization) -> VectorStore {
        let mut store = VectorStore::new(4, metric, quantization);
        store.allocate("a".into(), &[1.0, 0.0, 0.0, 0.0], b"ma".to_vec()).unwrap();
        store.allocate("b".into(), &[0.0, 2.0, 0.0, 0.0], Vec::new()).unwrap();
        store.allocate("c".into(), &[3.0, 3.0, 0.0, 0.0], b"mc".to_vec()).unwrap();
        store
    }

    #[test]
    fn test_raw_vector_is_preserved() {
        let store = store_with(Metric::Cosine, Quantization::None);
        assert_eq!(store.raw(1), &[0.0, 2.0, 0.0, 0.0]);
        assert_eq!(store.raw(2), &[3.0, 3.0, 0.0, 0.0]);
        assert_eq!(store.metadata(2), b"mc");
        assert_eq!(store.id(0), Some("a"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_cosine_distances_use_direction() {
        let store = store_with(Metric::Cosine, Quantization::None);
        // b has norm 2 but is orthogonal to a
        assert!((store.node_distance(0, 1) - 1.0).abs() < 1e-6);
        let expected = 1.0 - std::f32::consts::FRAC_1_SQRT_2;
        assert!((store.node_distance(0, 2) - expected).abs() < 1e-5);

        let q = store.prepare_query(&[5.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(store.exact_query_distance(&q, 0).abs() < 1e-6);
    }

    #[test]
    fn test_quantized_store_exact_distance_matches() {
        let plain = store_with(Metric::Cosine, Quantization::None);
        let quant = store_with(Metric::Cosine, Quantization::Scalar);
        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            assert!((plain.node_distance(a, b) - quant.node_distance(a, b)).abs() < 1e-5);
        }
        let q = quant.prepare_query(&[1.0, 0.1, 0.0, 0.0]).unwrap();
        let approx = quant.query_distance(&q, 0);
        let exact = quant.exact_query_distance(&q, 0);
        assert!((approx - exact).abs() < 0.05);
    }

    #[test]
    fn test_code_distances_follow_exact_order() {
        for quantization in [Quantization::Scalar, Quantization::Binary] {
            let store = store_with(Metric::Cosine, quantization);
            let codes = store.code_distances();
            assert!(codes.node_distance(0, 0) < 1e-2);
            // c sits between a and b: a-c is closer than a-b
            assert!(codes.node_distance(0, 2) < codes.node_distance(0, 1));
            assert_eq!(codes.medoid(&[0, 1, 2]), store.medoid(&[0, 1, 2]));
        }
    }

    #[test]
    fn test_prune_alpha_matches_distance_units() {
        let cosine = store_with(Metric::Cosine, Quantization::None);
        let euclid = store_with(Metric::Euclidean, Quantization::Scalar);
        assert_eq!(cosine.prune_alpha(1.2), 1.2);
        assert!((euclid.prune_alpha(1.2) - 1.44).abs() < 1e-6);
        assert!((euclid.code_distances().prune_alpha(1.2) - 1.44).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_rejected_under_cosine() {
        let mut store = VectorStore::new(3, Metric::Cosine, Quantization::None);
        let err = store.allocate("z".into(), &[0.0, 0.0, 0.0], Vec::new());
        assert!(matches!(err, Err(IndexError::InvalidVector(_))));

        let mut store = VectorStore::new(3, Metric::Euclidean, Quantization::None);
        assert!(store.allocate("z".into(), &[0.0, 0.0, 0.0], Vec::new()).is_ok());
    }

    #[test]
    fn test_release_and_reuse() {
        let mut store = store_with(Metric::Euclidean, Quantization::None);
        assert_eq!(store.release(1).as_deref(), Some("b"));
        assert!(!store.is_occupied(1));
        assert!(store.release(1).is_none());

        let slot = store.allocate("d".into(), &[9.0, 9.0, 9.0, 9.0], Vec::new()).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(store.raw(1), &[9.0, 9.0, 9.0, 9.0]);
        assert_eq!(store.slot_count(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_bytes_roundtrip_keeps_free_slots() {
        let mut store = store_with(Metric::Cosine, Quantization::Scalar);
        store.release(1);
        let bytes = store.to_bytes();

        let loaded = VectorStore::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.slot_count(), 3);
        assert!(!loaded.is_occupied(1));
        assert_eq!(loaded.raw(2), store.raw(2));
        assert_eq!(loaded.metadata(0), b"ma");
        assert_eq!(loaded.quantization(), Quantization::Scalar);
        assert!((loaded.node_distance(0, 2) - store.node_distance(0, 2)).abs() < 1e-6);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let store = store_with(Metric::Cosine, Quantization::None);
        let mut bytes = store.to_bytes();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            VectorStore::from_bytes(&bytes),
            Err(IndexError::CorruptPersistence(_))
        ));
        assert!(VectorStore::from_bytes(b"XXXX").is_err());
    }

    #[test]
    fn test_medoid() {
        let mut store = VectorStore::new(2, Metric::Euclidean, Quantization::None);
        for (i, v) in [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [10.0, 0.0]].iter().enumerate() {
            store.allocate(format!("v{}", i), v, Vec::new()).unwrap();
        }
        // centroid (3.25, 0.75) is nearest to (2, 2)
        assert_eq!(store.medoid(&[0, 1, 2, 3]), Some(2));
        assert_eq!(store.medoid(&[]), None);
    }
}
