//! Distance kernels for vector similarity computation
//!
//! Internal distances are "smaller is closer":
//! - Cosine: `1 - dot(a, b)` on unit vectors, range [0, 2]
//! - Euclidean: squared L2

pub mod cosine;
pub mod euclidean;

pub use cosine::{dot_product, l2_norm, normalized};
pub use euclidean::euclidean_distance_squared;

use crate::config::Metric;

/// Distance metric trait
pub trait DistanceMetric: Send + Sync {
    /// Compute distance between two vectors prepared for this metric
    /// (unit length for cosine, raw for euclidean)
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

impl DistanceMetric for Metric {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => 1.0 - dot_product(a, b),
            Metric::Euclidean => euclidean_distance_squared(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_metric() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        assert!((Metric::Euclidean.distance(&a, &b) - 27.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_metric_on_unit_vectors() {
        let a = normalized(&[1.0, 1.0, 0.0]).unwrap();
        let b = normalized(&[1.0, 0.0, 0.0]).unwrap();
        let dist = Metric::Cosine.distance(&a, &b);
        assert!((dist - (1.0 - std::f32::consts::FRAC_1_SQRT_2)).abs() < 1e-5);
        assert!(Metric::Cosine.distance(&a, &a) < 1e-6);
    }
}
