//! Euclidean distance computation with SIMD optimization

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Squared Euclidean distance. The graph ranks on this directly (no sqrt).
///
/// # Panics
/// Panics if vectors have different dimensions
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && a.len() >= 8 {
            unsafe { euclidean_distance_squared_avx2(a, b) }
        } else if is_x86_feature_detected!("sse") && a.len() >= 4 {
            unsafe { euclidean_distance_squared_sse(a, b) }
        } else {
            euclidean_distance_squared_scalar(a, b)
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        euclidean_distance_squared_scalar(a, b)
    }
}

/// AVX2 squared L2
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn euclidean_distance_squared_avx2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;

    let mut sum_vec = _mm256_setzero_ps();
    for i in 0..chunks {
        let offset = i * 8;
        let a_vec = _mm256_loadu_ps(a.as_ptr().add(offset));
        let b_vec = _mm256_loadu_ps(b.as_ptr().add(offset));
        let diff = _mm256_sub_ps(a_vec, b_vec);
        sum_vec = _mm256_add_ps(sum_vec, _mm256_mul_ps(diff, diff));
    }

    let mut sum_squared = horizontal_sum_avx2_fast(sum_vec);
    for i in chunks * 8..n {
        let diff = a[i] - b[i];
        sum_squared += diff * diff;
    }
    sum_squared
}

/// SSE squared L2
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn euclidean_distance_squared_sse(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;

    let mut sum_vec = _mm_setzero_ps();
    for i in 0..chunks {
        let offset = i * 4;
        let a_vec = _mm_loadu_ps(a.as_ptr().add(offset));
        let b_vec = _mm_loadu_ps(b.as_ptr().add(offset));
        let diff = _mm_sub_ps(a_vec, b_vec);
        sum_vec = _mm_add_ps(sum_vec, _mm_mul_ps(diff, diff));
    }

    let sum1 = _mm_add_ps(sum_vec, _mm_movehl_ps(sum_vec, sum_vec));
    let sum2 = _mm_add_ss(sum1, _mm_shuffle_ps(sum1, sum1, 1));
    let mut sum_squared = _mm_cvtss_f32(sum2);

    for i in chunks * 4..n {
        let diff = a[i] - b[i];
        sum_squared += diff * diff;
    }
    sum_squared
}

fn euclidean_distance_squared_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn horizontal_sum_avx2_fast(v: __m256) -> f32 {
    let high = _mm256_extractf128_ps(v, 1);
    let low = _mm256_castps256_ps128(v);
    let sum128 = _mm_add_ps(high, low);

    let shuf = _mm_movehdup_ps(sum128);
    let sum64 = _mm_add_ps(sum128, shuf);
    let shuf2 = _mm_movehl_ps(shuf, sum64);
    let sum32 = _mm_add_ss(sum64, shuf2);

    _mm_cvtss_f32(sum32)
}
