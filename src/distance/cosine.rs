//! Dot product and L2 norm with SIMD optimization

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;
#[cfg(target_arch = "x86_64")]
use std::sync::OnceLock;

/// CPU feature detection cache (initialized once at startup)
#[cfg(target_arch = "x86_64")]
static CPU_FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy)]
struct CpuFeatures {
    has_avx2: bool,
    has_sse: bool,
}

#[cfg(target_arch = "x86_64")]
fn get_cpu_features() -> CpuFeatures {
    *CPU_FEATURES.get_or_init(|| CpuFeatures {
        has_avx2: is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma"),
        has_sse: is_x86_feature_detected!("sse"),
    })
}

/// Inner product of two equal-length vectors.
///
/// On normalized vectors this is the cosine similarity, which is why the
/// search path stores a normalized copy.
///
/// # Panics
/// Panics if vectors have different dimensions
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    #[cfg(target_arch = "x86_64")]
    {
        let features = get_cpu_features();
        if features.has_avx2 && a.len() >= 8 {
            unsafe { dot_product_avx2(a, b) }
        } else if features.has_sse && a.len() >= 4 {
            unsafe { dot_product_sse(a, b) }
        } else {
            dot_product_scalar(a, b)
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        dot_product_scalar(a, b)
    }
}

/// AVX2 dot product, 2-way unrolled
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn dot_product_avx2(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 16;

    let mut sum1 = _mm256_setzero_ps();
    let mut sum2 = _mm256_setzero_ps();

    for i in 0..chunks {
        let offset = i * 16;
        let a1 = _mm256_loadu_ps(a.as_ptr().add(offset));
        let b1 = _mm256_loadu_ps(b.as_ptr().add(offset));
        let a2 = _mm256_loadu_ps(a.as_ptr().add(offset + 8));
        let b2 = _mm256_loadu_ps(b.as_ptr().add(offset + 8));
        sum1 = _mm256_fmadd_ps(a1, b1, sum1);
        sum2 = _mm256_fmadd_ps(a2, b2, sum2);
    }

    let mut offset = chunks * 16;
    if n - offset >= 8 {
        let a1 = _mm256_loadu_ps(a.as_ptr().add(offset));
        let b1 = _mm256_loadu_ps(b.as_ptr().add(offset));
        sum1 = _mm256_fmadd_ps(a1, b1, sum1);
        offset += 8;
    }

    let mut dot = horizontal_sum_avx2(_mm256_add_ps(sum1, sum2));
    for i in offset..n {
        dot += a[i] * b[i];
    }
    dot
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn dot_product_sse(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;

    let mut sum = _mm_setzero_ps();
    for i in 0..chunks {
        let offset = i * 4;
        let a_vec = _mm_loadu_ps(a.as_ptr().add(offset));
        let b_vec = _mm_loadu_ps(b.as_ptr().add(offset));
        sum = _mm_add_ps(sum, _mm_mul_ps(a_vec, b_vec));
    }

    let mut dot = horizontal_sum_sse(sum);
    for i in chunks * 4..n {
        dot += a[i] * b[i];
    }
    dot
}

fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// AVX2 horizontal sum
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn horizontal_sum_avx2(v: __m256) -> f32 {
    let sum_high_low = _mm_add_ps(_mm256_castps256_ps128(v), _mm256_extractf128_ps(v, 1));
    let sum1 = _mm_hadd_ps(sum_high_low, sum_high_low);
    let sum2 = _mm_hadd_ps(sum1, sum1);
    _mm_cvtss_f32(sum2)
}

/// SSE horizontal sum
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse")]
unsafe fn horizontal_sum_sse(v: __m128) -> f32 {
    let sum1 = _mm_add_ps(v, _mm_movehl_ps(v, v));
    let sum2 = _mm_add_ss(sum1, _mm_shuffle_ps(sum1, sum1, 1));
    _mm_cvtss_f32(sum2)
}

/// L2 norm
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Unit-length copy of `v`, or `None` for a zero (or non-finite) norm
pub fn normalized(v: &[f32]) -> Option<Vec<f32>> {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    let inv = 1.0 / norm;
    Some(v.iter().map(|x| x * inv).collect())
}
