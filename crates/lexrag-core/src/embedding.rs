//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that every embedding backend
//! implements, plus pure helpers for normalization and inner product.
//!
//! Concrete providers (fastembed, OpenAI, Ollama, feature hashing) live in
//! the `lexrag` app crate. Tests substitute a deterministic fake.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// The single seam through which the index obtains vectors, both for
/// chunks at build time and for queries at search time. Implementations
/// must return one vector per input text, in input order, all of the
/// same dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Euclidean (L2) norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit L2 norm in place.
///
/// Returns `false` and leaves `v` untouched when its norm is zero (or not
/// finite), since there is no direction to preserve.
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm < f32::EPSILON || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Inner product of two equal-length vectors.
///
/// For unit vectors this is the cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_norm() {
        let mut v = vec![3.0, 4.0];
        assert!(normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_left_as_is() {
        let mut v = vec![0.0; 4];
        assert!(!normalize(&mut v));
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_dot_of_unit_vectors_is_cosine() {
        let mut a = vec![1.0, 2.0, 3.0];
        let mut b = vec![-2.0, 0.5, 1.0];
        let expected = 2.0 / (14.0f32 * 5.25).sqrt();
        normalize(&mut a);
        normalize(&mut b);
        assert!((dot(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_dot_orthogonal_and_opposite() {
        assert!(dot(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert!((dot(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_non_finite() {
        let mut v = vec![f32::INFINITY, 1.0];
        assert!(!normalize(&mut v));
    }
}
