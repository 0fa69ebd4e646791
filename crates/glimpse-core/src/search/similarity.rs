//! Cosine similarity and dimension validation.

use crate::storage::StoreError;

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Returns 0.0 for zero-magnitude or mismatched-length vectors rather than
/// propagating NaN into ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Validates that an embedding has the expected dimension.
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), StoreError> {
    if actual == expected {
        Ok(())
    } else {
        Err(StoreError::DimensionMismatch { expected, actual })
    }
}
