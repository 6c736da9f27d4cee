// Vector helpers shared by scoring and candidate selection

use ndarray::{Array1, ArrayView1};

/// Dot product, or `None` when the lengths differ
pub fn checked_dot(a: ArrayView1<f32>, b: ArrayView1<f32>) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.dot(&b))
}

/// Euclidean norm
pub fn norm(v: ArrayView1<f32>) -> f32 {
    v.dot(&v).sqrt()
}

/// Compute cosine similarity between two factor vectors
///
/// Formula: cos(A, B) = (A · B) / (||A|| × ||B||)
///
/// Returns `None` on a length mismatch and 0.0 when either vector is zero.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> Option<f32> {
    let dot = checked_dot(a, b)?;
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        Some(0.0)
    } else {
        Some(dot / (norm_a * norm_b))
    }
}

/// Scale a vector to unit length; zero vectors have no direction
pub fn to_unit(v: ArrayView1<f32>) -> Option<Array1<f32>> {
    let n = norm(v);
    if n == 0.0 {
        None
    } else {
        Some(v.mapv(|x| x / n))
    }
}
