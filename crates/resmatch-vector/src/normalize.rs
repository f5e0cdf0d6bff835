//! L2 normalization shared by the ingest and query paths.
//!
//! Stored and query vectors are both scaled to unit length, which is what
//! lets the index score cosine similarity as a plain inner product.

use resmatch_core::error::{MatchError, Result};

/// Euclidean norm of `v`, accumulated in f64.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| (*x as f64) * (*x as f64))
        .sum::<f64>()
        .sqrt()
}

/// Return `v` scaled to unit L2 norm.
///
/// Fails with `ZeroVector` for an all-zero (or empty) vector and with
/// `NonFiniteVector` if any component is NaN or infinite.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out)?;
    Ok(out)
}

/// Scale `v` to unit L2 norm in place. On error `v` is left unchanged.
pub fn normalize_in_place(v: &mut [f32]) -> Result<()> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(MatchError::NonFiniteVector);
    }

    let norm = l2_norm(v);
    if norm == 0.0 {
        return Err(MatchError::ZeroVector);
    }

    for x in v.iter_mut() {
        *x = ((*x as f64) / norm) as f32;
    }
    Ok(())
}

/// True if `v` has unit norm within `tolerance`.
pub fn is_unit(v: &[f32], tolerance: f64) -> bool {
    (l2_norm(v) - 1.0).abs() <= tolerance
}
