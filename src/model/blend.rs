//! Linear and barycentric interpolation of parameter sets.
//!
//! The first set is always the base: every one of its keys survives the
//! blend. Keys the other sets lack (or hold with a different shape) simply
//! don't contribute, which lets models trained from slightly different
//! network revisions be mixed without errors.

use crate::model::params::{ModelParameterSet, Tensor};

pub fn blend_two(a: &ModelParameterSet, b: &ModelParameterSet, alpha: f32) -> ModelParameterSet {
    let alpha = clamp_unit(alpha);
    let mut out = ModelParameterSet::new();

    for (key, ta) in a {
        let blended = match b.get(key) {
            Some(tb) if tb.same_shape(ta) => ta.lerp(tb, alpha),
            _ => ta.clone(),
        };
        out.insert(key.clone(), blended);
    }

    out
}

pub fn blend_three(
    a: &ModelParameterSet,
    b: &ModelParameterSet,
    c: &ModelParameterSet,
    weights: [f32; 3],
) -> ModelParameterSet {
    let [w1, w2, w3] = normalize_weights(weights);
    let mut out = ModelParameterSet::new();

    for (key, ta) in a {
        let mut t: Tensor = ta.scaled(w1);
        if let Some(tb) = b.get(key).filter(|tb| tb.same_shape(ta)) {
            t.add_scaled(tb, w2);
        }
        if let Some(tc) = c.get(key).filter(|tc| tc.same_shape(ta)) {
            t.add_scaled(tc, w3);
        }
        out.insert(key.clone(), t);
    }

    out
}

/// Clamp each weight to `[0,1]` and rescale so they sum to 1.
/// An all-zero (or non-finite) input falls back to equal thirds.
pub fn normalize_weights(weights: [f32; 3]) -> [f32; 3] {
    let clamped = weights.map(clamp_unit);
    let sum: f32 = clamped.iter().sum();
    if sum <= f32::EPSILON {
        return [1.0 / 3.0; 3];
    }
    clamped.map(|w| w / sum)
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}
