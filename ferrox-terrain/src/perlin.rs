//! Classic 2D gradient noise (FastNoiseLite-style), FBM-summed across octaves.

const GRADIENTS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (core::f64::consts::FRAC_1_SQRT_2, core::f64::consts::FRAC_1_SQRT_2),
    (-core::f64::consts::FRAC_1_SQRT_2, core::f64::consts::FRAC_1_SQRT_2),
    (core::f64::consts::FRAC_1_SQRT_2, -core::f64::consts::FRAC_1_SQRT_2),
    (-core::f64::consts::FRAC_1_SQRT_2, -core::f64::consts::FRAC_1_SQRT_2),
];

fn hash2(seed: u32, xi: i32, yi: i32) -> u32 {
    let mut h = seed
        ^ (xi as u32).wrapping_mul(0x27d4_eb2d)
        ^ (yi as u32).wrapping_mul(0x1656_67b1);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

fn gradient(seed: u32, xi: i32, yi: i32) -> (f64, f64) {
    GRADIENTS[(hash2(seed, xi, yi) as usize) % GRADIENTS.len()]
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Single-octave gradient noise in roughly `[-1, 1]`.
pub fn single_perlin(seed: u32, x: f64, y: f64) -> f64 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let sx = fade(x - x0 as f64);
    let sy = fade(y - y0 as f64);

    let dot = |xi: i32, yi: i32| -> f64 {
        let (gx, gy) = gradient(seed, xi, yi);
        let dx = x - xi as f64;
        let dy = y - yi as f64;
        gx * dx + gy * dy
    };

    let n00 = dot(x0, y0);
    let n10 = dot(x1, y0);
    let n01 = dot(x0, y1);
    let n11 = dot(x1, y1);

    let ix0 = lerp(n00, n10, sx);
    let ix1 = lerp(n01, n11, sx);
    lerp(ix0, ix1, sy) * core::f64::consts::SQRT_2
}

/// Sums `octaves` layers of [`single_perlin`] at increasing frequency (`lacunarity`) and
/// decreasing amplitude (`persistence`), normalized by `fractal_bounding` so the result stays
/// within roughly `[-1, 1]` regardless of octave count.
#[allow(clippy::too_many_arguments)]
pub fn fbm(
    seed: u32,
    x: f64,
    y: f64,
    frequency: f64,
    octaves: u32,
    lacunarity: f64,
    persistence: f64,
    fractal_bounding: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut fx = x * frequency;
    let mut fy = y * frequency;
    for octave in 0..octaves {
        sum += single_perlin(seed.wrapping_add(octave), fx, fy) * amplitude;
        fx *= lacunarity;
        fy *= lacunarity;
        amplitude *= persistence;
    }
    sum * fractal_bounding
}

/// `Σ persistence^i` for `i ∈ [0, octaves)`, inverted so FBM output stays normalized.
pub fn fractal_bounding(octaves: u32, persistence: f64) -> f64 {
    let mut amplitude = 1.0;
    let mut total = 0.0;
    for _ in 0..octaves {
        total += amplitude;
        amplitude *= persistence;
    }
    if total > 0.0 {
        1.0 / total
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_octave_is_deterministic_for_same_seed() {
        let a = single_perlin(42, 1.25, 3.75);
        let b = single_perlin(42, 1.25, 3.75);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = single_perlin(1, 1.25, 3.75);
        let b = single_perlin(2, 1.25, 3.75);
        assert_ne!(a, b);
    }

    #[test]
    fn fbm_stays_roughly_bounded() {
        let bounding = fractal_bounding(6, 0.5);
        for i in 0..20 {
            let v = fbm(7, i as f64 * 0.37, i as f64 * 1.11, 1.0, 6, 2.0, 0.5, bounding);
            assert!(v.abs() <= 2.0, "fbm value {v} escaped expected range");
        }
    }
}
