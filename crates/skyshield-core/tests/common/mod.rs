use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use skyshield_core::background::BackgroundEstimate;
use skyshield_core::frame::{Frame, FrameMetadata, Mask};
use skyshield_core::odc::FrameObservation;

pub const SKY_LEVEL: f32 = 1000.0;
pub const SKY_SIGMA: f32 = 10.0;

/// Gaussian sky noise around `level`, reproducible for a given seed.
pub fn noise_frame(height: usize, width: usize, level: f32, sigma: f32, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(level, sigma).expect("valid normal");
    Array2::from_shape_fn((height, width), |_| normal.sample(&mut rng))
}

/// Add a straight streak of the given half-width from `(r0, c0)` to `(r1, c1)`
/// and return the pixels it covers.
pub fn inject_streak(
    data: &mut Array2<f32>,
    (r0, c0): (f64, f64),
    (r1, c1): (f64, f64),
    half_width: f64,
    amplitude: f32,
) -> Mask {
    let (dr, dc) = (r1 - r0, c1 - c0);
    let len2 = dr * dr + dc * dc;
    let mut truth = Array2::from_elem(data.dim(), false);
    for ((r, c), v) in data.indexed_iter_mut() {
        let (pr, pc) = (r as f64 - r0, c as f64 - c0);
        let t = ((pr * dr + pc * dc) / len2).clamp(0.0, 1.0);
        let (qr, qc) = (pr - t * dr, pc - t * dc);
        if (qr * qr + qc * qc).sqrt() <= half_width {
            *v += amplitude;
            truth[[r, c]] = true;
        }
    }
    Mask::new(truth)
}

/// A named frame with no acquisition metadata.
pub fn named_frame(data: Array2<f32>, name: &str) -> Frame {
    Frame::with_metadata(
        data,
        FrameMetadata {
            name: name.to_string(),
            ..Default::default()
        },
    )
}

/// Observation with a fixed background level and no site or time.
pub fn observation(name: &str, level: f64, area_fraction: f64) -> FrameObservation {
    FrameObservation {
        name: name.to_string(),
        area_fraction,
        background: Ok(BackgroundEstimate {
            level,
            noise: 1.0,
            n_clean: 10_000,
            n_retained: 9_900,
            masked_fraction: area_fraction,
        }),
        timestamp: None,
        site: None,
        pointing: None,
    }
}

/// Fraction of `truth` pixels also set in `predicted`.
pub fn covered_fraction(predicted: &Mask, truth: &Mask) -> f64 {
    let truth_count = truth.count();
    if truth_count == 0 {
        return 1.0;
    }
    let hit = predicted
        .data
        .iter()
        .zip(truth.data.iter())
        .filter(|(&p, &t)| p && t)
        .count();
    hit as f64 / truth_count as f64
}

/// Raw header block from `(key, value)` pairs, terminated by END.
pub fn raw_fits_header(cards: &[(&str, &str)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (key, value) in cards {
        bytes.extend(format!("{key:<8}= {value:>20}{:50}", "").bytes());
    }
    bytes.extend(format!("{:<80}", "END").bytes());
    bytes.resize(2880, b' ');
    bytes
}
