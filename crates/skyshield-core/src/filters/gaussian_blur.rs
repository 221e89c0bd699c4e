use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Apply a separable Gaussian blur. A non-positive sigma returns a copy.
///
/// Borders are handled by clamping to the nearest edge pixel.
pub fn gaussian_blur_array(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 || data.is_empty() {
        return data.clone();
    }
    let kernel = make_gaussian_kernel(sigma);
    let row_pass = convolve_rows(data, &kernel);
    let transposed = row_pass.t().to_owned();
    convolve_rows(&transposed, &kernel).t().to_owned()
}

fn make_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Convolve every row of `data` with `kernel`.
fn convolve_rows(data: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<f32>::zeros((h, w));

    let convolve_row = |src: ndarray::ArrayView1<f32>, mut dst: ndarray::ArrayViewMut1<f32>| {
        for col in 0..w {
            let mut sum = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let src_col =
                    (col as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                sum += src[src_col] * kv;
            }
            dst[col] = sum;
        }
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(data.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(dst, src)| convolve_row(src, dst));
    } else {
        for (dst, src) in result.axis_iter_mut(Axis(0)).zip(data.axis_iter(Axis(0))) {
            convolve_row(src, dst);
        }
    }

    result
}
