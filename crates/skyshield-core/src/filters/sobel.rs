use ndarray::Array2;

/// Compute the Sobel gradient magnitude image.
///
/// Sobel kernels:
///   Gx = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]]
///   Gy = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]]
///
/// Returns an array of the same dimensions as the input. The 1-pixel border
/// is zero (the kernel needs a full 3x3 neighborhood).
pub fn gradient_magnitude_array(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    if h < 3 || w < 3 {
        return result;
    }

    let px = |r: usize, c: usize| data[[r, c]] as f64;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let gx = -px(row - 1, col - 1) + px(row - 1, col + 1) - 2.0 * px(row, col - 1)
                + 2.0 * px(row, col + 1)
                - px(row + 1, col - 1)
                + px(row + 1, col + 1);

            let gy = -px(row - 1, col - 1) - 2.0 * px(row - 1, col) - px(row - 1, col + 1)
                + px(row + 1, col - 1)
                + 2.0 * px(row + 1, col)
                + px(row + 1, col + 1);

            result[[row, col]] = (gx * gx + gy * gy).sqrt() as f32;
        }
    }

    result
}
