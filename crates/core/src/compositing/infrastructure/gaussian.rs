use ndarray::Array2;

/// Precompute a normalized 1D Gaussian kernel.
///
/// `kernel_size` must be odd and >= 1, `sigma` positive.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f32) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    debug_assert!(sigma > 0.0);
    let sigma = sigma as f64;
    let half = (kernel_size / 2) as f64;
    let mut kernel_f64: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel_f64.iter().sum();
    for v in &mut kernel_f64 {
        *v /= sum;
    }
    kernel_f64.iter().map(|&v| v as f32).collect()
}

/// Mirror an out-of-range index back into `0..len` without repeating the
/// edge sample (`dcb|abcd|cba`).
pub fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = index.rem_euclid(period);
    if m >= len as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Blur a single-channel `(height, width)` plane with a separable kernel.
pub fn separable_gaussian_blur(plane: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (height, width) = plane.dim();
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return plane.clone();
    }
    let half = (kernel.len() / 2) as isize;

    // Horizontal pass: plane → temp
    let mut temp = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - half, width);
                sum += plane[[y, sx]] * w;
            }
            temp[[y, x]] = sum;
        }
    }

    // Vertical pass: temp → out
    let mut out = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = reflect_101(y as isize + k as isize - half, height);
                sum += temp[[sy, x]] * w;
            }
            out[[y, x]] = sum;
        }
    }

    out
}
