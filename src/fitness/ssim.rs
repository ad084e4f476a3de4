// windowed structural similarity (SSIM) on luma.
//
// every 11x11 window (stride 1) is scored with the usual
//   ((2 μx μy + c1)(2 σxy + c2)) / ((μx² + μy² + c1)(σx² + σy² + c2))
// and the mean over all windows is returned. window sums come from summed-area
// tables, so the cost is linear in the pixel count whatever the window size.

pub const WINDOW_SIZE: usize = 11;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const PEAK: f64 = 255.0;

/// integer BT.601 luma, 0..=255
#[inline]
fn luma(r: u8, g: u8, b: u8) -> f64 {
    ((77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b) + 128) >> 8) as f64
}

pub fn rgba_to_luma(rgba: &[u8]) -> Vec<f64> {
    rgba.chunks_exact(4).map(|p| luma(p[0], p[1], p[2])).collect()
}

/// summed-area table with a zero first row and column: `(w+1) x (h+1)`
#[derive(Clone, Debug)]
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(values: impl Fn(usize) -> f64, width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += values(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// sum over `[x, x+w) x [y, y+h)`
    #[inline]
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        self.sums[(y + h) * s + x + w] - self.sums[y * s + x + w] - self.sums[(y + h) * s + x]
            + self.sums[y * s + x]
    }
}

/// precomputed statistics of the fixed image, reused for every candidate
#[derive(Clone, Debug)]
pub struct SsimReference {
    width: usize,
    height: usize,
    luma: Vec<f64>,
    sum: Integral,
    sum_sq: Integral,
}

impl SsimReference {
    pub fn new(rgba: &[u8], width: u32, height: u32) -> Self {
        profiling::scope!("SsimReference::new");
        let (width, height) = (width as usize, height as usize);
        let luma = rgba_to_luma(rgba);
        let sum = Integral::build(|i| luma[i], width, height);
        let sum_sq = Integral::build(|i| luma[i] * luma[i], width, height);
        Self { width, height, luma, sum, sum_sq }
    }

    /// mean SSIM between the reference and `rgba`, clamped to [0, 1]
    pub fn compare(&self, rgba: &[u8]) -> f64 {
        profiling::scope!("ssim_compare");
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return 1.0;
        }
        let other = rgba_to_luma(rgba);
        let sum = Integral::build(|i| other[i], w, h);
        let sum_sq = Integral::build(|i| other[i] * other[i], w, h);
        let cross = Integral::build(|i| other[i] * self.luma[i], w, h);

        // images smaller than a window are scored as a single window
        let win_w = WINDOW_SIZE.min(w);
        let win_h = WINDOW_SIZE.min(h);
        let n = (win_w * win_h) as f64;
        let c1 = (K1 * PEAK).powi(2);
        let c2 = (K2 * PEAK).powi(2);

        let mut total = 0.0;
        let mut windows = 0usize;
        for y in 0..=(h - win_h) {
            for x in 0..=(w - win_w) {
                let mx = self.sum.window(x, y, win_w, win_h) / n;
                let my = sum.window(x, y, win_w, win_h) / n;
                // population variance/covariance, floored against rounding noise
                let vx = (self.sum_sq.window(x, y, win_w, win_h) / n - mx * mx).max(0.0);
                let vy = (sum_sq.window(x, y, win_w, win_h) / n - my * my).max(0.0);
                let cov = cross.window(x, y, win_w, win_h) / n - mx * my;

                let num = (2.0 * mx * my + c1) * (2.0 * cov + c2);
                let den = (mx * mx + my * my + c1) * (vx + vy + c2);
                total += num / den;
                windows += 1;
            }
        }

        (total / windows as f64).clamp(0.0, 1.0)
    }
}

/// one-shot SSIM between two RGBA buffers of the same size
pub fn ssim(a: &[u8], b: &[u8], width: u32, height: u32) -> f64 {
    SsimReference::new(a, width, height).compare(b)
}
