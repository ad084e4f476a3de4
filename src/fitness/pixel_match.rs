// perceptual per-pixel comparison in YIQ space.
//
// a pixel counts as mismatched when its YIQ delta exceeds the threshold and it
// does not look like an anti-aliasing artifact in either image. the diff image
// paints matching pixels as faded grayscale, AA pixels yellow and mismatches red.

/// default anti-aliasing tolerant threshold on a 0..1 scale
pub const DEFAULT_THRESHOLD: f64 = 0.1;
/// maximum possible YIQ delta between two colors
const MAX_YIQ_DELTA: f64 = 35215.0;
/// opacity of the grayscale background in the diff image
const DIFF_FADE: f64 = 0.1;
const AA_COLOR: [u8; 3] = [255, 255, 0];
const DIFF_COLOR: [u8; 3] = [255, 0, 0];

#[derive(Clone, Debug, PartialEq)]
pub struct PixelMatch {
    pub mismatched: usize,
    pub total: usize,
    /// RGBA8 diff visualization, same size as the inputs
    pub diff: Vec<u8>,
}

impl PixelMatch {
    /// share of pixels that match, in [0, 1]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.mismatched) as f64 / self.total as f64
    }
}

#[inline]
fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

#[inline]
fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

#[inline]
fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

/// blend a channel with white by `alpha`
#[inline]
fn blend(c: f64, alpha: f64) -> f64 {
    255.0 + (c - 255.0) * alpha
}

#[inline]
fn rgb_of(img: &[u8], pos: usize) -> (f64, f64, f64) {
    let (r, g, b, a) = (img[pos], img[pos + 1], img[pos + 2], img[pos + 3]);
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a < 255 {
        let a = f64::from(a) / 255.0;
        (blend(r, a), blend(g, a), blend(b, a))
    } else {
        (r, g, b)
    }
}

/// squared YIQ distance between two pixels, signed by which one is brighter.
/// with `y_only` only the signed luma difference is returned.
fn color_delta(img1: &[u8], img2: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if img1[k..k + 4] == img2[m..m + 4] {
        return 0.0;
    }
    let (r1, g1, b1) = rgb_of(img1, k);
    let (r2, g2, b2) = rgb_of(img2, m);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// 3x3 neighbourhood of (x, y) clipped to the image: (x0, y0, x2, y2)
#[inline]
fn neighbourhood(x: usize, y: usize, width: usize, height: usize) -> (usize, usize, usize, usize) {
    (x.saturating_sub(1), y.saturating_sub(1), (x + 1).min(width - 1), (y + 1).min(height - 1))
}

/// whether the pixel has more than two identical neighbours
fn has_many_siblings(img: &[u8], x1: usize, y1: usize, width: usize, height: usize) -> bool {
    let (x0, y0, x2, y2) = neighbourhood(x1, y1, width, height);
    let pos = (y1 * width + x1) * 4;
    let mut zeroes = usize::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let pos2 = (y * width + x) * 4;
            if img[pos..pos + 4] == img[pos2..pos2 + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

/// whether the pixel at (x1, y1) of `img` looks like an anti-aliased edge
fn antialiased(img: &[u8], x1: usize, y1: usize, width: usize, height: usize, other: &[u8]) -> bool {
    let (x0, y0, x2, y2) = neighbourhood(x1, y1, width, height);
    let pos = (y1 * width + x1) * 4;
    let mut zeroes = usize::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let (mut min, mut max) = (0.0f64, 0.0f64);
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0, 0, 0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, (y * width + x) * 4, true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_x = x;
                min_y = y;
            } else if delta > max {
                max = delta;
                max_x = x;
                max_y = y;
            }
        }
    }

    // no darker or no brighter neighbour: not an edge
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_x, min_y, width, height) && has_many_siblings(other, min_x, min_y, width, height))
        || (has_many_siblings(img, max_x, max_y, width, height)
            && has_many_siblings(other, max_x, max_y, width, height))
}

#[inline]
fn draw_pixel(out: &mut [u8], pos: usize, [r, g, b]: [u8; 3]) {
    out[pos..pos + 4].copy_from_slice(&[r, g, b, 255]);
}

/// compare two equally sized RGBA8 images
pub fn pixel_match(img1: &[u8], img2: &[u8], width: u32, height: u32, threshold: f64) -> PixelMatch {
    profiling::scope!("pixel_match");
    debug_assert_eq!(img1.len(), img2.len());
    let (width, height) = (width as usize, height as usize);
    let total = width * height;
    let mut diff = vec![0u8; total * 4];
    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let mut mismatched = 0usize;

    for y in 0..height {
        for x in 0..width {
            let pos = (y * width + x) * 4;
            let delta = color_delta(img1, img2, pos, pos, false);

            if delta.abs() > max_delta {
                if antialiased(img1, x, y, width, height, img2) || antialiased(img2, x, y, width, height, img1) {
                    draw_pixel(&mut diff, pos, AA_COLOR);
                } else {
                    draw_pixel(&mut diff, pos, DIFF_COLOR);
                    mismatched += 1;
                }
            } else {
                let (r, g, b) = (f64::from(img1[pos]), f64::from(img1[pos + 1]), f64::from(img1[pos + 2]));
                let alpha = DIFF_FADE * f64::from(img1[pos + 3]) / 255.0;
                let v = blend(rgb2y(r, g, b), alpha).round().clamp(0.0, 255.0) as u8;
                draw_pixel(&mut diff, pos, [v, v, v]);
            }
        }
    }

    PixelMatch { mismatched, total, diff }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: usize, h: usize, rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat(w * h)
    }

    #[test]
    fn test_identical_images_match() {
        let img = solid(8, 8, [30, 60, 90, 255]);
        let m = pixel_match(&img, &img, 8, 8, DEFAULT_THRESHOLD);
        assert_eq!(m.mismatched, 0);
        assert_eq!(m.ratio(), 1.0);
        assert_eq!(m.diff.len(), 8 * 8 * 4);
    }

    #[test]
    fn test_completely_different_images() {
        let a = solid(6, 6, [0, 0, 0, 255]);
        let b = solid(6, 6, [255, 255, 255, 255]);
        let m = pixel_match(&a, &b, 6, 6, DEFAULT_THRESHOLD);
        assert_eq!(m.mismatched, 36);
        assert_eq!(m.ratio(), 0.0);
        assert_eq!(&m.diff[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_small_change_is_tolerated() {
        let a = solid(4, 4, [100, 100, 100, 255]);
        let b = solid(4, 4, [104, 100, 100, 255]);
        assert_eq!(pixel_match(&a, &b, 4, 4, DEFAULT_THRESHOLD).mismatched, 0);
    }

    #[test]
    fn test_single_changed_pixel() {
        let a = solid(5, 5, [0, 0, 0, 255]);
        let mut b = a.clone();
        let pos = (2 * 5 + 2) * 4;
        b[pos..pos + 3].copy_from_slice(&[255, 255, 255]);
        let m = pixel_match(&a, &b, 5, 5, DEFAULT_THRESHOLD);
        assert_eq!(m.mismatched, 1);
        assert!((m.ratio() - 24.0 / 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_color_delta_sign() {
        let dark = [0u8, 0, 0, 255];
        let light = [255u8, 255, 255, 255];
        assert!(color_delta(&light, &dark, 0, 0, false) < 0.0);
        assert!(color_delta(&dark, &light, 0, 0, false) > 0.0);
        assert_eq!(color_delta(&dark, &dark, 0, 0, false), 0.0);
    }
}
