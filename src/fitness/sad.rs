/// Sum of Absolute Differences (SAD) over RGBA (all 4 channels), and the
/// normalized raw-subtraction score built on top of it.
use rayon::prelude::*;

/// pixels per rayon work unit
const MIN_CHUNK_PIXELS: usize = 16 * 1024;

/// parallel SAD over every byte of two equally sized RGBA buffers
pub fn sad_rgba_parallel(target_rgba: &[u8], current_rgba: &[u8]) -> u64 {
    profiling::scope!("sad_rgba_parallel");
    debug_assert_eq!(target_rgba.len(), current_rgba.len());
    debug_assert_eq!(target_rgba.len() % 4, 0);

    target_rgba
        .par_chunks(MIN_CHUNK_PIXELS * 4)
        .zip(current_rgba.par_chunks(MIN_CHUNK_PIXELS * 4))
        .map(|(t, c)| {
            t.iter()
                .zip(c)
                .map(|(&a, &b)| u64::from(a.abs_diff(b)))
                .sum::<u64>()
        })
        .sum()
}

/// `1 - mean(|target - current|) / 255` over every pixel and channel
pub fn sub_pixel_score(target_rgba: &[u8], current_rgba: &[u8]) -> f64 {
    profiling::scope!("sub_pixel_score");
    if target_rgba.is_empty() {
        return 1.0;
    }
    let sad = sad_rgba_parallel(target_rgba, current_rgba) as f64;
    let mean = sad / target_rgba.len() as f64;
    (1.0 - mean / 255.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sad_counts_all_channels() {
        let a = [10u8, 20, 30, 255, 0, 0, 0, 255];
        let b = [0u8, 25, 30, 250, 0, 0, 1, 255];
        assert_eq!(sad_rgba_parallel(&a, &b), 10 + 5 + 5 + 1);
    }

    #[test]
    fn test_sub_pixel_extremes() {
        let black = vec![0u8; 64];
        let white = vec![255u8; 64];
        assert_eq!(sub_pixel_score(&black, &black), 1.0);
        assert_eq!(sub_pixel_score(&black, &white), 0.0);
    }

    #[test]
    fn test_sad_large_buffer_matches_sequential() {
        let n = MIN_CHUNK_PIXELS * 4 * 3 + 12;
        let a: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        let b: Vec<u8> = (0..n).map(|i| (i % 13) as u8).collect();
        let expected: u64 = a.iter().zip(&b).map(|(&x, &y)| u64::from(x.abs_diff(y))).sum();
        assert_eq!(sad_rgba_parallel(&a, &b), expected);
    }
}
