//─────────────────────────────────────────────────────────────────────────────
// per-metric sub-scores and their weighted combination
//─────────────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::settings::Configuration;

/// polygon count at which the polygon-count score reaches zero
pub const POLYGON_PENALTY_LIMIT: f64 = 500.0;

/// sub-scores of one evaluation, each in [0, 1], higher = closer match.
/// `None` means the metric was disabled (not computed), which is distinct from
/// an enabled metric that scored 0 or an enabled metric with weight 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricScores {
    pub ssim: Option<f64>,
    pub pixel_diff: Option<f64>,
    pub sub_pixel: Option<f64>,
    pub polygon: Option<f64>,
}

/// weight of each metric, `None` when the metric is switched off
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricWeights {
    pub ssim: Option<f64>,
    pub pixel_diff: Option<f64>,
    pub sub_pixel: Option<f64>,
    pub polygon: Option<f64>,
}

impl MetricWeights {
    pub fn from_config(cfg: &Configuration) -> Self {
        let gate = |enabled: bool, ratio: f64| enabled.then_some(ratio);
        Self {
            ssim: gate(cfg.enable_ssim, cfg.ratio_ssim),
            pixel_diff: gate(cfg.enable_pixel_diff, cfg.ratio_pixel_diff),
            sub_pixel: gate(cfg.enable_sub_diff, cfg.ratio_sub_diff),
            polygon: gate(cfg.enable_variable_polygons, cfg.ratio_polygons),
        }
    }

    /// sum of the enabled weights
    pub fn total(&self) -> f64 {
        [self.ssim, self.pixel_diff, self.sub_pixel, self.polygon]
            .into_iter()
            .flatten()
            .sum()
    }

    /// fail fast on weights the weighted average cannot use: a negative or
    /// non-finite weight, or no positive weight at all
    pub fn ensure_any(&self) -> Result<(), EngineError> {
        let named = [
            ("ratioSsim", self.ssim),
            ("ratioPixelDiff", self.pixel_diff),
            ("ratioSubDiff", self.sub_pixel),
            ("ratioPolygons", self.polygon),
        ];
        for (name, weight) in named {
            if let Some(w) = weight.filter(|w| !w.is_finite() || *w < 0.0) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "{name} must be a finite, non-negative weight, got {w}"
                )));
            }
        }
        if self.total() > 0.0 {
            Ok(())
        } else {
            Err(EngineError::NoFitnessMetricEnabled)
        }
    }

    /// `Σ(score × weight) / Σ(weight)` over enabled metrics.
    /// a metric without a score contributes to neither sum.
    pub fn combine(&self, scores: &MetricScores) -> Result<f64, EngineError> {
        let pairs = [
            (scores.ssim, self.ssim),
            (scores.pixel_diff, self.pixel_diff),
            (scores.sub_pixel, self.sub_pixel),
            (scores.polygon, self.polygon),
        ];
        let (num, den) = pairs
            .into_iter()
            .filter_map(|(s, w)| Some((s?, w?)))
            .fold((0.0, 0.0), |(num, den), (s, w)| (num + s * w, den + w));
        if den <= 0.0 {
            return Err(EngineError::NoFitnessMetricEnabled);
        }
        Ok((num / den).clamp(0.0, 1.0))
    }
}

/// rewards fewer polygons: `1 - count / 500`, floored at 0
#[inline]
pub fn polygon_score(count: usize) -> f64 {
    (1.0 - count as f64 / POLYGON_PENALTY_LIMIT).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(ssim: Option<f64>, pixel: Option<f64>, sub: Option<f64>, poly: Option<f64>) -> MetricWeights {
        MetricWeights { ssim, pixel_diff: pixel, sub_pixel: sub, polygon: poly }
    }

    #[test]
    fn test_weighted_average_excludes_disabled() {
        let scores = MetricScores {
            ssim: Some(0.5),
            pixel_diff: Some(1.0),
            sub_pixel: None,
            polygon: None,
        };
        let w = weights(Some(1.0), Some(3.0), None, None);
        assert!((w.combine(&scores).unwrap() - 0.875).abs() < 1e-12);

        // zero weight keeps the score around but does not count
        let w = weights(Some(1.0), Some(0.0), None, None);
        assert!((w.combine(&scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_fail() {
        let w = weights(Some(0.0), None, Some(0.0), None);
        assert_eq!(w.ensure_any(), Err(EngineError::NoFitnessMetricEnabled));
        assert_eq!(
            w.combine(&MetricScores { ssim: Some(1.0), ..Default::default() }),
            Err(EngineError::NoFitnessMetricEnabled)
        );
    }

    #[test]
    fn test_non_finite_or_negative_weights_are_rejected() {
        for bad in [f64::INFINITY, f64::NAN, -1.0] {
            let w = weights(Some(1.0), Some(bad), None, None);
            assert!(matches!(w.ensure_any(), Err(EngineError::InvalidConfiguration(_))), "{bad}");
        }
        // a disabled metric's weight is never looked at
        let cfg = Configuration {
            enable_pixel_diff: false,
            ratio_pixel_diff: f64::INFINITY,
            ..Configuration::default()
        };
        assert_eq!(MetricWeights::from_config(&cfg).ensure_any(), Ok(()));
    }

    #[test]
    fn test_polygon_score() {
        assert_eq!(polygon_score(0), 1.0);
        assert!((polygon_score(125) - 0.75).abs() < 1e-12);
        assert_eq!(polygon_score(900), 0.0);
    }

    #[test]
    fn test_weights_follow_config_flags() {
        let cfg = Configuration {
            enable_ssim: true,
            enable_pixel_diff: false,
            enable_sub_diff: true,
            ratio_sub_diff: 2.0,
            enable_variable_polygons: false,
            ..Configuration::default()
        };
        let w = MetricWeights::from_config(&cfg);
        assert_eq!(w.ssim, Some(cfg.ratio_ssim));
        assert_eq!(w.pixel_diff, None);
        assert_eq!(w.sub_pixel, Some(2.0));
        assert_eq!(w.polygon, None);
    }
}
