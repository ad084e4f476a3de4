// Fitness module organization
// Each submodule computes one similarity metric; `Evaluator` ties them together

pub mod metrics;
pub mod pixel_match;
pub mod sad;
pub mod ssim;

pub use metrics::{polygon_score, MetricScores, MetricWeights, POLYGON_PENALTY_LIMIT};
pub use pixel_match::{pixel_match, PixelMatch, DEFAULT_THRESHOLD};
pub use sad::{sad_rgba_parallel, sub_pixel_score};
pub use ssim::{ssim, SsimReference};

use crate::dna::GeneLayout;
use crate::error::EngineError;
use crate::geom::Polygon;
use crate::messages::PixelBuffer;
use crate::render::Surface;
use crate::settings::Configuration;

/// result of evaluating one genotype
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub fitness: f64,
    pub scores: MetricScores,
    /// pixel-match diff image, present when pixel matching is enabled
    pub diff: Option<Vec<u8>>,
    pub phenotype: Vec<Polygon>,
}

/// scores genotypes against one target image at the rendering resolution.
/// built once per generation step; holds everything precomputable about the target.
pub struct Evaluator {
    layout: GeneLayout,
    weights: MetricWeights,
    width: u32,
    height: u32,
    target: Vec<u8>,
    ssim_ref: Option<SsimReference>,
}

impl Evaluator {
    /// prepare the target for rendering at `width x height`, resampling it when
    /// its native resolution differs.
    pub fn new(target: &PixelBuffer, cfg: &Configuration, width: u32, height: u32) -> Result<Self, EngineError> {
        profiling::scope!("Evaluator::new");
        let weights = MetricWeights::from_config(cfg);
        weights.ensure_any()?;
        let target = target.resized(width, height)?.data;
        let ssim_ref = weights.ssim.map(|_| SsimReference::new(&target, width, height));

        Ok(Self {
            layout: GeneLayout::from_config(cfg),
            weights,
            width,
            height,
            target,
            ssim_ref,
        })
    }

    pub fn layout(&self) -> &GeneLayout {
        &self.layout
    }

    /// target pixels at the rendering resolution
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    /// decode, render on the (freshly cleared) surface, score every enabled metric
    pub fn evaluate(&self, genes: &[f32], surface: &mut Surface) -> Result<Evaluation, EngineError> {
        profiling::scope!("evaluate");
        let phenotype = self.layout.decode(genes)?;
        let mut canvas = surface.begin();
        canvas.draw_all(&phenotype);
        let generated = canvas.read_rgba();
        self.score(&generated, phenotype)
    }

    /// score an already rendered image
    pub fn score(&self, generated: &[u8], phenotype: Vec<Polygon>) -> Result<Evaluation, EngineError> {
        debug_assert_eq!(generated.len(), self.target.len());
        let mut scores = MetricScores::default();
        let mut diff = None;

        if let Some(reference) = &self.ssim_ref {
            scores.ssim = Some(reference.compare(generated));
        }
        if self.weights.pixel_diff.is_some() {
            let m = pixel_match(&self.target, generated, self.width, self.height, DEFAULT_THRESHOLD);
            scores.pixel_diff = Some(m.ratio());
            diff = Some(m.diff);
        }
        if self.weights.sub_pixel.is_some() {
            scores.sub_pixel = Some(sub_pixel_score(&self.target, generated));
        }
        if self.weights.polygon.is_some() {
            scores.polygon = Some(polygon_score(phenotype.len()));
        }

        let fitness = self.weights.combine(&scores)?;
        Ok(Evaluation { fitness, scores, diff, phenotype })
    }
}
