use rand::Rng;

use crate::dna::{GeneLayout, IdGenerator, Individual, Origin};
use crate::error::EngineError;
use crate::geom::{move_vertex, nearest_polygon, Polygon, Vertex, ALPHA_MAX, ALPHA_MIN, CHANNEL_MAX};
use crate::settings::Configuration;

/// rendering bounds vertices are clamped into
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    /// vertex displacement range: `max(width, height) × movement`, at least 1px
    #[inline]
    pub fn vertex_range(&self, movement: f64) -> f32 {
        let range = self.width.max(self.height) * movement as f32;
        if range.abs() < 1.0 {
            1.0f32.copysign(range)
        } else {
            range
        }
    }
}

/// drift each channel by a random factor in `[-rate, rate]` and clamp it back
/// into its valid range. alpha stays in `[ALPHA_MIN, 1]`, r/g/b are rounded.
fn drift_color<R: Rng>(rng: &mut R, color: &mut [f32], rate: f64) {
    let rate = rate.abs() as f32;
    for (i, channel) in color.iter_mut().enumerate() {
        let factor = rng.random_range(-rate..=rate);
        let value = *channel + *channel * factor;
        *channel = if i == 3 {
            value.clamp(ALPHA_MIN, ALPHA_MAX)
        } else {
            value.clamp(0.0, CHANNEL_MAX).round()
        };
    }
}

/// mutated copy of `genes`.
///
/// each vertex and each color group is picked with probability `mutationRate`
/// (always, when `force`). a picked vertex either inserts a new random polygon
/// before its own (variable polygon mode), removes its polygon, or moves.
/// a picked color either copies the nearest polygon's color or drifts.
pub fn mutate_genes<R: Rng>(
    rng: &mut R,
    genes: &[f32],
    cfg: &Configuration,
    layout: &GeneLayout,
    bounds: Bounds,
    force: bool,
) -> Result<Vec<f32>, EngineError> {
    let polygons = layout.decode(genes)?;
    Ok(mutate_decoded(rng, genes, &polygons, cfg, layout, bounds, force))
}

/// [`mutate_genes`] for genes whose polygons are already decoded
fn mutate_decoded<R: Rng>(
    rng: &mut R,
    genes: &[f32],
    polygons: &[Polygon],
    cfg: &Configuration,
    layout: &GeneLayout,
    bounds: Bounds,
    force: bool,
) -> Vec<f32> {
    profiling::scope!("mutate_genes");
    let centroids: Vec<Vertex> = polygons.iter().map(Polygon::centroid).collect();
    let rate = if force { 1.0 } else { cfg.mutation_rate };
    let range = bounds.vertex_range(cfg.vertex_movement);
    let color_offset = layout.color_offset();

    let mut out = Vec::with_capacity(genes.len() + layout.stride());
    'polygons: for (p, source) in genes.chunks_exact(layout.stride()).enumerate() {
        let mut current = source.to_vec();

        for v in 0..layout.nb_vertex {
            if rng.random::<f64>() >= rate {
                continue;
            }
            if cfg.enable_variable_polygons {
                let roll = rng.random::<f64>();
                if roll < cfg.add_polygon_rate {
                    let poly = layout.random_polygon(rng, bounds.width, bounds.height);
                    layout.encode_polygon_into(&poly, &mut out);
                    continue;
                }
                if roll < cfg.add_polygon_rate + cfg.remove_polygon_rate {
                    continue 'polygons;
                }
            }
            let (x, y) = (v * 2, v * 2 + 1);
            let moved = move_vertex(rng, Vertex::new(current[x], current[y]), range, bounds.width, bounds.height);
            current[x] = moved.x;
            current[y] = moved.y;
        }

        if rng.random::<f64>() < rate {
            let color = &mut current[color_offset..];
            let neighbour = (rng.random::<f64>() < cfg.copy_color_neighbor_rate)
                .then(|| nearest_polygon(&centroids, p))
                .flatten();
            match neighbour {
                Some(n) => color.copy_from_slice(polygons[n].color.channels()),
                None => drift_color(rng, color, cfg.color_modification_rate),
            }
        }

        out.extend_from_slice(&current);
    }

    if out.is_empty() {
        // every polygon removed (or nothing to start with): start over
        let intended = match polygons.len() {
            0 => cfg.nb_polygons,
            n => n,
        };
        log::debug!("mutation emptied a genome, regenerating {intended} polygons");
        out = layout.random_genes(rng, intended, bounds.width, bounds.height);
    }

    out
}

/// mutated copy of `individual` as a new, unevaluated individual; the parent
/// is never touched.
#[allow(clippy::too_many_arguments)]
pub fn mutate<R: Rng>(
    rng: &mut R,
    ids: &mut IdGenerator,
    individual: &Individual,
    cfg: &Configuration,
    layout: &GeneLayout,
    bounds: Bounds,
    force: bool,
    origin: Origin,
) -> Result<Individual, EngineError> {
    // reuse the polygons cached by the last evaluation
    let polygons = individual.phenotype(layout)?;
    if polygons.len() * layout.stride() != individual.genes.len() {
        return Err(EngineError::MisalignedGenome {
            len: individual.genes.len(),
            stride: layout.stride(),
        });
    }
    let genes = mutate_decoded(rng, &individual.genes, &polygons, cfg, layout, bounds, force);
    Ok(Individual::new(ids.next_id(), genes, origin))
}
