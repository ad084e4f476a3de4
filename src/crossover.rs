// crossover: build one child genotype from two parents.
//
// every strategy yields exactly max(len(a), len(b)) genes and stays aligned on
// polygon strides, so unequal parent lengths (variable polygon count) are safe.

use rand::Rng;

use crate::dna::{GeneLayout, Individual};
use crate::settings::CrossoverStrategy;

/// the two parents ordered by fitness (ties keep `a` first)
struct Parents<'a> {
    a: &'a [f32],
    fitter: &'a [f32],
    weaker: &'a [f32],
    ratio: f64,
}

impl<'a> Parents<'a> {
    fn new(a: &'a Individual, b: &'a Individual, ratio: f64) -> Self {
        let (fitter, weaker) = if b.fitness > a.fitness { (b, a) } else { (a, b) };
        Self {
            a: &a.genes,
            fitter: &fitter.genes,
            weaker: &weaker.genes,
            ratio,
        }
    }

    /// biased coin: fitter parent with probability `ratio`, returned with the other one
    #[inline]
    fn flip<R: Rng>(&self, rng: &mut R) -> (&'a [f32], &'a [f32]) {
        if rng.random::<f64>() < self.ratio {
            (self.fitter, self.weaker)
        } else {
            (self.weaker, self.fitter)
        }
    }

    /// genes `range` from the chosen parent, else the other one, else parent A
    fn copy_range<R: Rng>(&self, rng: &mut R, range: std::ops::Range<usize>, child: &mut Vec<f32>) {
        let (chosen, other) = self.flip(rng);
        let source = [chosen, other, self.a]
            .into_iter()
            .find(|g| g.len() >= range.end)
            .unwrap_or(self.a);
        if let Some(genes) = source.get(range) {
            child.extend_from_slice(genes);
        }
    }
}

/// child genotype from `a` and `b`
pub fn combine_genes<R: Rng>(
    rng: &mut R,
    a: &Individual,
    b: &Individual,
    strategy: CrossoverStrategy,
    parent_ratio: f64,
    layout: &GeneLayout,
) -> Vec<f32> {
    profiling::scope!("crossover");
    let parents = Parents::new(a, b, parent_ratio);
    let len = a.genes.len().max(b.genes.len());
    let stride = layout.stride();
    let polygons = len / stride;
    let mut child = Vec::with_capacity(len);

    match strategy {
        CrossoverStrategy::Polygon => {
            for p in 0..polygons {
                parents.copy_range(rng, layout.polygon_range(p), &mut child);
            }
        }
        CrossoverStrategy::Vertex => {
            for p in 0..polygons {
                let start = layout.polygon_range(p).start;
                for v in 0..layout.nb_vertex {
                    let pair = start + v * 2;
                    // availability is decided per polygon, so shorter parents fall back whole
                    let (chosen, other) = parents.flip(rng);
                    let source = if chosen.len() >= start + stride { chosen } else { other };
                    child.extend_from_slice(&source[pair..pair + 2]);
                }
                let color = start + layout.color_offset()..start + stride;
                parents.copy_range(rng, color, &mut child);
            }
        }
        CrossoverStrategy::Data => {
            for k in 0..len {
                let (chosen, other) = parents.flip(rng);
                let gene = chosen.get(k).or_else(|| other.get(k)).copied().unwrap_or_default();
                child.push(gene);
            }
        }
        CrossoverStrategy::SinglePoint => {
            let primary = parents.fitter;
            let secondary = parents.weaker;
            let split = (primary.len() as f64 * parent_ratio).round() as usize;
            let split = (split / stride * stride).min(primary.len());

            child.extend_from_slice(&primary[..split]);
            if secondary.len() > split {
                child.extend_from_slice(&secondary[split..]);
            }
            // reconcile unequal lengths from the primary parent's tail
            if child.len() < len && primary.len() > child.len() {
                let from = child.len();
                child.extend_from_slice(&primary[from..]);
            }
            child.truncate(len);
        }
    }

    debug_assert_eq!(child.len(), len);
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::Origin;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const STRATEGIES: [CrossoverStrategy; 4] = [
        CrossoverStrategy::Polygon,
        CrossoverStrategy::Vertex,
        CrossoverStrategy::Data,
        CrossoverStrategy::SinglePoint,
    ];

    fn parent(id: u64, polygons: usize, value: f32, fitness: f64, layout: &GeneLayout) -> Individual {
        let mut ind = Individual::new(id, vec![value; polygons * layout.stride()], Origin::Bootstrap);
        ind.fitness = fitness;
        ind
    }

    #[test]
    fn test_child_length_is_max_and_aligned() {
        let mut rng = Pcg32::seed_from_u64(3);
        let layout = GeneLayout::new(3, true);
        for strategy in STRATEGIES {
            for (na, nb) in [(5, 5), (2, 7), (7, 2), (0, 3), (4, 0)] {
                for ratio in [0.0, 0.3, 0.6, 1.0] {
                    let a = parent(1, na, 1.0, 0.4, &layout);
                    let b = parent(2, nb, 2.0, 0.8, &layout);
                    let child = combine_genes(&mut rng, &a, &b, strategy, ratio, &layout);
                    assert_eq!(child.len(), na.max(nb) * layout.stride(), "{strategy:?} {na} {nb}");
                    assert!(layout.is_aligned(child.len()));
                }
            }
        }
    }

    #[test]
    fn test_ratio_one_copies_fitter_parent() {
        let mut rng = Pcg32::seed_from_u64(4);
        let layout = GeneLayout::new(3, false);
        let a = parent(1, 4, 1.0, 0.2, &layout);
        let b = parent(2, 4, 2.0, 0.9, &layout);
        for strategy in [CrossoverStrategy::Polygon, CrossoverStrategy::Vertex, CrossoverStrategy::Data] {
            let child = combine_genes(&mut rng, &a, &b, strategy, 1.0, &layout);
            assert!(child.iter().all(|&g| g == 2.0), "{strategy:?}");
        }
    }

    #[test]
    fn test_polygon_crossover_keeps_whole_polygons() {
        let mut rng = Pcg32::seed_from_u64(5);
        let layout = GeneLayout::new(3, true);
        let a = parent(1, 10, 1.0, 0.5, &layout);
        let b = parent(2, 10, 2.0, 0.5, &layout);
        let child = combine_genes(&mut rng, &a, &b, CrossoverStrategy::Polygon, 0.5, &layout);
        for poly in child.chunks_exact(layout.stride()) {
            assert!(poly.iter().all(|&g| g == poly[0]));
        }
    }

    #[test]
    fn test_single_point_split() {
        let mut rng = Pcg32::seed_from_u64(6);
        let layout = GeneLayout::new(3, false);
        let stride = layout.stride();
        let fitter = parent(1, 10, 1.0, 0.9, &layout);
        let weaker = parent(2, 10, 2.0, 0.1, &layout);
        let child = combine_genes(&mut rng, &weaker, &fitter, CrossoverStrategy::SinglePoint, 0.6, &layout);
        // split at round(90 * 0.6) = 54 = 6 polygons exactly
        assert!(child[..6 * stride].iter().all(|&g| g == 1.0));
        assert!(child[6 * stride..].iter().all(|&g| g == 2.0));

        // split snaps down to a stride boundary: round(90 * 0.55) = 50 -> 45
        let child = combine_genes(&mut rng, &fitter, &weaker, CrossoverStrategy::SinglePoint, 0.55, &layout);
        assert!(child[..5 * stride].iter().all(|&g| g == 1.0));
        assert!(child[5 * stride..].iter().all(|&g| g == 2.0));
    }

    #[test]
    fn test_single_point_pads_from_primary() {
        let mut rng = Pcg32::seed_from_u64(7);
        let layout = GeneLayout::new(3, false);
        let stride = layout.stride();
        let fitter = parent(1, 8, 1.0, 0.9, &layout);
        let weaker = parent(2, 2, 2.0, 0.1, &layout);
        let child = combine_genes(&mut rng, &fitter, &weaker, CrossoverStrategy::SinglePoint, 0.5, &layout);
        assert_eq!(child.len(), 8 * stride);
        // split at 4 polygons, weaker has nothing past it, tail comes from the fitter parent
        assert!(child.iter().all(|&g| g == 1.0));
    }
}
