// genotype <-> phenotype codec.
//
// a genome is a flat `Vec<f32>`: each polygon occupies `stride` consecutive
// slots, first the interleaved (x, y) pairs of its vertices, then its color
// channels. every piece of stride arithmetic in the crate lives on `GeneLayout`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::fitness::{Evaluation, MetricScores};
use crate::geom::{Color, Polygon, Vertex, ALPHA_MAX, ALPHA_MIN};
use crate::settings::Configuration;

/// shape of one polygon inside the flat gene array
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneLayout {
    pub nb_vertex: usize,
    pub nb_color: usize,
}

/// what a gene position encodes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneRole {
    /// leading (x) coordinate of vertex `vertex`
    VertexStart { vertex: usize },
    /// trailing (y) coordinate of a vertex
    VertexTail,
    /// first color channel of the polygon
    ColorStart,
    /// any later color channel
    ColorTail,
}

impl GeneLayout {
    pub fn new(nb_vertex: usize, transparency: bool) -> Self {
        Self {
            nb_vertex,
            nb_color: if transparency { 4 } else { 3 },
        }
    }

    /// layout of the genomes a run with `cfg` evolves
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            nb_vertex: cfg.nb_vertex,
            nb_color: cfg.nb_color(),
        }
    }

    /// genes per polygon
    #[inline]
    pub fn stride(&self) -> usize {
        self.nb_vertex * 2 + self.nb_color
    }

    /// offset of the first color channel inside a polygon
    #[inline]
    pub fn color_offset(&self) -> usize {
        self.nb_vertex * 2
    }

    /// number of whole polygons in a gene array, or `MisalignedGenome`
    pub fn polygon_count(&self, len: usize) -> Result<usize, EngineError> {
        let stride = self.stride();
        if stride == 0 || len % stride != 0 {
            return Err(EngineError::MisalignedGenome { len, stride });
        }
        Ok(len / stride)
    }

    #[inline]
    pub fn is_aligned(&self, len: usize) -> bool {
        self.polygon_count(len).is_ok()
    }

    /// gene range of polygon `index`
    #[inline]
    pub fn polygon_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.stride();
        start..start + self.stride()
    }

    /// role of the gene at `pos` (relative to the whole genome)
    pub fn role(&self, pos: usize) -> GeneRole {
        let offset = pos % self.stride();
        if offset < self.color_offset() {
            if offset % 2 == 0 {
                GeneRole::VertexStart { vertex: offset / 2 }
            } else {
                GeneRole::VertexTail
            }
        } else if offset == self.color_offset() {
            GeneRole::ColorStart
        } else {
            GeneRole::ColorTail
        }
    }

    /// decode one polygon from exactly `stride` genes
    pub fn decode_polygon(&self, genes: &[f32]) -> Polygon {
        let (shape, color) = genes.split_at(self.color_offset());
        Polygon {
            vertices: shape.chunks_exact(2).map(|p| Vertex::new(p[0], p[1])).collect(),
            color: Color::from_channels_or_black(color),
        }
    }

    /// genotype -> phenotype. misaligned genomes are rejected, never truncated.
    pub fn decode(&self, genes: &[f32]) -> Result<Vec<Polygon>, EngineError> {
        profiling::scope!("decode_phenotype");
        self.polygon_count(genes.len())?;
        Ok(genes.chunks_exact(self.stride()).map(|g| self.decode_polygon(g)).collect())
    }

    /// phenotype -> genotype
    pub fn encode(&self, polygons: &[Polygon]) -> Vec<f32> {
        let mut genes = Vec::with_capacity(polygons.len() * self.stride());
        for poly in polygons {
            self.encode_polygon_into(poly, &mut genes);
        }
        genes
    }

    pub fn encode_polygon_into(&self, poly: &Polygon, out: &mut Vec<f32>) {
        for v in &poly.vertices {
            out.push(v.x);
            out.push(v.y);
        }
        out.extend_from_slice(poly.color.channels());
    }

    /// a random polygon: pick an anchor inside the image, then scatter each vertex
    /// around it by up to half the image size on each axis, clamped to bounds.
    pub fn random_polygon<R: Rng>(&self, rng: &mut R, width: f32, height: f32) -> Polygon {
        let anchor = Vertex::new(rng.random::<f32>() * width, rng.random::<f32>() * height);
        let vertices = (0..self.nb_vertex)
            .map(|_| {
                let dx = (rng.random::<f32>() - 0.5) * width;
                let dy = (rng.random::<f32>() - 0.5) * height;
                Vertex::new(anchor.x + dx, anchor.y + dy).clamped(width, height)
            })
            .collect();

        let mut channel = || rng.random_range(0..=255u8) as f32;
        let rgb = [channel(), channel(), channel()];
        let color = if self.nb_color == 4 {
            Color::Alpha([rgb[0], rgb[1], rgb[2], rng.random_range(ALPHA_MIN..=ALPHA_MAX)])
        } else {
            Color::Opaque(rgb)
        };

        Polygon { vertices, color }
    }

    /// genes of `nb_polygons` random polygons, concatenated
    pub fn random_genes<R: Rng>(&self, rng: &mut R, nb_polygons: usize, width: f32, height: f32) -> Vec<f32> {
        profiling::scope!("random_genes");
        let mut genes = Vec::with_capacity(nb_polygons * self.stride());
        for _ in 0..nb_polygons {
            let poly = self.random_polygon(rng, width, height);
            self.encode_polygon_into(&poly, &mut genes);
        }
        genes
    }
}

/// how an individual came to exist
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// random individual of the initial population
    #[default]
    Bootstrap,
    /// mutated copy of a roulette-picked survivor
    Survivor,
    /// wholly new random individual
    Fresh,
    /// crossover child, then mutated
    Offspring,
    /// random replacement for an individual that failed evaluation
    Backfill,
}

/// one candidate rendering: the genotype plus everything the evaluator derives
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Individual {
    pub id: u64,
    pub genes: Vec<f32>,
    /// higher is better, in [0, 1]; 0 until evaluated
    pub fitness: f64,
    #[serde(default)]
    pub scores: MetricScores,
    /// cumulative roulette probability, only meaningful during selection
    #[serde(default)]
    pub probability: f64,
    #[serde(default)]
    pub origin: Origin,
    /// pixel-match diff rendering (RGBA8), only kept on the best individual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Vec<u8>>,
    /// polygons decoded on the last evaluation
    #[serde(skip)]
    pub phenotype: Option<Vec<Polygon>>,
}

impl Individual {
    pub fn new(id: u64, genes: Vec<f32>, origin: Origin) -> Self {
        Self {
            id,
            genes,
            origin,
            ..Self::default()
        }
    }

    /// take over the outcome of an evaluation
    pub fn record(&mut self, eval: Evaluation) {
        self.fitness = eval.fitness;
        self.scores = eval.scores;
        self.diff = eval.diff;
        self.phenotype = Some(eval.phenotype);
    }

    /// decoded polygons, from the cache when the last evaluation left one
    pub fn phenotype(&self, layout: &GeneLayout) -> Result<Vec<Polygon>, EngineError> {
        match &self.phenotype {
            Some(polys) => Ok(polys.clone()),
            None => layout.decode(&self.genes),
        }
    }
}

/// hands out unique, monotonically increasing individual ids.
/// ids that arrive from outside are `observe`d so new ones never collide.
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    #[inline]
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn observe(&mut self, id: u64) {
        if id >= self.next {
            self.next = id + 1;
        }
    }
}

/// `size` independent random individuals, each with a fresh id
pub fn generate_population<R: Rng>(
    rng: &mut R,
    ids: &mut IdGenerator,
    layout: &GeneLayout,
    size: usize,
    nb_polygons: usize,
    width: f32,
    height: f32,
) -> Vec<Individual> {
    profiling::scope!("generate_population");
    (0..size)
        .map(|_| {
            let genes = layout.random_genes(rng, nb_polygons, width, height);
            Individual::new(ids.next_id(), genes, Origin::Bootstrap)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_stride_and_roles() {
        let layout = GeneLayout::new(3, true);
        assert_eq!(layout.stride(), 10);
        assert_eq!(layout.role(0), GeneRole::VertexStart { vertex: 0 });
        assert_eq!(layout.role(1), GeneRole::VertexTail);
        assert_eq!(layout.role(4), GeneRole::VertexStart { vertex: 2 });
        assert_eq!(layout.role(6), GeneRole::ColorStart);
        assert_eq!(layout.role(9), GeneRole::ColorTail);
        assert_eq!(layout.role(12), GeneRole::VertexStart { vertex: 1 });
        assert_eq!(layout.polygon_range(2), 20..30);
    }

    #[test]
    fn test_layout_from_config() {
        let cfg = Configuration { nb_vertex: 5, enable_transparency: false, ..Configuration::default() };
        assert_eq!(GeneLayout::from_config(&cfg), GeneLayout::new(5, false));
        assert_eq!(GeneLayout::from_config(&cfg).stride(), 13);
        let cfg = Configuration { enable_transparency: true, ..cfg };
        assert_eq!(GeneLayout::from_config(&cfg).nb_color, 4);
    }

    #[test]
    fn test_decode_encode_roundtrip() {
        let mut rng = Pcg32::seed_from_u64(1);
        for transparency in [false, true] {
            for nb_vertex in 3..6 {
                let layout = GeneLayout::new(nb_vertex, transparency);
                let genes: Vec<f32> = (0..layout.stride() * 7).map(|_| rng.random::<f32>() * 200.0).collect();
                let polys = layout.decode(&genes).unwrap();
                assert_eq!(polys.len(), 7);
                assert!(polys.iter().all(|p| p.vertices.len() == nb_vertex));
                assert_eq!(layout.encode(&polys), genes);
            }
        }
    }

    #[test]
    fn test_decode_rejects_misaligned() {
        let layout = GeneLayout::new(3, false);
        assert_eq!(
            layout.decode(&[0.0; 10]),
            Err(EngineError::MisalignedGenome { len: 10, stride: 9 })
        );
        assert_eq!(layout.decode(&[]).unwrap().len(), 0);
    }

    #[test]
    fn test_random_polygon_ranges() {
        let mut rng = Pcg32::seed_from_u64(2);
        let layout = GeneLayout::new(4, true);
        for _ in 0..500 {
            let poly = layout.random_polygon(&mut rng, 64.0, 32.0);
            assert_eq!(poly.vertices.len(), 4);
            for v in &poly.vertices {
                assert!((0.0..=64.0).contains(&v.x) && (0.0..=32.0).contains(&v.y));
            }
            let c = poly.color.channels();
            assert_eq!(c.len(), 4);
            for &ch in &c[..3] {
                assert!((0.0..=255.0).contains(&ch));
                assert_eq!(ch, ch.round());
            }
            assert!((ALPHA_MIN..=ALPHA_MAX).contains(&c[3]));
        }
    }

    #[test]
    fn test_population_ids_are_unique() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut ids = IdGenerator::new();
        let layout = GeneLayout::new(3, false);
        let pop = generate_population(&mut rng, &mut ids, &layout, 20, 5, 16.0, 16.0);
        assert_eq!(pop.len(), 20);
        let mut seen: Vec<u64> = pop.iter().map(|i| i.id).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 20);
        assert!(pop.iter().all(|i| i.genes.len() == 5 * layout.stride()));
    }

    #[test]
    fn test_id_generator_observe() {
        let mut ids = IdGenerator::new();
        ids.observe(41);
        assert_eq!(ids.next_id(), 42);
        ids.observe(3);
        assert_eq!(ids.next_id(), 43);
    }
}
