// genotypes of the next generation, one per population slot.
//
// everything here runs sequentially on the engine's rng; evaluation happens
// afterwards, so a seeded run does not depend on rayon's scheduling.

use rand::Rng;

use crate::crossover::combine_genes;
use crate::dna::{GeneLayout, IdGenerator, Individual, Origin};
use crate::error::EngineError;
use crate::mutate::{mutate, mutate_genes, Bounds};
use crate::selection::{pick_from_tournament, pick_parent, tournament_pool};
use crate::settings::{Configuration, ParentSelection};

/// which path fills a population slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// mutated roulette survivor
    Keep,
    /// brand-new random individual
    Fresh,
    /// crossover of two parents, then mutation
    Crossover,
}

impl Slot {
    /// one uniform draw: `[0, keep)` keeps, `[keep, keep + new)` is fresh, the rest crosses over
    pub fn draw<R: Rng>(rng: &mut R, cfg: &Configuration) -> Self {
        let roll = rng.random::<f64>();
        if roll < cfg.keep_previous_ratio {
            Slot::Keep
        } else if roll < cfg.keep_previous_ratio + cfg.new_individual_ratio {
            Slot::Fresh
        } else {
            Slot::Crossover
        }
    }
}

/// produces unevaluated offspring from a selection pool
pub struct Breeder<'a> {
    cfg: &'a Configuration,
    layout: GeneLayout,
    bounds: Bounds,
    /// previous population (plus the incumbent), sorted by cumulative probability
    pool: &'a [Individual],
    /// roulette-filled pool, empty for the fortune wheel strategy
    tournament: Vec<&'a Individual>,
    /// polygon count of fresh individuals
    fresh_polygons: usize,
}

impl<'a> Breeder<'a> {
    /// `pool` must be non-empty and sorted with [`crate::selection::sort_by_probability`]
    pub fn new<R: Rng>(
        rng: &mut R,
        cfg: &'a Configuration,
        layout: GeneLayout,
        bounds: Bounds,
        pool: &'a [Individual],
        best: Option<&Individual>,
    ) -> Self {
        let tournament = match cfg.parent_selection_strategy {
            ParentSelection::Tournament => tournament_pool(rng, pool, cfg.select_cutoff),
            ParentSelection::FortuneWheel => Vec::new(),
        };
        let fresh_polygons = best
            .and_then(|b| layout.polygon_count(b.genes.len()).ok())
            .filter(|&n| n > 0)
            .unwrap_or(cfg.nb_polygons);

        Self {
            cfg,
            layout,
            bounds,
            pool,
            tournament,
            fresh_polygons,
        }
    }

    pub fn fresh_polygons(&self) -> usize {
        self.fresh_polygons
    }

    fn parent<R: Rng>(&self, rng: &mut R) -> &'a Individual {
        match self.cfg.parent_selection_strategy {
            ParentSelection::Tournament => pick_from_tournament(rng, &self.tournament, self.cfg.tournament_size),
            ParentSelection::FortuneWheel => pick_parent(rng, self.pool),
        }
    }

    /// random genes with the inherited polygon count
    pub fn fresh_genes<R: Rng>(&self, rng: &mut R) -> Vec<f32> {
        self.layout
            .random_genes(rng, self.fresh_polygons, self.bounds.width, self.bounds.height)
    }

    /// the unevaluated individual for one slot.
    /// fails only when a parent's genome is misaligned.
    pub fn breed<R: Rng>(&self, rng: &mut R, ids: &mut IdGenerator, slot: Slot) -> Result<Individual, EngineError> {
        match slot {
            Slot::Keep => {
                let survivor = pick_parent(rng, self.pool);
                mutate(rng, ids, survivor, self.cfg, &self.layout, self.bounds, false, Origin::Survivor)
            }
            Slot::Fresh => Ok(Individual::new(ids.next_id(), self.fresh_genes(rng), Origin::Fresh)),
            Slot::Crossover => {
                let a = self.parent(rng);
                let b = self.parent(rng);
                let child = combine_genes(
                    rng,
                    a,
                    b,
                    self.cfg.crossover_strategy,
                    self.cfg.crossover_parent_ratio,
                    &self.layout,
                );
                let genes = mutate_genes(rng, &child, self.cfg, &self.layout, self.bounds, false)?;
                Ok(Individual::new(ids.next_id(), genes, Origin::Offspring))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{assign_probabilities, sort_by_probability};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn pool(rng: &mut Pcg32, ids: &mut IdGenerator, layout: &GeneLayout, n: usize) -> Vec<Individual> {
        let mut pop: Vec<Individual> = (0..n)
            .map(|i| {
                let mut ind = Individual::new(ids.next_id(), layout.random_genes(rng, 4, 16.0, 16.0), Origin::Bootstrap);
                ind.fitness = (i + 1) as f64 / n as f64;
                ind
            })
            .collect();
        assign_probabilities(&mut pop);
        sort_by_probability(&mut pop);
        pop
    }

    #[test]
    fn test_slot_draw_boundaries() {
        let mut rng = Pcg32::seed_from_u64(30);
        let all_keep = Configuration { keep_previous_ratio: 1.0, ..Configuration::default() };
        let all_new = Configuration {
            keep_previous_ratio: 0.0,
            new_individual_ratio: 1.0,
            ..Configuration::default()
        };
        let all_cross = Configuration {
            keep_previous_ratio: 0.0,
            new_individual_ratio: 0.0,
            ..Configuration::default()
        };
        for _ in 0..100 {
            assert_eq!(Slot::draw(&mut rng, &all_keep), Slot::Keep);
            assert_eq!(Slot::draw(&mut rng, &all_new), Slot::Fresh);
            assert_eq!(Slot::draw(&mut rng, &all_cross), Slot::Crossover);
        }
    }

    #[test]
    fn test_breed_every_slot_for_both_strategies() {
        let mut rng = Pcg32::seed_from_u64(31);
        let mut ids = IdGenerator::new();
        let layout = GeneLayout::new(3, true);
        let pop = pool(&mut rng, &mut ids, &layout, 8);
        for strategy in [ParentSelection::Tournament, ParentSelection::FortuneWheel] {
            let cfg = Configuration { parent_selection_strategy: strategy, ..Configuration::default() };
            let breeder = Breeder::new(&mut rng, &cfg, layout, Bounds::new(16, 16), &pop, pop.last());
            assert_eq!(breeder.fresh_polygons(), 4);
            for (slot, origin) in [
                (Slot::Keep, Origin::Survivor),
                (Slot::Fresh, Origin::Fresh),
                (Slot::Crossover, Origin::Offspring),
            ] {
                let child = breeder.breed(&mut rng, &mut ids, slot).unwrap();
                assert_eq!(child.origin, origin);
                assert_eq!(child.genes.len(), 4 * layout.stride());
                assert_eq!(child.fitness, 0.0);
                assert!(pop.iter().all(|p| p.id != child.id));
            }
        }
    }

    #[test]
    fn test_fresh_polygons_fall_back_to_configuration() {
        let mut rng = Pcg32::seed_from_u64(32);
        let mut ids = IdGenerator::new();
        let layout = GeneLayout::new(3, true);
        let pop = pool(&mut rng, &mut ids, &layout, 3);
        let cfg = Configuration { nb_polygons: 9, ..Configuration::default() };
        let empty = Individual::new(99, Vec::new(), Origin::Bootstrap);
        let breeder = Breeder::new(&mut rng, &cfg, layout, Bounds::new(16, 16), &pop, Some(&empty));
        assert_eq!(breeder.fresh_polygons(), 9);
        let breeder = Breeder::new(&mut rng, &cfg, layout, Bounds::new(16, 16), &pop, None);
        assert_eq!(breeder.fresh_genes(&mut rng).len(), 9 * layout.stride());
    }

    #[test]
    fn test_misaligned_parent_fails_keep_slot() {
        let mut rng = Pcg32::seed_from_u64(33);
        let mut ids = IdGenerator::new();
        let layout = GeneLayout::new(3, false);
        let mut bad = vec![Individual::new(1, vec![0.5; 7], Origin::Bootstrap)];
        bad[0].fitness = 0.5;
        assign_probabilities(&mut bad);
        let cfg = Configuration { enable_transparency: false, ..Configuration::default() };
        let breeder = Breeder::new(&mut rng, &cfg, layout, Bounds::new(8, 8), &bad, None);
        assert!(matches!(
            breeder.breed(&mut rng, &mut ids, Slot::Keep),
            Err(EngineError::MisalignedGenome { len: 7, stride: 9 })
        ));
    }
}
