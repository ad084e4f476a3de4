// generation-step orchestrator.
// bootstrap (no previous population) -> steady -> steady ... one request at a time.

pub mod offspring;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use rayon::prelude::*;
use std::time::Instant;

use crate::dna::{generate_population, GeneLayout, IdGenerator, Individual, Origin};
use crate::error::EngineError;
use crate::fitness::Evaluator;
use crate::messages::{GenerationRequest, GenerationResponse, StepOutcome};
use crate::mutate::Bounds;
use crate::render::Surface;
use crate::selection::{assign_probabilities, sort_by_probability};

pub use offspring::{Breeder, Slot};

pub struct Engine {
    rng: Pcg32,
    ids: IdGenerator,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// engine seeded from the thread rng
    pub fn new() -> Self {
        Self {
            rng: Pcg32::from_rng(&mut rand::rng()),
            ids: IdGenerator::new(),
        }
    }

    /// reproducible engine: the same seed and requests give the same responses
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            ids: IdGenerator::new(),
        }
    }

    /// run one generation step.
    ///
    /// `Err` only for step-fatal problems (bad configuration, no enabled metric,
    /// malformed target). a missing render surface hands the previous state back
    /// with `StepOutcome::RenderSurfaceUnavailable`.
    pub fn step(&mut self, request: GenerationRequest) -> Result<GenerationResponse, EngineError> {
        profiling::scope!("Engine::step");
        request.configuration.validate()?;

        let (width, height) = (request.rendering_width, request.rendering_height);
        let mut surface = match Surface::new(width, height) {
            Ok(surface) => surface,
            Err(e) => {
                log::warn!("{e}, returning the previous state");
                return Ok(GenerationResponse::unchanged(&request, StepOutcome::RenderSurfaceUnavailable));
            }
        };
        let evaluator = Evaluator::new(&request.image, &request.configuration, width, height)?;

        for ind in request.population.iter().chain(request.best.as_ref()) {
            self.ids.observe(ind.id);
        }

        if request.population.is_empty() {
            self.bootstrap(request, &evaluator, &mut surface)
        } else {
            self.advance(request, &evaluator, &mut surface)
        }
    }

    /// first generation: a random population, evaluated and sorted
    fn bootstrap(
        &mut self,
        request: GenerationRequest,
        evaluator: &Evaluator,
        surface: &mut Surface,
    ) -> Result<GenerationResponse, EngineError> {
        profiling::scope!("bootstrap");
        let start = Instant::now();
        let cfg = &request.configuration;
        let layout = *evaluator.layout();
        let bounds = Bounds::new(request.rendering_width, request.rendering_height);

        let candidates = generate_population(
            &mut self.rng,
            &mut self.ids,
            &layout,
            cfg.population,
            cfg.nb_polygons,
            bounds.width,
            bounds.height,
        );
        let mut population = evaluate_all(evaluator, candidates, request.rendering_width, request.rendering_height);
        self.backfill(&mut population, cfg.population, evaluator, surface, &layout, bounds, cfg.nb_polygons)?;
        sort_by_fitness(&mut population);

        let best = population.first().cloned();
        keep_diff_on_best(&mut population, best.as_ref());

        let response = GenerationResponse {
            is_running: request.is_running,
            best,
            population,
            generation: 1,
            elapsed_time: start.elapsed().as_secs_f64(),
            not_improving_since: 0,
            outcome: StepOutcome::Advanced,
        };
        log_summary(&response);
        Ok(response)
    }

    /// steady state: breed a whole new population from the previous one
    fn advance(
        &mut self,
        request: GenerationRequest,
        evaluator: &Evaluator,
        surface: &mut Surface,
    ) -> Result<GenerationResponse, EngineError> {
        profiling::scope!("advance");
        let GenerationRequest {
            is_running,
            configuration: cfg,
            population: mut pool,
            best: incumbent,
            generation,
            not_improving_since,
            rendering_width,
            rendering_height,
            ..
        } = request;
        let layout = *evaluator.layout();
        let bounds = Bounds::new(rendering_width, rendering_height);

        // the incumbent stays selectable even when it is no longer in the population
        if let Some(best) = &incumbent {
            if pool.iter().all(|ind| ind.id != best.id) {
                pool.push(best.clone());
            }
        }
        let start = Instant::now();
        assign_probabilities(&mut pool);
        sort_by_probability(&mut pool);

        let (candidates, fresh_polygons) = {
            profiling::scope!("breed");
            let breeder = Breeder::new(&mut self.rng, &cfg, layout, bounds, &pool, incumbent.as_ref());
            let mut candidates = Vec::with_capacity(cfg.population);
            for _ in 0..cfg.population {
                let slot = Slot::draw(&mut self.rng, &cfg);
                match breeder.breed(&mut self.rng, &mut self.ids, slot) {
                    Ok(child) => candidates.push(child),
                    Err(e) => log::warn!("dropping {slot:?} offspring: {e}"),
                }
            }
            (candidates, breeder.fresh_polygons())
        };

        let mut population = evaluate_all(evaluator, candidates, rendering_width, rendering_height);
        self.backfill(&mut population, cfg.population, evaluator, surface, &layout, bounds, fresh_polygons)?;
        sort_by_fitness(&mut population);

        let (best, not_improving_since) = match (incumbent, population.first()) {
            (Some(incumbent), Some(top)) if incumbent.fitness >= top.fitness => (Some(incumbent), not_improving_since + 1),
            (_, Some(top)) => (Some(top.clone()), 0),
            (incumbent, None) => (incumbent, not_improving_since + 1),
        };
        keep_diff_on_best(&mut population, best.as_ref());

        let response = GenerationResponse {
            is_running,
            best,
            population,
            generation: generation + 1,
            elapsed_time: start.elapsed().as_secs_f64(),
            not_improving_since,
            outcome: StepOutcome::Advanced,
        };
        log_summary(&response);
        Ok(response)
    }

    /// top the population up to `size` with random, evaluated individuals
    #[allow(clippy::too_many_arguments)]
    fn backfill(
        &mut self,
        population: &mut Vec<Individual>,
        size: usize,
        evaluator: &Evaluator,
        surface: &mut Surface,
        layout: &GeneLayout,
        bounds: Bounds,
        nb_polygons: usize,
    ) -> Result<(), EngineError> {
        let missing = size.saturating_sub(population.len());
        if missing == 0 {
            return Ok(());
        }
        profiling::scope!("backfill");
        log::warn!("backfilling {missing} individuals");
        for _ in 0..missing {
            let genes = layout.random_genes(&mut self.rng, nb_polygons, bounds.width, bounds.height);
            let mut ind = Individual::new(self.ids.next_id(), genes, Origin::Backfill);
            let eval = evaluator.evaluate(&ind.genes, surface)?;
            ind.record(eval);
            population.push(ind);
        }
        Ok(())
    }
}

/// evaluate in parallel, each rayon worker rendering on its own surface.
/// individuals that fail are logged and left out.
fn evaluate_all(evaluator: &Evaluator, candidates: Vec<Individual>, width: u32, height: u32) -> Vec<Individual> {
    profiling::scope!("evaluate_all");
    candidates
        .into_par_iter()
        .map_init(
            || Surface::new(width, height),
            |surface, mut ind| -> Result<Individual, EngineError> {
                let surface = surface.as_mut().map_err(|e| e.clone())?;
                let eval = evaluator.evaluate(&ind.genes, surface)?;
                ind.record(eval);
                Ok(ind)
            },
        )
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|result| match result {
            Ok(ind) => Some(ind),
            Err(e) => {
                log::warn!("dropping individual: {e}");
                None
            }
        })
        .collect()
}

/// descending fitness
fn sort_by_fitness(population: &mut [Individual]) {
    population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
}

/// diff images are only worth shipping for the best individual
fn keep_diff_on_best(population: &mut [Individual], best: Option<&Individual>) {
    let best_id = best.map(|b| b.id);
    for ind in population.iter_mut().filter(|ind| Some(ind.id) != best_id) {
        ind.diff = None;
    }
}

fn log_summary(response: &GenerationResponse) {
    log::debug!(
        "generation {}: best {:.5}, {} individuals, not improving since {}, {:.3}s",
        response.generation,
        response.best.as_ref().map_or(0.0, |b| b.fitness),
        response.population.len(),
        response.not_improving_since,
        response.elapsed_time
    );
}
