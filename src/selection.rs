// parent selection: fitness-proportional roulette and tournaments.

use rand::Rng;

use crate::dna::Individual;

/// give every individual a *cumulative* probability proportional to fitness².
///
/// probabilities are non-decreasing in population order and the last one is
/// forced to exactly 1.0. a population with zero total fitness gets a uniform
/// wheel.
pub fn assign_probabilities(population: &mut [Individual]) {
    profiling::scope!("assign_probabilities");
    let Some(last) = population.len().checked_sub(1) else {
        return;
    };

    let total: f64 = population.iter().map(|i| i.fitness * i.fitness).sum();
    let n = population.len() as f64;
    let mut running = 0.0;
    for (idx, ind) in population.iter_mut().enumerate() {
        running += if total > 0.0 {
            ind.fitness * ind.fitness / total
        } else {
            1.0 / n
        };
        ind.probability = running;
        if idx == last {
            ind.probability = 1.0;
        }
    }
}

/// ascending by cumulative probability, the order `pick_parent` scans in
pub fn sort_by_probability(population: &mut [Individual]) {
    population.sort_by(|a, b| a.probability.total_cmp(&b.probability));
}

/// roulette draw: the first individual whose cumulative probability exceeds a
/// uniform draw in [0, 1), or the last one when rounding left none.
/// `population` must be non-empty and sorted by [`sort_by_probability`].
pub fn pick_parent<'a, R: Rng>(rng: &mut R, population: &'a [Individual]) -> &'a Individual {
    let draw = rng.random::<f64>();
    population
        .iter()
        .find(|ind| ind.probability > draw)
        .unwrap_or(&population[population.len() - 1])
}

/// tournament pool of `round(len × cutoff)` (at least one) roulette draws
pub fn tournament_pool<'a, R: Rng>(rng: &mut R, population: &'a [Individual], cutoff: f64) -> Vec<&'a Individual> {
    profiling::scope!("tournament_pool");
    let size = ((population.len() as f64 * cutoff).round() as usize).max(1);
    (0..size).map(|_| pick_parent(rng, population)).collect()
}

/// best of `size` uniform draws (with replacement) from the pool.
/// `pool` must be non-empty.
pub fn pick_from_tournament<'a, R: Rng>(rng: &mut R, pool: &[&'a Individual], size: usize) -> &'a Individual {
    let mut best = pool[rng.random_range(0..pool.len())];
    for _ in 1..size.max(1) {
        let challenger = pool[rng.random_range(0..pool.len())];
        if challenger.fitness > best.fitness {
            best = challenger;
        }
    }
    best
}
