/// evolution settings for polyevo.
/// these arrive with every generation request and can change between requests.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;
use crate::fitness::MetricWeights;

/// how parents are drawn from the previous population
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParentSelection {
    /// roulette-filled pool, then best of `tournamentSize` random pool members
    Tournament,
    /// direct roulette pick from the whole population
    FortuneWheel,
}

impl From<String> for ParentSelection {
    fn from(s: String) -> Self {
        match s.as_str() {
            "tournament" => ParentSelection::Tournament,
            // anything else falls through to the roulette wheel
            _ => ParentSelection::FortuneWheel,
        }
    }
}

impl From<ParentSelection> for String {
    fn from(s: ParentSelection) -> Self {
        match s {
            ParentSelection::Tournament => "tournament",
            ParentSelection::FortuneWheel => "fortunewheel",
        }
        .to_owned()
    }
}

/// granularity at which crossover mixes the two parents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CrossoverStrategy {
    /// whole polygons
    Polygon,
    /// vertex pairs and color groups
    Vertex,
    /// individual gene values
    Data,
    /// one split point, fitter parent first
    SinglePoint,
}

impl From<String> for CrossoverStrategy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "polygon" => CrossoverStrategy::Polygon,
            "vertex" => CrossoverStrategy::Vertex,
            "data" => CrossoverStrategy::Data,
            // unrecognised strategies use the single split point
            _ => CrossoverStrategy::SinglePoint,
        }
    }
}

impl From<CrossoverStrategy> for String {
    fn from(s: CrossoverStrategy) -> Self {
        match s {
            CrossoverStrategy::Polygon => "polygon",
            CrossoverStrategy::Vertex => "vertex",
            CrossoverStrategy::Data => "data",
            CrossoverStrategy::SinglePoint => "singlePoint",
        }
        .to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    // population shape
    pub population: usize,
    pub parent_selection_strategy: ParentSelection,
    /// tournament pool size as a share of the population
    pub select_cutoff: f64,
    pub tournament_size: usize,
    /// share of slots filled by mutated survivors
    pub keep_previous_ratio: f64,
    /// share of slots filled by brand-new random individuals
    pub new_individual_ratio: f64,

    // crossover
    pub crossover_strategy: CrossoverStrategy,
    /// probability of taking genes from the fitter parent
    pub crossover_parent_ratio: f64,

    // mutation
    pub mutation_rate: f64,
    /// vertex displacement as a share of the larger image side
    pub vertex_movement: f64,
    pub color_modification_rate: f64,
    pub copy_color_neighbor_rate: f64,
    /// only used with `enable_variable_polygons`
    pub add_polygon_rate: f64,
    pub remove_polygon_rate: f64,

    // fitness metrics
    pub enable_ssim: bool,
    pub enable_pixel_diff: bool,
    pub enable_sub_diff: bool,
    pub ratio_ssim: f64,
    pub ratio_pixel_diff: f64,
    pub ratio_sub_diff: f64,
    /// lets the polygon count vary and scores fewer polygons higher
    pub enable_variable_polygons: bool,
    pub ratio_polygons: f64,

    // phenotype shape
    pub enable_transparency: bool,
    pub nb_vertex: usize,
    pub nb_polygons: usize,
    /// longest side of the rendering, in pixels
    pub resolution: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            population: 50,
            parent_selection_strategy: ParentSelection::Tournament,
            select_cutoff: 0.2,
            tournament_size: 3,
            keep_previous_ratio: 0.01,
            new_individual_ratio: 0.01,

            crossover_strategy: CrossoverStrategy::Polygon,
            crossover_parent_ratio: 0.6,

            mutation_rate: 0.01,
            vertex_movement: 0.15,
            color_modification_rate: 0.1,
            copy_color_neighbor_rate: 0.01,
            add_polygon_rate: 0.01,
            remove_polygon_rate: 0.01,

            enable_ssim: true,
            enable_pixel_diff: false,
            enable_sub_diff: false,
            ratio_ssim: 1.0,
            ratio_pixel_diff: 1.0,
            ratio_sub_diff: 1.0,
            enable_variable_polygons: false,
            ratio_polygons: 1.0,

            enable_transparency: true,
            nb_vertex: 3,
            nb_polygons: 125,
            resolution: 64,
        }
    }
}

impl Configuration {
    /// color channels per polygon
    pub fn nb_color(&self) -> usize {
        if self.enable_transparency {
            4
        } else {
            3
        }
    }

    /// reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: String| Err(EngineError::InvalidConfiguration(msg));
        if self.population == 0 {
            return invalid("population must be at least 1".into());
        }
        if self.nb_vertex < 3 {
            return invalid(format!("nbVertex must be at least 3, got {}", self.nb_vertex));
        }
        let ratios = [
            ("selectCutoff", self.select_cutoff),
            ("keepPreviousRatio", self.keep_previous_ratio),
            ("newIndividualRatio", self.new_individual_ratio),
            ("crossoverParentRatio", self.crossover_parent_ratio),
            ("mutationRate", self.mutation_rate),
            ("copyColorNeighborRate", self.copy_color_neighbor_rate),
            ("addPolygonRate", self.add_polygon_rate),
            ("removePolygonRate", self.remove_polygon_rate),
            ("vertexMovement", self.vertex_movement),
            ("colorModificationRate", self.color_modification_rate),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        MetricWeights::from_config(self).ensure_any()
    }

    /// save settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// load settings from a JSON file, or return defaults if it is missing or broken
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("failed to parse {}: {e}. using defaults.", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// scale `width x height` so the longest side equals `resolution`,
/// keeping the aspect ratio and at least one pixel per side
pub fn limit_dimensions(width: u32, height: u32, resolution: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f64;
    let scale = f64::from(resolution) / longest;
    let fit = |v: u32| ((f64::from(v) * scale).round() as u32).max(1);
    (fit(width), fit(height))
}
