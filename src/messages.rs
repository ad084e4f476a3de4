// messages exchanged with whoever drives the engine (UI thread, CLI, tests).
// one request in, one response out, full population snapshots both ways.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::dna::Individual;
use crate::error::EngineError;
use crate::settings::Configuration;

/// straight RGBA8 pixels, row-major
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "channelData")]
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// check the byte count matches the dimensions
    pub fn validate(&self) -> Result<(), EngineError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected || expected == 0 {
            return Err(EngineError::ImageSizeMismatch {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    /// copy resampled to `width x height` (triangle filter); same size is a plain clone
    pub fn resized(&self, width: u32, height: u32) -> Result<PixelBuffer, EngineError> {
        self.validate()?;
        if (self.width, self.height) == (width, height) {
            return Ok(self.clone());
        }
        log::debug!("resampling {}x{} -> {}x{}", self.width, self.height, width, height);
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            EngineError::ImageSizeMismatch {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            },
        )?;
        let data = image::imageops::resize(&img, width, height, FilterType::Triangle).into_raw();
        Ok(Self { width, height, data })
    }
}

/// one generation step's worth of work
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub is_running: bool,
    pub image: PixelBuffer,
    pub configuration: Configuration,
    /// empty = start a new run
    pub population: Vec<Individual>,
    /// best individual ever seen, ignored when `population` is empty
    pub best: Option<Individual>,
    pub generation: u64,
    pub not_improving_since: u64,
    pub rendering_width: u32,
    pub rendering_height: u32,
}

impl GenerationRequest {
    /// request for the first generation of a run
    pub fn bootstrap(image: PixelBuffer, configuration: Configuration, rendering_width: u32, rendering_height: u32) -> Self {
        Self {
            is_running: true,
            image,
            configuration,
            population: Vec::new(),
            best: None,
            generation: 0,
            not_improving_since: 0,
            rendering_width,
            rendering_height,
        }
    }

    /// next request, carrying the state of `response` forward
    pub fn follow_up(self, response: GenerationResponse) -> Self {
        Self {
            is_running: response.is_running,
            population: response.population,
            best: response.best,
            generation: response.generation,
            not_improving_since: response.not_improving_since,
            ..self
        }
    }
}

/// whether the step actually advanced the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepOutcome {
    #[default]
    Advanced,
    /// no rendering surface; the previous state is returned unchanged
    RenderSurfaceUnavailable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub is_running: bool,
    pub best: Option<Individual>,
    /// evaluated population, sorted by descending fitness
    pub population: Vec<Individual>,
    pub generation: u64,
    /// wall-clock seconds spent on this step
    pub elapsed_time: f64,
    pub not_improving_since: u64,
    #[serde(default)]
    pub outcome: StepOutcome,
}

impl GenerationResponse {
    /// the request's state handed back untouched
    pub fn unchanged(request: &GenerationRequest, outcome: StepOutcome) -> Self {
        Self {
            is_running: request.is_running,
            best: request.best.clone(),
            population: request.population.clone(),
            generation: request.generation,
            elapsed_time: 0.0,
            not_improving_since: request.not_improving_since,
            outcome,
        }
    }
}
