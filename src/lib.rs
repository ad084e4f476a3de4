//! polyevo: evolve a set of (optionally translucent) polygons until their
//! rendering approximates a target image.
//!
//! the [`Engine`] runs one generation per [`GenerationRequest`]; drive it
//! directly, or from a dedicated thread through [`EngineWorker`].

pub mod crossover;
pub mod dna;
pub mod engine;
pub mod engine_thread;
pub mod error;
pub mod fitness;
pub mod geom;
pub mod messages;
pub mod mutate;
pub mod render;
pub mod selection;
pub mod settings;

pub use dna::{GeneLayout, Individual, Origin};
pub use engine::Engine;
pub use engine_thread::EngineWorker;
pub use error::EngineError;
pub use messages::{GenerationRequest, GenerationResponse, PixelBuffer, StepOutcome};
pub use settings::{limit_dimensions, Configuration, CrossoverStrategy, ParentSelection};
