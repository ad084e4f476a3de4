/// everything that can go wrong inside the evolution engine.
///
/// per-individual errors (`MisalignedGenome`, a worker failing to get its own
/// surface) are isolated by the engine: the individual is dropped and replaced.
/// `RenderSurfaceUnavailable` at step level is reported through
/// [`crate::messages::StepOutcome`] instead of an `Err`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// the scratch pixmap could not be allocated (zero or oversized dimensions).
    #[error("render surface of {width}x{height} could not be created")]
    RenderSurfaceUnavailable { width: u32, height: u32 },

    /// a color was built from neither 3 nor 4 channels.
    #[error("color has {0} channels, expected 3 or 4")]
    InvalidColorFormat(usize),

    /// a gene array whose length is not a multiple of the polygon stride.
    #[error("gene array of length {len} is not a multiple of the polygon stride {stride}")]
    MisalignedGenome { len: usize, stride: usize },

    /// every fitness metric is disabled or has a zero weight.
    #[error("no fitness metric is enabled with a positive weight")]
    NoFitnessMetricEnabled,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// the target pixel buffer does not hold `width * height * 4` bytes.
    #[error("target image is {width}x{height} but carries {len} bytes")]
    ImageSizeMismatch { width: u32, height: u32, len: usize },

    /// the engine worker thread hung up.
    #[error("engine worker disconnected")]
    WorkerDisconnected,
}
