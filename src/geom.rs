// polygon phenotype types and the small amount of planar math the GA needs.
//
// polygons here are plain value types: cloning one always produces independent
// vertex and color storage, so individuals never alias each other's geometry.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// lowest alpha a polygon may carry, keeps every polygon at least faintly visible
pub const ALPHA_MIN: f32 = 0.2;
pub const ALPHA_MAX: f32 = 1.0;
pub const CHANNEL_MAX: f32 = 255.0;

/// a point in rendering-space pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

impl Vertex {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(self, other: Vertex) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    #[inline]
    pub fn clamped(self, width: f32, height: f32) -> Self {
        Self {
            x: self.x.clamp(0.0, width),
            y: self.y.clamp(0.0, height),
        }
    }
}

/// polygon fill color. r/g/b live in 0..=255, alpha (when enabled) in 0..=1.
/// the channel count is a run-wide setting (`enableTransparency`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Color {
    Opaque([f32; 3]),
    Alpha([f32; 4]),
}

impl Color {
    pub const BLACK: Color = Color::Opaque([0.0, 0.0, 0.0]);

    /// build a color from raw channel values. anything but 3 or 4 channels is
    /// rejected with `InvalidColorFormat`.
    pub fn from_channels(channels: &[f32]) -> Result<Self, EngineError> {
        match *channels {
            [r, g, b] => Ok(Color::Opaque([r, g, b])),
            [r, g, b, a] => Ok(Color::Alpha([r, g, b, a])),
            _ => Err(EngineError::InvalidColorFormat(channels.len())),
        }
    }

    /// like [`Color::from_channels`] but falls back to opaque black
    pub fn from_channels_or_black(channels: &[f32]) -> Self {
        Self::from_channels(channels).unwrap_or_else(|e| {
            log::warn!("{e}; falling back to opaque black");
            Color::BLACK
        })
    }

    pub fn channels(&self) -> &[f32] {
        match self {
            Color::Opaque(c) => c,
            Color::Alpha(c) => c,
        }
    }

    pub fn alpha(&self) -> f32 {
        match self {
            Color::Opaque(_) => 1.0,
            Color::Alpha(c) => c[3],
        }
    }

    /// straight (non-premultiplied) RGBA8 for the rasterizer
    pub fn to_rgba8(&self) -> [u8; 4] {
        let c = self.channels();
        let to_u8 = |v: f32| v.round().clamp(0.0, CHANNEL_MAX) as u8;
        [
            to_u8(c[0]),
            to_u8(c[1]),
            to_u8(c[2]),
            (self.alpha().clamp(0.0, 1.0) * CHANNEL_MAX).round() as u8,
        ]
    }
}

/// a filled polygon: `nbVertex` vertices plus one color
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
    pub color: Color,
}

impl Polygon {
    /// mean of the vertices
    pub fn centroid(&self) -> Vertex {
        if self.vertices.is_empty() {
            return Vertex::new(0.0, 0.0);
        }
        let n = self.vertices.len() as f32;
        let (sx, sy) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), v| (sx + v.x, sy + v.y));
        Vertex::new(sx / n, sy / n)
    }
}

/// index of the polygon whose centroid is closest to `polygons[index]`'s,
/// ignoring `index` itself. `None` when there is no other polygon.
pub fn nearest_polygon(centroids: &[Vertex], index: usize) -> Option<usize> {
    let origin = *centroids.get(index)?;
    centroids
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != index)
        .min_by(|(_, a), (_, b)| {
            origin
                .distance(**a)
                .partial_cmp(&origin.distance(**b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// displace a vertex by a random distance in `[0, |range|]` along a uniformly
/// random direction, then clamp into `[0, width] x [0, height]`.
pub fn move_vertex<R: Rng>(rng: &mut R, v: Vertex, range: f32, width: f32, height: f32) -> Vertex {
    let distance = rng.random::<f32>() * range.abs();
    let angle = rng.random::<f32>() * std::f32::consts::TAU;
    Vertex::new(v.x + angle.cos() * distance, v.y + angle.sin() * distance).clamped(width, height)
}
