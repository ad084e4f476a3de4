use tiny_skia as sk;

use crate::dna::GeneLayout;
use crate::error::EngineError;
use crate::geom::Polygon;

/// scratch rasterization target, reused across evaluations.
///
/// drawing is only possible through a [`Canvas`], and a canvas can only be
/// obtained via [`Surface::begin`], which clears the pixmap to opaque black.
/// no evaluation can observe pixels left over from a previous one.
pub struct Surface {
    pix: sk::Pixmap,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self, EngineError> {
        profiling::scope!("Surface::new");
        sk::Pixmap::new(width, height)
            .map(|pix| Self { pix })
            .ok_or(EngineError::RenderSurfaceUnavailable { width, height })
    }

    /// reset to opaque black and hand out exclusive drawing access
    pub fn begin(&mut self) -> Canvas<'_> {
        self.pix.fill(sk::Color::BLACK);
        Canvas { pix: &mut self.pix }
    }
}

/// a freshly cleared surface, borrowed for a single render
pub struct Canvas<'a> {
    pix: &'a mut sk::Pixmap,
}

impl Canvas<'_> {
    /// painter's algorithm: later polygons draw over earlier ones
    pub fn draw_all(&mut self, polys: &[Polygon]) {
        profiling::scope!("draw_all");
        for poly in polys {
            fill_polygon(self.pix, poly);
        }
    }

    /// read the rendered image back as straight RGBA8
    pub fn read_rgba(&self) -> Vec<u8> {
        profiling::scope!("read_rgba");
        // background is opaque and every fill composites onto it, so demultiply
        // is exact here. kept anyway for any pixel that ends up translucent.
        let mut out = Vec::with_capacity(self.pix.data().len());
        for p in self.pix.pixels() {
            let c = p.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }
}

/// fill a polygon without anti-aliasing, alpha-composited with its color
pub fn fill_polygon(pix: &mut sk::Pixmap, poly: &Polygon) {
    profiling::scope!("fill_polygon");
    if poly.vertices.len() < 3 {
        return;
    }

    // quick reject: bbox fully outside the pixmap
    let (w, h) = (pix.width() as f32, pix.height() as f32);
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for v in &poly.vertices {
        min_x = min_x.min(v.x);
        min_y = min_y.min(v.y);
        max_x = max_x.max(v.x);
        max_y = max_y.max(v.y);
    }
    if max_x < 0.0 || max_y < 0.0 || min_x >= w || min_y >= h {
        return;
    }

    let mut pb = sk::PathBuilder::new();
    pb.move_to(poly.vertices[0].x, poly.vertices[0].y);
    for v in &poly.vertices[1..] {
        pb.line_to(v.x, v.y);
    }
    pb.close();
    // degenerate (zero-extent) shapes produce no path and cover no pixels
    let Some(path) = pb.finish() else {
        return;
    };

    let [r, g, b, a] = poly.color.to_rgba8();
    let mut paint = sk::Paint::default();
    paint.anti_alias = false;
    paint.set_color_rgba8(r, g, b, a);

    pix.fill_path(&path, &paint, sk::FillRule::EvenOdd, sk::Transform::identity(), None);
}

/// render a genotype on a fresh surface, for export and display
pub fn render_genes(layout: &GeneLayout, genes: &[f32], width: u32, height: u32) -> Result<Vec<u8>, EngineError> {
    profiling::scope!("render_genes");
    let polys = layout.decode(genes)?;
    let mut surface = Surface::new(width, height)?;
    let mut canvas = surface.begin();
    canvas.draw_all(&polys);
    Ok(canvas.read_rgba())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Color, Vertex};

    fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
    }

    fn square(x0: f32, y0: f32, x1: f32, y1: f32, color: Color) -> Polygon {
        Polygon {
            vertices: vec![Vertex::new(x0, y0), Vertex::new(x1, y0), Vertex::new(x1, y1), Vertex::new(x0, y1)],
            color,
        }
    }

    #[test]
    fn test_zero_sized_surface_is_unavailable() {
        assert_eq!(
            Surface::new(0, 10).err(),
            Some(EngineError::RenderSurfaceUnavailable { width: 0, height: 10 })
        );
    }

    #[test]
    fn test_begin_clears_to_black() {
        let mut surface = Surface::new(4, 4).unwrap();
        {
            let mut canvas = surface.begin();
            canvas.draw_all(&[square(0.0, 0.0, 4.0, 4.0, Color::Opaque([255.0, 255.0, 255.0]))]);
            assert_eq!(pixel(&canvas.read_rgba(), 4, 2, 2), [255, 255, 255, 255]);
        }
        let canvas = surface.begin();
        assert!(canvas.read_rgba().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_fill_and_painter_order() {
        let mut surface = Surface::new(10, 10).unwrap();
        let mut canvas = surface.begin();
        canvas.draw_all(&[
            square(0.0, 0.0, 10.0, 10.0, Color::Opaque([255.0, 0.0, 0.0])),
            square(0.0, 0.0, 5.0, 5.0, Color::Opaque([0.0, 0.0, 255.0])),
        ]);
        let rgba = canvas.read_rgba();
        assert_eq!(pixel(&rgba, 10, 1, 1), [0, 0, 255, 255]);
        assert_eq!(pixel(&rgba, 10, 8, 8), [255, 0, 0, 255]);
    }

    #[test]
    fn test_alpha_composites_over_black() {
        let mut surface = Surface::new(4, 4).unwrap();
        let mut canvas = surface.begin();
        canvas.draw_all(&[square(0.0, 0.0, 4.0, 4.0, Color::Alpha([200.0, 100.0, 0.0, 0.5]))]);
        let [r, g, b, a] = pixel(&canvas.read_rgba(), 4, 1, 1);
        assert!((99..=101).contains(&r), "r = {r}");
        assert!((49..=51).contains(&g), "g = {g}");
        assert_eq!(b, 0);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_offscreen_and_degenerate_polygons_are_skipped() {
        let mut surface = Surface::new(4, 4).unwrap();
        let mut canvas = surface.begin();
        let white = Color::Opaque([255.0, 255.0, 255.0]);
        canvas.draw_all(&[
            square(10.0, 10.0, 20.0, 20.0, white),
            square(2.0, 2.0, 2.0, 2.0, white),
        ]);
        assert!(canvas.read_rgba().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }
}
