//! Software drawing surface backed by an RGBA image buffer.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::render::Surface;
use crate::types::Point;

/// A 2D affine transform in canvas convention:
///
/// ```text
/// x' = a*x + c*y + e
/// y' = b*x + d*y + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            e: dx,
            f: dy,
            ..Self::IDENTITY
        }
    }

    pub fn rotation(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn then_inner(&self, other: &Affine2) -> Affine2 {
        Affine2 {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine2 {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }
}

/// An in-memory [`Surface`] that rasterizes onto an [`RgbaImage`].
///
/// Images are sampled nearest-neighbour and blended source-over.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
    transform: Affine2,
    saved: Vec<Affine2>,
}

impl Canvas {
    /// Create a fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            transform: Affine2::IDENTITY,
            saved: Vec::new(),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn transform(&self) -> Affine2 {
        self.transform
    }

    /// Number of transforms currently saved.
    pub fn saved_depth(&self) -> usize {
        self.saved.len()
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(Error::from)
    }

    /// Visit every device pixel whose center falls inside the user-space
    /// rectangle, passing the pixel and its position within the rectangle
    /// as fractions in `[0, 1)`.
    fn for_each_covered<F>(&mut self, x: f32, y: f32, width: f32, height: f32, mut visit: F)
    where
        F: FnMut(&mut Rgba<u8>, f32, f32),
    {
        if !(width > 0.0 && height > 0.0) || !x.is_finite() || !y.is_finite() {
            return;
        }
        let Some(inverse) = self.transform.inverse() else {
            return;
        };

        let corners = [
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x, y + height),
            Point::new(x + width, y + height),
        ]
        .map(|p| self.transform.apply(p));

        let min_x = corners.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let max_x = corners.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let min_y = corners.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let max_y = corners.iter().map(|p| p.y).fold(f32::MIN, f32::max);

        let (w, h) = self.pixels.dimensions();
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(w);
        let y1 = (max_y.ceil().max(0.0) as u32).min(h);

        for py in y0..y1 {
            for px in x0..x1 {
                let local = inverse.apply(Point::new(px as f32 + 0.5, py as f32 + 0.5));
                let u = (local.x - x) / width;
                let v = (local.y - y) / height;
                if (0.0..1.0).contains(&u) && (0.0..1.0).contains(&v) {
                    visit(self.pixels.get_pixel_mut(px, py), u, v);
                }
            }
        }
    }
}

impl Surface for Canvas {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.for_each_covered(x, y, width, height, |pixel, _, _| {
            *pixel = Rgba([0, 0, 0, 0]);
        });
    }

    fn save(&mut self) {
        self.saved.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(t) = self.saved.pop() {
            self.transform = t;
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.transform = self.transform.then_inner(&Affine2::translation(dx, dy));
    }

    fn rotate(&mut self, angle: f32) {
        self.transform = self.transform.then_inner(&Affine2::rotation(angle));
    }

    fn draw_image(
        &mut self,
        image: &RgbaImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<()> {
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(Error::InvalidAssetDimensions {
                width: src_w,
                height: src_h,
            });
        }

        self.for_each_covered(x, y, width, height, |dst, u, v| {
            let sx = ((u * src_w as f32) as u32).min(src_w - 1);
            let sy = ((v * src_h as f32) as u32).min(src_h - 1);
            blend_over(dst, image.get_pixel(sx, sy));
        });
        Ok(())
    }
}

/// Porter-Duff source-over on straight (non-premultiplied) alpha.
fn blend_over(dst: &mut Rgba<u8>, src: &Rgba<u8>) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mut out = [0u8; 4];
    for ch in 0..3 {
        let sc = src[ch] as f32;
        let dc = dst[ch] as f32;
        let c = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        out[ch] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    *dst = Rgba(out);
}
