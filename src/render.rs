//! Compositing a placed product image onto a 2D drawing surface.

use std::ops::{Deref, DerefMut};

use image::RgbaImage;

use crate::assets::ProductAsset;
use crate::error::Result;
use crate::types::Placement;

/// A 2D immediate-mode drawing surface.
///
/// Mirrors the subset of an HTML canvas context the overlay needs. The
/// overlay engine reads the dimensions but never resizes the surface.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Reset the given rectangle (in current user space) to transparent.
    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    /// Push the current transform.
    fn save(&mut self);

    /// Pop the most recently saved transform. No-op when nothing is saved.
    fn restore(&mut self);

    fn translate(&mut self, dx: f32, dy: f32);

    /// Rotate user space clockwise by `angle` radians (y axis points down).
    fn rotate(&mut self, angle: f32);

    /// Draw `image` scaled into the rectangle `[x, y, width, height]` in
    /// current user space.
    fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32)
        -> Result<()>;
}

/// Saves the surface transform on creation and restores it on drop, so the
/// state is restored even when drawing bails out early.
pub struct TransformScope<'a, S: Surface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: Surface + ?Sized> TransformScope<'a, S> {
    pub fn new(surface: &'a mut S) -> Self {
        surface.save();
        Self { surface }
    }
}

impl<S: Surface + ?Sized> Deref for TransformScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        self.surface
    }
}

impl<S: Surface + ?Sized> DerefMut for TransformScope<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.surface
    }
}

impl<S: Surface + ?Sized> Drop for TransformScope<'_, S> {
    fn drop(&mut self) {
        self.surface.restore();
    }
}

/// Clear the whole surface.
pub fn clear<S: Surface + ?Sized>(surface: &mut S) {
    let (w, h) = (surface.width() as f32, surface.height() as f32);
    surface.clear_rect(0.0, 0.0, w, h);
}

/// Clear the surface, then draw `asset` at `placement`.
pub fn render<S: Surface + ?Sized>(
    surface: &mut S,
    placement: &Placement,
    asset: &ProductAsset,
) -> Result<()> {
    clear(surface);
    draw_overlay(surface, placement, asset)
}

/// Draw `asset` at `placement` without clearing first.
///
/// The image is centered on the placement so rotation pivots about the
/// placement center rather than a corner.
pub fn draw_overlay<S: Surface + ?Sized>(
    surface: &mut S,
    placement: &Placement,
    asset: &ProductAsset,
) -> Result<()> {
    let (sw, sh) = (surface.width() as f32, surface.height() as f32);
    let center = placement.pixel_center(sw, sh);
    let size = placement.pixel_size(sw);

    let mut scope = TransformScope::new(surface);
    scope.translate(center.x, center.y);
    scope.rotate(placement.angle);
    scope.draw_image(
        &asset.image,
        -size.width / 2.0,
        -size.height / 2.0,
        size.width,
        size.height,
    )
}
