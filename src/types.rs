use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single face landmark in normalized image coordinates.
///
/// `x` and `y` are fractions of the frame width and height; `z` is the
/// detector's unitless relative depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Width and height of an axis-aligned extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// All landmarks the detector reported for one face, indexed positionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Landmark> {
        self.points.get(idx)
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl std::ops::IndexMut<usize> for LandmarkSet {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.points[idx]
    }
}

/// One detector result: zero or more faces for a single video frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameEvent {
    #[serde(default)]
    pub faces: Vec<LandmarkSet>,
}

impl FrameEvent {
    pub fn new(faces: Vec<LandmarkSet>) -> Self {
        Self { faces }
    }

    /// The only face the overlay engine tracks.
    pub fn primary_face(&self) -> Option<&LandmarkSet> {
        self.faces.first()
    }
}

/// Aggregate of a landmark group: centroid plus bounding-box extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSummary {
    pub position: Landmark,
    pub size: Size,
}

/// User-controlled tweaks applied on top of the computed placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentState {
    /// Multiplier on the base overlay size, always positive.
    pub scale: f32,
    /// Vertical shift as a percentage of the surface height.
    #[serde(alias = "yOffset", alias = "yPosition")]
    pub y_offset: f32,
    /// Extra rotation in degrees.
    pub rotation: f32,
}

impl Default for AdjustmentState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            y_offset: 0.0,
            rotation: 0.0,
        }
    }
}

impl AdjustmentState {
    pub fn set(&mut self, kind: AdjustmentKind, value: f32) -> crate::Result<()> {
        if !value.is_finite() {
            return Err(Error::InvalidAdjustment(format!("{kind} must be finite, got {value}")));
        }
        match kind {
            AdjustmentKind::Scale => {
                if value <= 0.0 {
                    return Err(Error::InvalidAdjustment(format!(
                        "scale must be positive, got {value}"
                    )));
                }
                self.scale = value;
            }
            AdjustmentKind::YOffset => self.y_offset = value,
            AdjustmentKind::Rotation => self.rotation = value,
        }
        Ok(())
    }

    pub fn rotation_radians(&self) -> f32 {
        self.rotation.to_radians()
    }
}

/// Which adjustment a setter call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdjustmentKind {
    Scale,
    YOffset,
    Rotation,
}

impl FromStr for AdjustmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scale" => Ok(Self::Scale),
            "yOffset" | "y_offset" | "yPosition" | "y-offset" => Ok(Self::YOffset),
            "rotation" => Ok(Self::Rotation),
            other => Err(Error::InvalidAdjustment(format!("unknown adjustment `{other}`"))),
        }
    }
}

impl std::fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scale => "scale",
            Self::YOffset => "yOffset",
            Self::Rotation => "rotation",
        };
        f.write_str(name)
    }
}

/// Intrinsic pixel dimensions of a product image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetDimensions {
    pub width: u32,
    pub height: u32,
}

impl AssetDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Height over width.
    pub fn aspect(&self) -> f32 {
        self.height as f32 / self.width as f32
    }
}

/// Per-frame affine placement of an overlay.
///
/// `center_x`/`center_y` are normalized to the surface. `width`/`height` are
/// expressed as fractions of the surface width, so the renderer multiplies
/// both by the surface width and the asset aspect ratio survives non-square
/// surfaces. `y_offset_percent` is the pending vertical shift that can only
/// be resolved once the surface height is known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub center_x: f32,
    pub center_y: f32,
    pub angle: f32,
    pub width: f32,
    pub height: f32,
    pub y_offset_percent: f32,
}

impl Placement {
    /// Center in device pixels, vertical offset included.
    pub fn pixel_center(&self, surface_width: f32, surface_height: f32) -> Point {
        Point::new(
            self.center_x * surface_width,
            self.center_y * surface_height + self.y_offset_percent * 0.01 * surface_height,
        )
    }

    /// Overlay size in device pixels.
    pub fn pixel_size(&self, surface_width: f32) -> Size {
        Size {
            width: self.width * surface_width,
            height: self.height * surface_width,
        }
    }
}
