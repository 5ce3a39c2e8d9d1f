//! # face-tryon
//!
//! Virtual try-on overlays anchored to facial landmarks.
//!
//! This crate provides:
//! - **Feature Aggregation**: reduce a dense face mesh (468 points) to anchor
//!   features such as eye centers and the forehead span
//! - **Placement**: per product family (glasses, hat), derive a 2D placement
//!   (center, angle, size) from those anchors plus user adjustments
//! - **Rendering**: composite a cached product image onto any [`Surface`],
//!   including the software [`Canvas`]
//! - **Frame Loop**: a [`TryOnSession`] that consumes one landmark event per
//!   frame and skips frames it cannot place
//!
//! ## Pipeline
//!
//! 1. Take the first face of the frame's [`FrameEvent`]
//! 2. Summarize the family's index groups into centroids and extents
//! 3. Compute a [`Placement`] from the summaries, the asset aspect ratio and
//!    the current [`AdjustmentState`]
//! 4. Clear the surface, then draw the image centered on the placement
//!    inside a saved-and-restored transform
//!
//! Placements are recomputed from scratch every frame.
//!
//! ## Quick Start
//!
//! ```rust
//! use face_tryon::{
//!     compute_placement, AdjustmentState, AssetDimensions, Landmark, LandmarkSet, LEFT_EYE,
//!     RIGHT_EYE,
//! };
//!
//! // A synthetic face mesh with level eyes
//! let mut face = LandmarkSet::new(vec![Landmark::default(); 468]);
//! for &i in LEFT_EYE.indices {
//!     face[i] = Landmark::new(0.3, 0.5, 0.0);
//! }
//! for &i in RIGHT_EYE.indices {
//!     face[i] = Landmark::new(0.7, 0.5, 0.0);
//! }
//!
//! let placement = compute_placement(
//!     "GLASSES",
//!     &face,
//!     &AdjustmentState::default(),
//!     AssetDimensions::new(400, 200),
//! )
//! .unwrap();
//!
//! assert!(placement.angle.abs() < 1e-6);
//! assert!((placement.width - 1.0).abs() < 1e-5);
//! assert!((placement.height - 0.5).abs() < 1e-5);
//! ```
//!
//! ## Custom Surfaces
//!
//! Implement the [`Surface`] trait to draw onto your own backend; the
//! renderer only needs a transform stack and scaled image drawing.

pub mod assets;
mod canvas;
pub mod catalog;
pub mod config;
mod error;
pub mod features;
pub mod placement;
pub mod render;
pub mod session;
mod types;

pub use assets::{AssetCache, AssetSource, FsAssetSource, PreloadReport, ProductAsset};
pub use canvas::{Affine2, Canvas};
pub use catalog::{CatalogEntry, ProductCatalog, ProductFamily};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use features::{
    summarize, FaceIndices, FeatureGroup, FACE_MESH_LANDMARKS, FOREHEAD, LEFT_EYE, NOSE_BRIDGE,
    RIGHT_EYE, TOP_HEAD,
};
pub use placement::{compute_placement, place};
pub use render::{clear, draw_overlay, render, Surface, TransformScope};
pub use session::{FrameOutcome, ProductSelection, RunSummary, SessionCommand, TryOnSession};
pub use types::{
    AdjustmentKind, AdjustmentState, AssetDimensions, FeatureSummary, FrameEvent, Landmark,
    LandmarkSet, Placement, Point, Size,
};
