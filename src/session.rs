//! Frame loop: one landmark event in, one composited surface out.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::assets::AssetCache;
use crate::catalog::ProductCatalog;
use crate::error::{Error, Result};
use crate::placement::place;
use crate::render::{self, Surface};
use crate::types::{AdjustmentKind, AdjustmentState, FrameEvent, Placement};

/// What the application has picked: a product and how to adjust it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSelection {
    pub product_id: Option<String>,
    pub adjustments: AdjustmentState,
}

/// Result of processing a single frame. Every variant except `Rendered`
/// leaves the surface cleared.
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Rendered(Placement),
    NoProduct,
    NoFace,
    /// The product image is still loading; the next frame retries.
    AssetPending { id: String },
    /// A background load for the product image failed.
    AssetFailed(Error),
    UnknownFamily { family: String },
    FeatureNotDetected { feature: &'static str },
    /// Placement or drawing failed for another reason.
    Failed(Error),
}

impl FrameOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FrameOutcome::Rendered(_) => "rendered",
            FrameOutcome::NoProduct => "no_product",
            FrameOutcome::NoFace => "no_face",
            FrameOutcome::AssetPending { .. } => "asset_pending",
            FrameOutcome::AssetFailed(_) => "asset_failed",
            FrameOutcome::UnknownFamily { .. } => "unknown_family",
            FrameOutcome::FeatureNotDetected { .. } => "feature_not_detected",
            FrameOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, FrameOutcome::Rendered(_))
    }
}

/// Application-side state changes, applied between frames.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetProduct(String),
    ClearProduct,
    SetAdjustment(AdjustmentKind, f32),
    ResetAdjustments,
    Clear,
}

/// Per-outcome frame counts from [`TryOnSession::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames: usize,
    pub outcomes: BTreeMap<&'static str, usize>,
    pub last_placement: Option<Placement>,
}

impl RunSummary {
    fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        *self.outcomes.entry(outcome.label()).or_default() += 1;
        if let FrameOutcome::Rendered(placement) = outcome {
            self.last_placement = Some(*placement);
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

/// Owns the product selection and drives the per-frame pipeline.
pub struct TryOnSession {
    catalog: ProductCatalog,
    assets: AssetCache,
    selection: ProductSelection,
    defaults: AdjustmentState,
    warned_families: HashSet<String>,
}

impl TryOnSession {
    pub fn new(catalog: ProductCatalog, assets: AssetCache) -> Self {
        Self {
            catalog,
            assets,
            selection: ProductSelection::default(),
            defaults: AdjustmentState::default(),
            warned_families: HashSet::new(),
        }
    }

    /// Adjustments that `reset_adjustments` and `set_product` restore.
    pub fn with_default_adjustments(mut self, defaults: AdjustmentState) -> Self {
        self.defaults = defaults;
        self.selection.adjustments = defaults;
        self
    }

    pub fn selection(&self) -> &ProductSelection {
        &self.selection
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// Select a product. Adjustments go back to their defaults.
    pub fn set_product(&mut self, id: impl Into<String>) {
        let id = id.into();
        debug!(id = %id, "product selected");
        self.selection.product_id = Some(id);
        self.selection.adjustments = self.defaults;
    }

    pub fn clear_product(&mut self) {
        self.selection.product_id = None;
    }

    pub fn set_adjustment(&mut self, kind: AdjustmentKind, value: f32) -> Result<()> {
        self.selection.adjustments.set(kind, value)
    }

    pub fn reset_adjustments(&mut self) {
        self.selection.adjustments = self.defaults;
    }

    /// Clear the surface outside of frame delivery.
    pub fn clear<S: Surface + ?Sized>(&self, surface: &mut S) {
        render::clear(surface);
    }

    pub fn apply<S: Surface + ?Sized>(&mut self, command: SessionCommand, surface: &mut S) -> Result<()> {
        match command {
            SessionCommand::SetProduct(id) => self.set_product(id),
            SessionCommand::ClearProduct => self.clear_product(),
            SessionCommand::SetAdjustment(kind, value) => self.set_adjustment(kind, value)?,
            SessionCommand::ResetAdjustments => self.reset_adjustments(),
            SessionCommand::Clear => self.clear(surface),
        }
        Ok(())
    }

    /// Run the pipeline for one frame. The surface is always cleared first;
    /// failures only skip this frame.
    pub fn process_frame<S: Surface + ?Sized>(&mut self, event: &FrameEvent, surface: &mut S) -> FrameOutcome {
        render::clear(surface);

        let selection = self.selection.clone();
        let Some(id) = selection.product_id.as_deref() else {
            return FrameOutcome::NoProduct;
        };
        let Some(landmarks) = event.primary_face() else {
            return FrameOutcome::NoFace;
        };

        let family = match self.catalog.family_of(id) {
            Ok(family) => family,
            Err(Error::UnknownProductFamily(family)) => {
                if self.warned_families.insert(family.clone()) {
                    warn!(id, family = %family, "unknown product family, overlay disabled");
                }
                return FrameOutcome::UnknownFamily { family };
            }
            Err(e) => return FrameOutcome::Failed(e),
        };

        let Some(asset) = self.assets.get(id) else {
            if let Some(e) = self.assets.take_failure(id) {
                return FrameOutcome::AssetFailed(e);
            }
            self.assets.request(id);
            debug!(id, "asset not ready, skipping frame");
            return FrameOutcome::AssetPending { id: id.to_string() };
        };

        let placement = match place(family, landmarks, &selection.adjustments, asset.dimensions()) {
            Ok(placement) => placement,
            Err(Error::FeatureNotDetected { feature }) => {
                debug!(id, feature, "feature not detected, skipping frame");
                return FrameOutcome::FeatureNotDetected { feature };
            }
            Err(e) => return FrameOutcome::Failed(e),
        };

        match render::draw_overlay(surface, &placement, &asset) {
            Ok(()) => FrameOutcome::Rendered(placement),
            Err(e) => {
                debug!(id, error = %e, "drawing failed, skipping frame");
                FrameOutcome::Failed(e)
            }
        }
    }

    /// Consume frames until the frame channel closes. Commands are applied
    /// before the next frame is processed. The surface is left cleared.
    pub async fn run<S: Surface + ?Sized>(
        &mut self,
        frames: mpsc::Receiver<FrameEvent>,
        commands: mpsc::Receiver<SessionCommand>,
        surface: &mut S,
    ) -> RunSummary {
        self.run_with(frames, commands, surface, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_frame` after every processed
    /// frame while the surface still holds that frame's output.
    pub async fn run_with<S, F>(
        &mut self,
        mut frames: mpsc::Receiver<FrameEvent>,
        mut commands: mpsc::Receiver<SessionCommand>,
        surface: &mut S,
        mut on_frame: F,
    ) -> RunSummary
    where
        S: Surface + ?Sized,
        F: FnMut(&FrameOutcome, &S),
    {
        let mut summary = RunSummary::default();
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;
                command = commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if let Err(e) = self.apply(command, surface) {
                            warn!(error = %e, "ignoring command");
                        }
                    }
                    None => commands_open = false,
                },
                event = frames.recv() => match event {
                    Some(event) => {
                        let outcome = self.process_frame(&event, surface);
                        if let FrameOutcome::AssetFailed(e) = &outcome {
                            warn!(error = %e, "product image unavailable");
                        }
                        on_frame(&outcome, &*surface);
                        summary.record(&outcome);
                    }
                    None => break,
                },
            }
        }

        self.clear(surface);
        info!(frames = summary.frames, "frame stream ended");
        summary
    }
}
