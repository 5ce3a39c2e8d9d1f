//! Landmark index groups and their aggregation into feature summaries.
//!
//! Index values follow the 468-point face mesh topology used by the
//! reference detector.

use crate::error::{Error, Result};
use crate::types::{FeatureSummary, Landmark, LandmarkSet, Size};

/// Landmark count emitted per face by the reference detector.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// A named, static set of landmark indices describing one facial region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureGroup {
    pub name: &'static str,
    pub indices: &'static [usize],
}

impl FeatureGroup {
    pub const fn new(name: &'static str, indices: &'static [usize]) -> Self {
        Self { name, indices }
    }

    /// Summarize this group, reporting a missing feature as an error.
    pub fn summarize(&self, landmarks: &LandmarkSet) -> Result<FeatureSummary> {
        summarize(Some(landmarks), self.indices)
            .ok_or(Error::FeatureNotDetected { feature: self.name })
    }

    /// Check the group against a detector that emits `landmark_count` points.
    pub fn validate(&self, landmark_count: usize) -> Result<()> {
        if self.indices.is_empty() {
            return Err(Error::InvalidIndexGroup {
                group: self.name,
                index: 0,
                landmark_count,
            });
        }
        match self.indices.iter().find(|&&i| i >= landmark_count) {
            Some(&index) => Err(Error::InvalidIndexGroup {
                group: self.name,
                index,
                landmark_count,
            }),
            None => Ok(()),
        }
    }
}

pub const LEFT_EYE: FeatureGroup =
    FeatureGroup::new("LEFT_EYE", &[33, 133, 160, 159, 158, 157, 173, 243]);
pub const RIGHT_EYE: FeatureGroup =
    FeatureGroup::new("RIGHT_EYE", &[362, 398, 384, 385, 386, 387, 388, 466]);
pub const NOSE_BRIDGE: FeatureGroup = FeatureGroup::new("NOSE_BRIDGE", &[168, 6, 197, 195, 5]);

// Landmark 10 closes the contour, so it counts twice in the centroid.
pub const FOREHEAD: FeatureGroup = FeatureGroup::new(
    "FOREHEAD",
    &[10, 151, 9, 8, 107, 66, 105, 104, 103, 67, 109, 10],
);
pub const TOP_HEAD: FeatureGroup = FeatureGroup::new(
    "TOP_HEAD",
    &[10, 109, 67, 103, 104, 105, 66, 107, 9, 8, 55, 65, 10],
);

/// The feature groups a product family anchors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceIndices {
    pub groups: &'static [FeatureGroup],
}

impl FaceIndices {
    pub const GLASSES: FaceIndices = FaceIndices {
        groups: &[LEFT_EYE, RIGHT_EYE, NOSE_BRIDGE],
    };

    pub const HAT: FaceIndices = FaceIndices {
        groups: &[FOREHEAD, TOP_HEAD],
    };

    /// Validate every group; any failure is a configuration bug.
    pub fn validate(&self, landmark_count: usize) -> Result<()> {
        self.groups.iter().try_for_each(|g| g.validate(landmark_count))
    }
}

/// Reduce the selected landmarks to their centroid and bounding box.
///
/// Returns `None` when there is nothing to aggregate: no landmarks, an empty
/// index list, or an index past the end of the set.
pub fn summarize(landmarks: Option<&LandmarkSet>, indices: &[usize]) -> Option<FeatureSummary> {
    let landmarks = landmarks?;
    if indices.is_empty() {
        return None;
    }

    let mut sum = Landmark::default();
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);

    for &idx in indices {
        let p = landmarks.get(idx)?;
        sum.x += p.x;
        sum.y += p.y;
        sum.z += p.z;

        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let n = indices.len() as f32;
    Some(FeatureSummary {
        position: Landmark::new(sum.x / n, sum.y / n, sum.z / n),
        size: Size {
            width: max_x - min_x,
            height: max_y - min_y,
        },
    })
}
