//! Per-family placement of an overlay from facial anchor features.
//!
//! Placements are recomputed from scratch every frame. There is no temporal
//! filtering, so detector jitter shows through unchanged.

use crate::catalog::ProductFamily;
use crate::error::{Error, Result};
use crate::features::{FOREHEAD, LEFT_EYE, RIGHT_EYE, TOP_HEAD};
use crate::types::{AdjustmentState, AssetDimensions, LandmarkSet, Placement};

/// Glasses span this many eye distances, slightly past the outer corners.
pub const GLASSES_WIDTH_FACTOR: f32 = 2.5;

/// Hats span this many forehead widths.
pub const HAT_WIDTH_FACTOR: f32 = 1.5;

/// Normalized upward bias placing the hat above the forehead line.
pub const HAT_LIFT: f32 = 0.05;

/// Compute a placement for a product family given by name.
///
/// Family names that do not map to a [`ProductFamily`] fail with
/// [`Error::UnknownProductFamily`].
pub fn compute_placement(
    family: &str,
    landmarks: &LandmarkSet,
    adjustments: &AdjustmentState,
    asset: AssetDimensions,
) -> Result<Placement> {
    let family: ProductFamily = family.parse()?;
    place(family, landmarks, adjustments, asset)
}

/// Compute a placement for a known product family.
pub fn place(
    family: ProductFamily,
    landmarks: &LandmarkSet,
    adjustments: &AdjustmentState,
    asset: AssetDimensions,
) -> Result<Placement> {
    if asset.width == 0 || asset.height == 0 {
        return Err(Error::InvalidAssetDimensions {
            width: asset.width,
            height: asset.height,
        });
    }

    match family {
        ProductFamily::Glasses => place_glasses(landmarks, adjustments, asset),
        ProductFamily::Hat => place_hat(landmarks, adjustments, asset),
    }
}

fn place_glasses(
    landmarks: &LandmarkSet,
    adjustments: &AdjustmentState,
    asset: AssetDimensions,
) -> Result<Placement> {
    let left = LEFT_EYE.summarize(landmarks)?.position.xy();
    let right = RIGHT_EYE.summarize(landmarks)?.position.xy();

    let eye_distance = left.distance(&right);
    let center = left.midpoint(&right);

    // In-plane roll from the eye-to-eye vector; yaw and pitch are ignored.
    let delta = right - left;
    let base_angle = delta.y.atan2(delta.x);

    let base_width = eye_distance * GLASSES_WIDTH_FACTOR;
    Ok(finish(
        center.x,
        center.y,
        base_angle,
        base_width,
        adjustments,
        asset,
    ))
}

fn place_hat(
    landmarks: &LandmarkSet,
    adjustments: &AdjustmentState,
    asset: AssetDimensions,
) -> Result<Placement> {
    let forehead = FOREHEAD.summarize(landmarks)?;
    // Required even though only the forehead drives the geometry.
    TOP_HEAD.summarize(landmarks)?;

    let base_width = forehead.size.width * HAT_WIDTH_FACTOR;
    Ok(finish(
        forehead.position.x,
        forehead.position.y - HAT_LIFT,
        0.0,
        base_width,
        adjustments,
        asset,
    ))
}

fn finish(
    center_x: f32,
    center_y: f32,
    base_angle: f32,
    base_width: f32,
    adjustments: &AdjustmentState,
    asset: AssetDimensions,
) -> Placement {
    let base_height = base_width * asset.aspect();
    Placement {
        center_x,
        center_y,
        angle: base_angle + adjustments.rotation_radians(),
        width: base_width * adjustments.scale,
        height: base_height * adjustments.scale,
        y_offset_percent: adjustments.y_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureGroup, FACE_MESH_LANDMARKS};
    use crate::types::Landmark;
    use std::f32::consts::PI;

    fn face_with(groups: &[(FeatureGroup, f32, f32)]) -> LandmarkSet {
        let mut lm = LandmarkSet::new(vec![Landmark::default(); FACE_MESH_LANDMARKS]);
        for (group, x, y) in groups {
            for &i in group.indices {
                lm[i] = Landmark::new(*x, *y, 0.0);
            }
        }
        lm
    }

    fn eyes(left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
        face_with(&[(LEFT_EYE, left.0, left.1), (RIGHT_EYE, right.0, right.1)])
    }

    const SQUARE: AssetDimensions = AssetDimensions::new(100, 100);

    #[test]
    fn level_eyes_give_level_glasses() {
        let lm = eyes((0.3, 0.5), (0.7, 0.5));
        let p = compute_placement("GLASSES", &lm, &AdjustmentState::default(), SQUARE).unwrap();

        assert!(p.angle.abs() < 1e-6);
        assert!((p.center_x - 0.5).abs() < 1e-6);
        assert!((p.center_y - 0.5).abs() < 1e-6);
        assert!((p.width - 1.0).abs() < 1e-5);
        assert!((p.height - 1.0).abs() < 1e-5);
        assert_eq!(p.y_offset_percent, 0.0);
    }

    #[test]
    fn glasses_height_follows_asset_aspect() {
        let lm = eyes((0.3, 0.5), (0.7, 0.5));
        let adj = AdjustmentState {
            scale: 2.0,
            ..Default::default()
        };
        let p = place(ProductFamily::Glasses, &lm, &adj, AssetDimensions::new(400, 100)).unwrap();
        assert!((p.width - 2.0).abs() < 1e-5);
        assert!((p.height - 0.5).abs() < 1e-5);
    }

    #[test]
    fn tilted_eyes_give_roll() {
        let lm = eyes((0.4, 0.4), (0.6, 0.6));
        let p = place(ProductFamily::Glasses, &lm, &AdjustmentState::default(), SQUARE).unwrap();
        assert!((p.angle - PI / 4.0).abs() < 1e-5);
    }

    #[test]
    fn rotation_adjustment_adds_exactly() {
        let lm = eyes((0.35, 0.52), (0.68, 0.47));
        let base = place(ProductFamily::Glasses, &lm, &AdjustmentState::default(), SQUARE).unwrap();

        for delta in [-30.0f32, 5.0, 90.0] {
            let adj = AdjustmentState {
                rotation: delta,
                ..Default::default()
            };
            let p = place(ProductFamily::Glasses, &lm, &adj, SQUARE).unwrap();
            assert!((p.angle - base.angle - delta * PI / 180.0).abs() < 1e-5);
        }
    }

    #[test]
    fn missing_eye_is_not_detected() {
        let lm = LandmarkSet::new(vec![Landmark::default(); 300]);
        match place(ProductFamily::Glasses, &lm, &AdjustmentState::default(), SQUARE) {
            Err(Error::FeatureNotDetected { feature }) => assert_eq!(feature, "RIGHT_EYE"),
            other => panic!("expected FeatureNotDetected, got {:?}", other),
        }
    }

    #[test]
    fn hat_sits_above_forehead() {
        let mut lm = face_with(&[(FOREHEAD, 0.5, 0.3), (TOP_HEAD, 0.5, 0.3)]);
        // Spread the forehead horizontally
        lm[109] = Landmark::new(0.4, 0.3, 0.0);
        lm[103] = Landmark::new(0.6, 0.3, 0.0);

        let adj = AdjustmentState {
            rotation: 10.0,
            y_offset: 5.0,
            ..Default::default()
        };
        let p = compute_placement("hat", &lm, &adj, AssetDimensions::new(200, 100)).unwrap();

        let forehead = FOREHEAD.summarize(&lm).unwrap();
        assert!((p.center_x - forehead.position.x).abs() < 1e-6);
        assert!((p.center_y - (forehead.position.y - HAT_LIFT)).abs() < 1e-6);
        assert!((p.width - 0.2 * HAT_WIDTH_FACTOR).abs() < 1e-5);
        assert!((p.height - p.width / 2.0).abs() < 1e-6);
        assert!((p.angle - 10.0f32.to_radians()).abs() < 1e-6);
        assert_eq!(p.y_offset_percent, 5.0);
    }

    #[test]
    fn unknown_family_is_rejected() {
        let lm = eyes((0.3, 0.5), (0.7, 0.5));
        match compute_placement("SHOES", &lm, &AdjustmentState::default(), SQUARE) {
            Err(Error::UnknownProductFamily(name)) => assert_eq!(name, "SHOES"),
            other => panic!("expected UnknownProductFamily, got {:?}", other),
        }
    }

    #[test]
    fn degenerate_asset_is_rejected() {
        let lm = eyes((0.3, 0.5), (0.7, 0.5));
        let result = place(
            ProductFamily::Glasses,
            &lm,
            &AdjustmentState::default(),
            AssetDimensions::new(0, 10),
        );
        assert!(matches!(result, Err(Error::InvalidAssetDimensions { .. })));
    }
}
