//! Skin Palette Tests
//!
//! Tests for:
//! - Identity palette for an unposed skeleton
//! - Matrices and dual quaternions of a rotated bone
//! - Bone enumeration across several skeletons and the palette cap
//! - CPU skinning in linear and dual quaternion modes

use std::f32::consts::FRAC_PI_2;

use anyhow::Result;
use glam::{Mat4, Quat, Vec2, Vec3};

use marionette::rig::{BoneId, Skeleton};
use marionette::skinning::{
    BoneWeightBuilder, MAX_PALETTE_COUNT, PosePair, SkinPalette, SkinningMode, WorkerPool, skin_positions,
};

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec_approx_eq(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn mat_approx_eq(a: Mat4, b: Mat4) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

/// Root at the origin, bone 1 ending at x = 10, bone 2 ending at x = 20.
fn chain() -> (Skeleton, [BoneId; 3]) {
    let mut sk = Skeleton::new();
    let root = sk.add_bone(None, Vec2::ZERO, [Vec2::ZERO; 2]);
    let a = sk.add_bone(Some(root), Vec2::new(10.0, 0.0), [Vec2::splat(3.0); 2]);
    let b = sk.add_bone(Some(a), Vec2::new(20.0, 0.0), [Vec2::splat(3.0); 2]);
    sk.rebuild_shapes();
    (sk, [root, a, b])
}

/// Posed copy of `origin` with bone `id` turned by `angle`.
fn posed(origin: &Skeleton, id: BoneId, angle: f32) -> Skeleton {
    let mut pose = origin.create_shadow();
    if let Some(bone) = pose.get_mut(id) {
        bone.rotate = angle;
    }
    pose.update_all_world_transforms();
    pose
}

// ============================================================================
// Palette construction
// ============================================================================

#[test]
fn rest_pose_gives_identity_palette() {
    let (origin, _) = chain();
    let pose = origin.create_shadow();

    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);

    assert_eq!(palette.count(), 3);
    for (i, m) in palette.matrices().iter().enumerate() {
        assert!(mat_approx_eq(*m, Mat4::IDENTITY), "Expected identity for bone {i}, got {m:?}");
    }
}

#[test]
fn rotated_bone_swings_its_segment() {
    let (origin, [_, a, _]) = chain();
    let pose = posed(&origin, a, FRAC_PI_2);

    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);

    assert!(mat_approx_eq(palette.matrix(0), Mat4::IDENTITY), "Expected the root to stay put");

    let tip = palette.matrix(1).transform_point3(Vec3::new(10.0, 0.0, 0.0));
    assert!(vec_approx_eq(tip, Vec3::new(0.0, 10.0, 0.0)), "Expected (0, 10, 0), got {tip}");

    let mid = palette.matrix(1).transform_point3(Vec3::new(5.0, 0.0, 0.0));
    assert!(vec_approx_eq(mid, Vec3::new(0.0, 5.0, 0.0)), "Expected (0, 5, 0), got {mid}");

    // the child follows its parent
    let child_tip = palette.matrix(2).transform_point3(Vec3::new(20.0, 0.0, 0.0));
    assert!(vec_approx_eq(child_tip, Vec3::new(0.0, 20.0, 0.0)), "Expected (0, 20, 0), got {child_tip}");
}

#[test]
fn dual_quaternion_matches_matrix() {
    let (origin, [_, a, _]) = chain();
    let pose = posed(&origin, a, FRAC_PI_2);

    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);

    let dq = palette.dual_quaternions()[1];
    let rotation = dq.rotation();
    assert!(
        rotation.abs_diff_eq(Quat::from_rotation_z(FRAC_PI_2), EPSILON),
        "Expected a quarter turn, got {rotation:?}"
    );
    // the bone pivots on the root, so no residual translation
    let t = dq.translation();
    assert!(vec_approx_eq(t, Vec3::ZERO), "Expected zero translation, got {t}");
}

#[test]
fn out_of_range_entries_are_identity() {
    let (origin, _) = chain();
    let pose = origin.create_shadow();
    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);

    assert!(mat_approx_eq(palette.matrix(3), Mat4::IDENTITY));
    assert!(mat_approx_eq(palette.matrix(MAX_PALETTE_COUNT + 5), Mat4::IDENTITY));
    assert_eq!(palette.matrices_padded().len(), MAX_PALETTE_COUNT);
    assert_eq!(palette.dual_quaternion_bytes().len(), MAX_PALETTE_COUNT * 32);
}

#[test]
fn pairs_are_enumerated_in_order() {
    let (near, [_, a, _]) = chain();
    let near_pose = posed(&near, a, FRAC_PI_2);
    let (far, _) = chain();
    let far_pose = far.create_shadow();

    let mut palette = SkinPalette::new();
    palette.build(&[
        PosePair { origin: &near, pose: &near_pose },
        PosePair { origin: &far, pose: &far_pose },
    ]);

    assert_eq!(palette.count(), 6);
    assert!(!mat_approx_eq(palette.matrix(1), Mat4::IDENTITY), "Expected the first skeleton's bones first");
    for i in 3..6 {
        assert!(mat_approx_eq(palette.matrix(i), Mat4::IDENTITY), "Expected identity for bone {i}");
    }
}

#[test]
fn palette_is_capped() {
    let mut origin = Skeleton::new();
    let mut parent = origin.add_bone(None, Vec2::ZERO, [Vec2::ZERO; 2]);
    for i in 1..40 {
        parent = origin.add_bone(Some(parent), Vec2::new(i as f32 * 5.0, 0.0), [Vec2::ONE; 2]);
    }
    let pose = origin.create_shadow();

    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);
    assert_eq!(palette.count(), MAX_PALETTE_COUNT);
}

#[test]
fn clear_resets_to_identity() {
    let (origin, [_, a, _]) = chain();
    let pose = posed(&origin, a, 0.3);
    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);

    palette.clear();
    assert_eq!(palette.count(), 0);
    assert_eq!(palette, SkinPalette::default());
}

// ============================================================================
// CPU skinning
// ============================================================================

#[test]
fn skinning_follows_the_bound_bone() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let (origin, [_, a, _]) = chain();
    let pose = posed(&origin, a, FRAC_PI_2);
    let positions = vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(15.0, 0.0, 0.0)];

    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    builder.allocate(positions.len(), false);
    builder.write_async(&origin, Mat4::IDENTITY, &positions)?;
    let accessor = builder.accessor();

    let mut palette = SkinPalette::new();
    palette.build(&[PosePair { origin: &origin, pose: &pose }]);

    for mode in [SkinningMode::Linear, SkinningMode::DualQuaternion] {
        let skinned = skin_positions(&positions, &accessor, &palette, mode)?;
        assert!(
            vec_approx_eq(skinned[0], Vec3::new(0.0, 5.0, 0.0)),
            "Expected (0, 5, 0) in {mode:?}, got {}",
            skinned[0]
        );
        assert!(
            vec_approx_eq(skinned[1], Vec3::new(0.0, 15.0, 0.0)),
            "Expected (0, 15, 0) in {mode:?}, got {}",
            skinned[1]
        );
    }
    Ok(())
}

#[test]
fn skinning_rejects_mismatched_counts() -> Result<()> {
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    builder.allocate(2, true);
    let palette = SkinPalette::new();

    let result = skin_positions(&[Vec3::ZERO], &builder.accessor(), &palette, SkinningMode::Linear);
    assert!(result.is_err(), "Expected an error, got {result:?}");
    Ok(())
}

#[test]
fn unit_palette_leaves_positions_alone() -> Result<()> {
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    builder.allocate(1, true);
    let palette = SkinPalette::new();

    let skinned = skin_positions(&[Vec3::new(3.0, 4.0, 0.0)], &builder.accessor(), &palette, SkinningMode::Linear)?;
    assert!(approx_eq(skinned[0].x, 3.0) && approx_eq(skinned[0].y, 4.0), "Expected (3, 4), got {}", skinned[0]);
    Ok(())
}
