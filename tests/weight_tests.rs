//! Bone Weight Builder Tests
//!
//! Tests for:
//! - Per-vertex weights summing to one across both rows
//! - Dominant bone selection along a two-bone chain
//! - Rigid single-bone rows away from the joint
//! - Fallback binding of uncovered vertices to bone 0
//! - Rebuild idempotence and the group transform
//! - Cancellation of a build that has not started yet
//! - Vertex count validation

use std::sync::mpsc;

use anyhow::Result;
use glam::{Mat4, Vec2, Vec3};

use marionette::RigError;
use marionette::rig::Skeleton;
use marionette::skinning::{BoneWeightBuilder, WorkerPool};

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Root at the origin, bone 1 ending at x = 10, bone 2 ending at x = 20.
fn chain() -> Skeleton {
    let mut sk = Skeleton::new();
    let root = sk.add_bone(None, Vec2::ZERO, [Vec2::ZERO; 2]);
    let a = sk.add_bone(Some(root), Vec2::new(10.0, 0.0), [Vec2::splat(3.0); 2]);
    sk.add_bone(Some(a), Vec2::new(20.0, 0.0), [Vec2::splat(3.0); 2]);
    sk.rebuild_shapes();
    sk
}

fn dominant_bone(builder: &BoneWeightBuilder, vertex: usize) -> Option<u32> {
    builder
        .accessor()
        .influences(vertex)
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

// ============================================================================
// Weights
// ============================================================================

#[test]
fn weights_sum_to_one() -> Result<()> {
    init_logger();
    let pool = WorkerPool::new(2)?;
    let builder = BoneWeightBuilder::new(pool);
    let positions: Vec<Vec3> = (0..=20)
        .flat_map(|x| [-1.0, 0.0, 1.0].map(|y| Vec3::new(x as f32, y, 0.0)))
        .collect();

    builder.allocate(positions.len(), false);
    builder.write_async(&chain(), Mat4::IDENTITY, &positions)?;
    let accessor = builder.accessor();

    assert_eq!(accessor.vertex_count(), positions.len());
    for v in 0..positions.len() {
        let sum: f32 = accessor.influences(v).iter().map(|(_, w)| w).sum();
        assert!(approx_eq(sum, 1.0), "Expected 1.0 at vertex {v}, got {sum}");
    }
    Ok(())
}

#[test]
fn each_half_follows_its_own_bone() -> Result<()> {
    init_logger();
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    let positions = vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(15.0, 0.0, 0.0)];

    builder.allocate(positions.len(), false);
    builder.write_async(&chain(), Mat4::IDENTITY, &positions)?;

    assert_eq!(dominant_bone(&builder, 0), Some(1), "Expected bone 1 near the first segment");
    assert_eq!(dominant_bone(&builder, 1), Some(2), "Expected bone 2 near the second segment");
    Ok(())
}

#[test]
fn quad_away_from_the_joint_binds_rigidly() -> Result<()> {
    init_logger();
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    let positions = vec![
        Vec3::new(4.0, -1.0, 0.0),
        Vec3::new(4.0, 1.0, 0.0),
        Vec3::new(16.0, 1.0, 0.0),
        Vec3::new(16.0, -1.0, 0.0),
    ];

    builder.allocate(positions.len(), false);
    builder.write_async(&chain(), Mat4::IDENTITY, &positions)?;

    let accessor = builder.accessor();
    for (vertex, bone) in [(0, 1u32), (1, 1), (2, 2), (3, 2)] {
        let influences = accessor.influences(vertex);
        assert_eq!(
            influences.as_slice(),
            &[(bone, 1.0)],
            "Expected vertex {vertex} fully on bone {bone}, got {influences:?}"
        );
    }
    Ok(())
}

#[test]
fn uncovered_vertex_binds_to_first_bone() -> Result<()> {
    init_logger();
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    let positions = vec![Vec3::new(500.0, 500.0, 0.0)];

    builder.allocate(1, false);
    builder.write_async(&chain(), Mat4::IDENTITY, &positions)?;

    let influences = builder.accessor().influences(0);
    assert_eq!(influences.len(), 1, "Expected a single influence, got {influences:?}");
    assert_eq!(influences[0].0, 0);
    assert!(approx_eq(influences[0].1, 1.0), "Expected 1.0, got {}", influences[0].1);
    Ok(())
}

#[test]
fn group_transform_moves_vertices_into_skeleton_space() -> Result<()> {
    init_logger();
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    // vertices authored 100 px to the left of the skeleton
    let positions = vec![Vec3::new(-95.0, 0.0, 0.0), Vec3::new(-85.0, 0.0, 0.0)];
    let group = Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0));

    builder.allocate(positions.len(), false);
    builder.write_async(&chain(), group, &positions)?;

    assert_eq!(dominant_bone(&builder, 0), Some(1));
    assert_eq!(dominant_bone(&builder, 1), Some(2));
    Ok(())
}

#[test]
fn rebuild_is_idempotent() -> Result<()> {
    init_logger();
    let builder = BoneWeightBuilder::new(WorkerPool::new(2)?);
    let positions: Vec<Vec3> = (0..40).map(|i| Vec3::new(i as f32 * 0.5, (i % 5) as f32 - 2.0, 0.0)).collect();
    let skeleton = chain();

    builder.allocate(positions.len(), false);
    builder.write_async(&skeleton, Mat4::IDENTITY, &positions)?;
    let first = builder.accessor().table().clone();

    builder.write_async(&skeleton, Mat4::IDENTITY, &positions)?;
    let second = builder.accessor().table().clone();

    assert_eq!(first, second, "Expected identical tables from identical inputs");
    Ok(())
}

#[test]
fn initialize_binds_every_vertex_to_bone_zero() -> Result<()> {
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    builder.allocate(3, true);
    let accessor = builder.accessor();
    for v in 0..3 {
        let w = accessor.weights0()[v];
        assert!(approx_eq(w.x, 1.0), "Expected 1.0, got {}", w.x);
        assert_eq!(accessor.indices0()[v].x, 0);
    }
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn cancel_before_start_releases_readers() -> Result<()> {
    init_logger();
    let pool = WorkerPool::new(1)?;
    let (release, blocked) = mpsc::channel::<()>();
    // occupy the only worker so the build stays queued
    pool.submit(move || {
        let _ = blocked.recv();
    })?;

    let builder = BoneWeightBuilder::new(pool);
    let positions = vec![Vec3::new(5.0, 0.0, 0.0)];
    builder.allocate(1, false);
    builder.write_async(&chain(), Mat4::IDENTITY, &positions)?;
    assert!(builder.is_building());
    assert!(builder.try_accessor().is_none(), "Expected no accessor while building");

    builder.cancel();
    assert!(!builder.is_building(), "Expected the queued build to retire on cancel");
    assert!(builder.try_accessor().is_some());

    release.send(())?;
    Ok(())
}

#[test]
fn position_count_must_match_allocation() -> Result<()> {
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    builder.allocate(2, false);
    let err = builder.write_async(&chain(), Mat4::IDENTITY, &[Vec3::ZERO]);
    assert!(
        matches!(err, Err(RigError::VertexCountMismatch { expected: 2, actual: 1 })),
        "Expected VertexCountMismatch, got {err:?}"
    );
    Ok(())
}

#[test]
fn max_bone_count_limits_considered_bones() -> Result<()> {
    let builder = BoneWeightBuilder::new(WorkerPool::new(1)?);
    builder.set_max_bone_count(2);
    assert_eq!(builder.max_bone_count(), 2);

    let positions = vec![Vec3::new(15.0, 0.0, 0.0)];
    builder.allocate(1, false);
    builder.write_async(&chain(), Mat4::IDENTITY, &positions)?;
    let influences = builder.accessor().influences(0);
    assert!(influences.iter().all(|(id, _)| *id < 2), "Expected only bones 0 and 1, got {influences:?}");
    Ok(())
}
