//! Binary Codec Tests
//!
//! Tests for:
//! - Primitive encoding and block framing
//! - Persisting meshes, FFD buffers and influence tables
//! - Signature, size and truncation failures with scoped error logs
//! - Progress reporting while decoding

use anyhow::Result;
use glam::{Mat4, Vec2, Vec3};

use marionette::RigError;
use marionette::animation::FfdBuffer;
use marionette::codec::{BLOCK_HEADER_SIZE, Deserializer, Persist, ProgressReporter, Serializer};
use marionette::mesh::{AlphaMask, GridMeshBuilder, MeshTopology};
use marionette::rig::Skeleton;
use marionette::skinning::{BoneWeightBuilder, WorkerPool};

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn square_mesh() -> Result<MeshTopology> {
    let alpha = (0..24 * 24u32)
        .map(|i| if (4..20).contains(&(i % 24)) && (4..20).contains(&(i / 24)) { 255 } else { 0 })
        .collect();
    let mask = AlphaMask::from_alpha(24, 24, alpha)?;
    Ok(GridMeshBuilder::create_from_image(&mask, 4)?.with_origin(Vec2::new(3.0, -2.0)))
}

#[derive(Default)]
struct RecordingReporter {
    maximum: usize,
    progress: Vec<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn set_maximum(&mut self, maximum: usize) {
        self.maximum = maximum;
    }

    fn set_progress(&mut self, value: usize) {
        self.progress.push(value);
    }
}

// ============================================================================
// Primitives
// ============================================================================

#[test]
fn primitives_are_little_endian_and_aligned() -> Result<()> {
    let mut out = Serializer::new();
    out.write_i32(-2)?;
    out.write_string("hello")?;
    out.write_bool(true)?;
    out.write_mat4(&Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)))?;
    let bytes = out.into_bytes();

    assert_eq!(&bytes[..4], &(-2i32).to_le_bytes());
    // length word, five bytes of text padded to eight
    assert_eq!(&bytes[4..8], &5i32.to_le_bytes());
    assert_eq!(&bytes[8..13], b"hello");
    assert_eq!(&bytes[13..16], &[0, 0, 0]);

    let mut input = Deserializer::new(&bytes);
    assert_eq!(input.read_i32()?, -2);
    assert_eq!(input.read_string()?, "hello");
    assert!(input.read_bool()?);
    let m = input.read_mat4()?;
    assert!(approx_eq(m.w_axis.y, 2.0), "Expected 2.0, got {}", m.w_axis.y);
    assert_eq!(input.remaining(), 0);
    Ok(())
}

#[test]
fn bool_words_other_than_zero_or_one_are_rejected() {
    let bytes = 2u32.to_le_bytes();
    let mut input = Deserializer::new(&bytes);
    let result = input.read_bool();
    assert!(matches!(result, Err(RigError::InvalidValue(_))), "Expected InvalidValue, got {result:?}");
    assert_eq!(input.log().len(), 1);
}

#[test]
fn unread_block_payload_is_a_size_mismatch() -> Result<()> {
    let mut out = Serializer::new();
    out.begin_block(b"TwoWords")?;
    out.write_u32(1)?;
    out.write_u32(2)?;
    out.end_block();
    let bytes = out.into_bytes();
    assert_eq!(bytes.len(), BLOCK_HEADER_SIZE + 8);

    let mut input = Deserializer::new(&bytes);
    input.begin_block(b"TwoWords")?;
    input.read_u32()?;
    let result = input.end_block();
    assert!(
        matches!(result, Err(RigError::SizeMismatch { expected: 8, actual: 4, .. })),
        "Expected SizeMismatch, got {result:?}"
    );
    Ok(())
}

// ============================================================================
// Persisted types
// ============================================================================

#[test]
fn mesh_is_restored_exactly() -> Result<()> {
    let mesh = square_mesh()?;
    let mut out = Serializer::new();
    mesh.serialize(&mut out)?;
    let bytes = out.into_bytes();

    let mut restored = MeshTopology::default();
    let mut input = Deserializer::new(&bytes);
    restored.deserialize(&mut input)?;

    assert_eq!(restored, mesh);
    assert_eq!(restored.origin, Vec2::new(3.0, -2.0));
    assert_eq!(input.remaining(), 0);
    assert!(input.log().is_empty());
    Ok(())
}

#[test]
fn consecutive_blocks_decode_in_order() -> Result<()> {
    let mesh = square_mesh()?;
    let ffd = FfdBuffer::new(mesh.positions().iter().map(|p| *p * 2.0).collect());

    let mut out = Serializer::new();
    mesh.serialize(&mut out)?;
    ffd.serialize(&mut out)?;
    let bytes = out.into_bytes();

    let mut input = Deserializer::new(&bytes);
    let mut restored_mesh = MeshTopology::default();
    let mut restored_ffd = FfdBuffer::default();
    restored_mesh.deserialize(&mut input)?;
    restored_ffd.deserialize(&mut input)?;

    assert_eq!(restored_ffd, ffd);
    assert_eq!(restored_ffd.len(), restored_mesh.vertex_count());
    Ok(())
}

#[test]
fn influence_table_is_restored() -> Result<()> {
    init_logger();
    let mut skeleton = Skeleton::new();
    let root = skeleton.add_bone(None, Vec2::ZERO, [Vec2::ZERO; 2]);
    skeleton.add_bone(Some(root), Vec2::new(20.0, 0.0), [Vec2::splat(6.0); 2]);
    skeleton.rebuild_shapes();

    let mesh = square_mesh()?;
    let builder = BoneWeightBuilder::new(WorkerPool::new(2)?);
    builder.set_max_bone_count(8);
    builder.allocate(mesh.vertex_count(), false);
    builder.write_async(&skeleton, Mat4::IDENTITY, mesh.positions())?;

    let mut out = Serializer::new();
    builder.serialize(&mut out)?;
    let bytes = out.into_bytes();

    let mut restored = BoneWeightBuilder::new(WorkerPool::new(1)?);
    restored.deserialize(&mut Deserializer::new(&bytes))?;

    assert_eq!(restored.max_bone_count(), 8);
    assert_eq!(restored.accessor().table(), builder.accessor().table());
    Ok(())
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn wrong_signature_leaves_target_untouched() -> Result<()> {
    init_logger();
    let mesh = square_mesh()?;
    let mut out = Serializer::new();
    mesh.serialize(&mut out)?;
    let bytes = out.into_bytes();

    let original = FfdBuffer::new(vec![Vec3::ONE]);
    let mut target = original.clone();
    let mut input = Deserializer::new(&bytes);
    let result = target.deserialize(&mut input);

    assert!(matches!(result, Err(RigError::BadSignature { .. })), "Expected BadSignature, got {result:?}");
    assert_eq!(target, original);
    assert!(input.log()[0].starts_with("FfdBuffer: "), "Expected a scoped message, got {:?}", input.log());
    Ok(())
}

#[test]
fn truncated_stream_names_the_failing_field() -> Result<()> {
    init_logger();
    // a block that claims far more positions than it carries
    let mut out = Serializer::new();
    out.begin_block(b"MeshTopo")?;
    out.write_len(1000)?;
    out.end_block();
    let bytes = out.into_bytes();

    let mut target = MeshTopology::default();
    let mut input = Deserializer::new(&bytes);
    let result = target.deserialize(&mut input);

    assert!(matches!(result, Err(RigError::Truncated { .. })), "Expected Truncated, got {result:?}");
    assert!(
        input.log().iter().any(|m| m.starts_with("MeshTopology > positions: ")),
        "Expected the positions scope in {:?}",
        input.log()
    );
    assert!(input.log_scopes().is_empty(), "Expected every scope popped");
    assert!(target.is_empty());
    Ok(())
}

#[test]
fn cut_off_block_fails_at_the_header() -> Result<()> {
    let mut out = Serializer::new();
    FfdBuffer::new(vec![Vec3::X; 4]).serialize(&mut out)?;
    let bytes = out.into_bytes();

    let mut target = FfdBuffer::default();
    let result = target.deserialize(&mut Deserializer::new(&bytes[..bytes.len() - 6]));
    assert!(matches!(result, Err(RigError::Truncated { .. })), "Expected Truncated, got {result:?}");
    assert!(target.is_empty());
    Ok(())
}

#[test]
fn zero_max_bone_count_is_rejected() -> Result<()> {
    let mut out = Serializer::new();
    out.begin_block(b"BoneInfl")?;
    out.write_len(0)?;
    out.write_len(0)?;
    out.end_block();
    let bytes = out.into_bytes();

    let mut target = BoneWeightBuilder::new(WorkerPool::new(1)?);
    let result = target.deserialize(&mut Deserializer::new(&bytes));
    assert!(matches!(result, Err(RigError::InvalidValue(_))), "Expected InvalidValue, got {result:?}");
    Ok(())
}

// ============================================================================
// Progress
// ============================================================================

#[test]
fn progress_reaches_the_end_of_the_stream() -> Result<()> {
    let mut out = Serializer::new();
    square_mesh()?.serialize(&mut out)?;
    let bytes = out.into_bytes();

    let mut reporter = RecordingReporter::default();
    {
        let mut input = Deserializer::new(&bytes).with_reporter(&mut reporter);
        MeshTopology::default().deserialize(&mut input)?;
    }
    assert_eq!(reporter.maximum, bytes.len());
    assert_eq!(reporter.progress.last().copied(), Some(bytes.len()));
    Ok(())
}
