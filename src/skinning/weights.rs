//! Per-vertex bone influence tables.
//!
//! A table stores up to [`MAX_INFLUENCES`] `(bone index, weight)` pairs per
//! vertex, folded into two 4-wide rows ready for GPU upload. Tables are
//! rebuilt on a [`WorkerPool`] and published atomically: readers observe
//! either the previous complete table or the new complete table.

use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, UVec4, Vec2, Vec3, Vec4};
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};

use super::worker::WorkerPool;
use crate::errors::{Result, RigError};
use crate::rig::{BoneShape, Skeleton};
use crate::settings::RigSettings;

/// Influences stored per GPU row.
pub const BONES_PER_ROW: usize = 4;
/// Influences stored per vertex across both rows.
pub const MAX_INFLUENCES: usize = 2 * BONES_PER_ROW;

// ============================================================================
// Top-K collector
// ============================================================================

/// Fixed-capacity set of the strongest influences seen for one vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopK {
    ids: [u32; MAX_INFLUENCES],
    weights: [f32; MAX_INFLUENCES],
    count: usize,
}

impl TopK {
    /// Records `(id, weight)`. Once full, replaces the weakest entry if
    /// `weight` is larger than it.
    pub fn try_push(&mut self, id: u32, weight: f32) {
        if self.count < MAX_INFLUENCES {
            self.ids[self.count] = id;
            self.weights[self.count] = weight;
            self.count += 1;
            return;
        }

        let mut min_index = None;
        let mut min_weight = weight;
        for (i, &w) in self.weights.iter().enumerate() {
            if w < min_weight {
                min_index = Some(i);
                min_weight = w;
            }
        }
        if let Some(i) = min_index {
            self.ids[i] = id;
            self.weights[i] = weight;
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.ids[..self.count].iter().copied().zip(self.weights[..self.count].iter().copied())
    }
}

// ============================================================================
// Table
// ============================================================================

/// Published influence rows for every vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfluenceTable {
    pub indices: [Vec<UVec4>; 2],
    pub weights: [Vec<Vec4>; 2],
}

impl InfluenceTable {
    fn zeroed(vertex_count: usize) -> Self {
        Self {
            indices: [vec![UVec4::ZERO; vertex_count], vec![UVec4::ZERO; vertex_count]],
            weights: [vec![Vec4::ZERO; vertex_count], vec![Vec4::ZERO; vertex_count]],
        }
    }

    /// Every vertex fully bound to bone 0.
    fn bound_to_first(vertex_count: usize) -> Self {
        let mut table = Self::zeroed(vertex_count);
        table.weights[0].fill(Vec4::X);
        table
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.indices[0].len()
    }

    fn set(&mut self, vertex: usize, slot: usize, id: u32, weight: f32) {
        let row = slot / BONES_PER_ROW;
        let lane = slot % BONES_PER_ROW;
        self.indices[row][vertex][lane] = id;
        self.weights[row][vertex][lane] = weight;
    }

    /// Folds collected influences into rows, normalizing each vertex.
    fn from_influences(tops: &[TopK], min_weight_sum: f32) -> Self {
        let mut table = Self::zeroed(tops.len());
        for (v, top) in tops.iter().enumerate() {
            match top.len() {
                0 => table.set(v, 0, 0, 1.0),
                1 => table.set(v, 0, top.ids[0], 1.0),
                count => {
                    let sum: f32 = top.weights[..count].iter().sum();
                    let (rate, add) = if sum >= min_weight_sum {
                        (1.0 / sum, 0.0)
                    } else {
                        (1.0, (1.0 - sum) / count as f32)
                    };
                    for (slot, (id, weight)) in top.iter().enumerate() {
                        table.set(v, slot, id, weight * rate + add);
                    }
                }
            }
        }
        table
    }
}

/// Read-only view of a complete influence table.
#[derive(Debug, Clone)]
pub struct InfluenceAccessor {
    table: Arc<InfluenceTable>,
}

impl InfluenceAccessor {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.table.vertex_count()
    }

    #[must_use]
    pub fn indices0(&self) -> &[UVec4] {
        &self.table.indices[0]
    }

    #[must_use]
    pub fn indices1(&self) -> &[UVec4] {
        &self.table.indices[1]
    }

    #[must_use]
    pub fn weights0(&self) -> &[Vec4] {
        &self.table.weights[0]
    }

    #[must_use]
    pub fn weights1(&self) -> &[Vec4] {
        &self.table.weights[1]
    }

    #[must_use]
    pub fn table(&self) -> &InfluenceTable {
        &self.table
    }

    /// Non-zero `(bone index, weight)` pairs of one vertex, row 0 first.
    #[must_use]
    pub fn influences(&self, vertex: usize) -> SmallVec<[(u32, f32); MAX_INFLUENCES]> {
        let mut out = SmallVec::new();
        if vertex >= self.vertex_count() {
            return out;
        }
        for row in 0..2 {
            let ids = self.table.indices[row][vertex].to_array();
            let weights = self.table.weights[row][vertex].to_array();
            out.extend(ids.into_iter().zip(weights).filter(|(_, w)| *w != 0.0));
        }
        out
    }
}

// ============================================================================
// Build task
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Pending,
    Running,
    Done,
}

struct BuildTask {
    cancel: AtomicBool,
    state: Mutex<TaskState>,
    finished: Condvar,
}

impl BuildTask {
    fn new() -> Self {
        Self { cancel: AtomicBool::new(false), state: Mutex::new(TaskState::Pending), finished: Condvar::new() }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Requests cancellation. A task that has not started yet is retired
    /// immediately so that waiters never depend on a worker picking it up.
    fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        let mut state = self.state.lock();
        if *state == TaskState::Pending {
            *state = TaskState::Done;
            self.finished.notify_all();
        }
    }

    /// Moves a pending task to running. False if it was retired already.
    fn start(&self) -> bool {
        let mut state = self.state.lock();
        if *state != TaskState::Pending || self.is_cancelled() {
            *state = TaskState::Done;
            self.finished.notify_all();
            return false;
        }
        *state = TaskState::Running;
        true
    }

    fn finish(&self) {
        *self.state.lock() = TaskState::Done;
        self.finished.notify_all();
    }

    fn is_done(&self) -> bool {
        *self.state.lock() == TaskState::Done
    }

    fn wait(&self) {
        let mut state = self.state.lock();
        while *state != TaskState::Done {
            self.finished.wait(&mut state);
        }
    }
}

#[derive(Clone)]
struct BoneParam {
    has_parent: bool,
    has_range: bool,
    shape: Option<BoneShape>,
}

struct BuildJob {
    task: Arc<BuildTask>,
    published: Arc<RwLock<Arc<InfluenceTable>>>,
    positions: Vec<Vec3>,
    group: Mat4,
    bones: Vec<BoneParam>,
    weight_epsilon: f32,
    min_weight_sum: f32,
}

impl BuildJob {
    fn run(self) {
        if !self.task.start() {
            trace!("Influence build retired before start");
            return;
        }
        self.build();
        self.task.finish();
    }

    fn build(&self) {
        let started = Instant::now();

        // transform phase
        let vertices: Vec<Vec2> =
            self.positions.iter().map(|p| self.group.transform_point3(*p).truncate()).collect();
        if self.task.is_cancelled() {
            return;
        }
        trace!("influence transform: {} vertices in {:?}", vertices.len(), started.elapsed());

        // weight phase
        let mut tops = vec![TopK::default(); vertices.len()];
        for (index, param) in self.bones.iter().enumerate() {
            let Some(shape) = param.shape.as_ref().filter(|_| param.has_parent && param.has_range) else {
                continue;
            };
            for (top, vertex) in tops.iter_mut().zip(&vertices) {
                let weight = shape.influence(*vertex);
                if weight >= self.weight_epsilon {
                    top.try_push(index as u32, weight);
                }
            }
            if self.task.is_cancelled() {
                return;
            }
        }
        trace!("influence weights: {} bones in {:?}", self.bones.len(), started.elapsed());

        // attribute phase
        let table = InfluenceTable::from_influences(&tops, self.min_weight_sum);
        if self.task.is_cancelled() {
            return;
        }
        *self.published.write() = Arc::new(table);
        debug!("Influence table built for {} vertices in {:?}", vertices.len(), started.elapsed());
    }
}

// ============================================================================
// Builder
// ============================================================================

struct Control {
    task: Option<Arc<BuildTask>>,
    max_bone_count: usize,
}

/// Owner of one influence table and its background rebuilds.
///
/// At most one build is outstanding: every `allocate` or `write_async`
/// cancels and waits out the previous build first.
pub struct BoneWeightBuilder {
    pool: WorkerPool,
    published: Arc<RwLock<Arc<InfluenceTable>>>,
    control: Mutex<Control>,
    weight_epsilon: f32,
    min_weight_sum: f32,
}

impl BoneWeightBuilder {
    #[must_use]
    pub fn new(pool: WorkerPool) -> Self {
        Self::with_settings(pool, &RigSettings::default())
    }

    #[must_use]
    pub fn with_settings(pool: WorkerPool, settings: &RigSettings) -> Self {
        let settings = settings.sanitized();
        Self {
            pool,
            published: Arc::new(RwLock::new(Arc::new(InfluenceTable::default()))),
            control: Mutex::new(Control { task: None, max_bone_count: settings.max_bone_count }),
            weight_epsilon: settings.weight_epsilon,
            min_weight_sum: settings.min_weight_sum,
        }
    }

    #[must_use]
    pub fn max_bone_count(&self) -> usize {
        self.control.lock().max_bone_count
    }

    /// Must not be called while a build is outstanding.
    pub fn set_max_bone_count(&self, count: usize) {
        let mut control = self.control.lock();
        let building = control.task.as_ref().is_some_and(|t| !t.is_done());
        debug_assert!(!building, "set_max_bone_count called during a build");
        if building {
            warn!("Ignoring max bone count change while an influence build is outstanding");
            return;
        }
        control.max_bone_count = count;
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.published.read().vertex_count()
    }

    #[must_use]
    pub fn is_building(&self) -> bool {
        self.control.lock().task.as_ref().is_some_and(|t| !t.is_done())
    }

    /// Cancels the outstanding build, if any, without waiting for it.
    pub fn cancel(&self) {
        if let Some(task) = &self.control.lock().task {
            task.cancel();
        }
    }

    fn cancel_and_wait(control: &mut Control) {
        if let Some(task) = control.task.take() {
            task.cancel();
            task.wait();
        }
    }

    /// Resizes the table to `vertex_count` vertices. With `initialize`,
    /// every vertex is bound fully to bone 0.
    pub fn allocate(&self, vertex_count: usize, initialize: bool) {
        let mut control = self.control.lock();
        Self::cancel_and_wait(&mut control);

        let mut published = self.published.write();
        if initialize {
            *published = Arc::new(InfluenceTable::bound_to_first(vertex_count));
        } else if published.vertex_count() != vertex_count {
            *published = Arc::new(InfluenceTable::zeroed(vertex_count));
        }
    }

    /// Starts a background rebuild from `skeleton` over `positions`, each
    /// transformed by `group` into the skeleton's space first.
    pub fn write_async(&self, skeleton: &Skeleton, group: Mat4, positions: &[Vec3]) -> Result<()> {
        let mut control = self.control.lock();
        debug_assert!(control.max_bone_count > 0, "write_async with zero max bone count");
        if control.max_bone_count == 0 {
            warn!("Skipping influence build: max bone count is zero");
            return Ok(());
        }
        Self::cancel_and_wait(&mut control);

        let vertex_count = self.published.read().vertex_count();
        if positions.len() != vertex_count {
            return Err(RigError::VertexCountMismatch { expected: vertex_count, actual: positions.len() });
        }

        let bones: Vec<BoneParam> = skeleton
            .pre_order()
            .take(control.max_bone_count)
            .map(|(_, bone)| {
                let has_parent = bone.parent().is_some();
                BoneParam {
                    has_parent,
                    has_range: has_parent && bone.has_valid_range(),
                    shape: has_parent.then(|| bone.shape.clone()),
                }
            })
            .collect();

        let task = Arc::new(BuildTask::new());
        let job = BuildJob {
            task: Arc::clone(&task),
            published: Arc::clone(&self.published),
            positions: positions.to_vec(),
            group,
            bones,
            weight_epsilon: self.weight_epsilon,
            min_weight_sum: self.min_weight_sum,
        };
        debug!("Submitting influence build: {} vertices, {} bones", vertex_count, job.bones.len());

        if let Err(err) = self.pool.submit(move || job.run()) {
            task.cancel();
            return Err(err);
        }
        control.task = Some(task);
        Ok(())
    }

    /// Blocks until any outstanding build finishes, then returns the table.
    #[must_use]
    pub fn accessor(&self) -> InfluenceAccessor {
        let task = self.control.lock().task.clone();
        if let Some(task) = task {
            task.wait();
        }
        InfluenceAccessor { table: Arc::clone(&self.published.read()) }
    }

    /// The current table, or `None` while a build is outstanding.
    #[must_use]
    pub fn try_accessor(&self) -> Option<InfluenceAccessor> {
        if self.is_building() {
            return None;
        }
        Some(InfluenceAccessor { table: Arc::clone(&self.published.read()) })
    }

    /// Replaces the table with decoded rows. Cancels any outstanding build.
    pub fn restore(&self, table: InfluenceTable, max_bone_count: usize) {
        let mut control = self.control.lock();
        Self::cancel_and_wait(&mut control);
        control.max_bone_count = max_bone_count;
        *self.published.write() = Arc::new(table);
    }
}

impl Drop for BoneWeightBuilder {
    fn drop(&mut self) {
        if let Some(task) = self.control.get_mut().task.take() {
            task.cancel();
        }
    }
}

impl std::fmt::Debug for BoneWeightBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoneWeightBuilder")
            .field("vertex_count", &self.vertex_count())
            .field("max_bone_count", &self.max_bone_count())
            .field("building", &self.is_building())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_replaces_weakest_once_full() {
        let mut top = TopK::default();
        for i in 0..MAX_INFLUENCES as u32 {
            top.try_push(i, 0.1 + i as f32 * 0.1);
        }
        top.try_push(99, 0.05);
        assert!(top.iter().all(|(id, _)| id != 99));

        top.try_push(42, 0.5);
        assert_eq!(top.len(), MAX_INFLUENCES);
        assert!(top.iter().any(|(id, _)| id == 42));
        assert!(top.iter().all(|(id, _)| id != 0));
    }

    #[test]
    fn low_coverage_spreads_the_shortfall() {
        let mut top = TopK::default();
        top.try_push(1, 0.002);
        top.try_push(2, 0.004);
        let table = InfluenceTable::from_influences(&[top], 0.01);
        let w = table.weights[0][0];
        assert!((w.x + w.y - 1.0).abs() < 1e-6);
        assert!(w.x < w.y);
    }

    #[test]
    fn cancelled_pending_task_is_retired() {
        let task = BuildTask::new();
        task.cancel();
        assert!(task.is_done());
        assert!(!task.start());
        task.wait();
    }
}
