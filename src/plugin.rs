use std::time::Instant;

use bevy::{
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};

use crate::error::{LevelSetError, Result};
use crate::extract::{classify_cells, emit_primitives};
use crate::field::ScalarField;
use crate::grid::SampleGrid;
use crate::mesh::{
    GeneratedBuffers, grid_mesh, grid_wireframe, points_mesh, predicted_buffer_bytes,
    sample_points, surface_mesh, surface_normals,
};
use crate::types::{Dimension, Value};

/// Default ceiling on the bytes a single recomputation may upload.
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 256 * 1024 * 1024;

/// System sets for the extraction pipeline.
///
/// Use these to order your own systems relative to extraction:
///
/// ```rust,ignore
/// // Inspect freshly staged buffers before they reach the GPU meshes:
/// app.add_systems(Update, validate_counts.after(LevelSetSet::Poll)
///                                         .before(LevelSetSet::Upload));
/// ```
///
/// ```text
/// LevelSetSet::Queue  →  [async compute]  →  LevelSetSet::Poll  →  [your systems]  →  LevelSetSet::Upload
/// ```
///
/// Animation time advances before [`LevelSetSet::Queue`], so a refresh
/// spawned in the same frame already sees the new time.
///
/// Schedule systems that mutate [`LevelSetSettings`] before
/// [`Queue`](Self::Queue). A mutation later in the frame cannot supersede
/// the task at spawn, so any result staged under it is discarded at the
/// swap and recomputed by the next queued extraction.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LevelSetSet {
    /// Spawns an async extraction task when the settings change.
    Queue,
    /// Polls the in-flight task and stages finished buffers.
    Poll,
    /// Swaps staged buffers into the persistent mesh assets.
    Upload,
}

/// Extraction inputs, mutated through setters that mark the settings dirty.
///
/// The queue system snapshots the settings once per recomputation, so a
/// burst of changes within one frame still costs a single extraction.
#[derive(Resource, Debug, Clone)]
pub struct LevelSetSettings {
    dimension: Dimension,
    resolution: u32,
    field: ScalarField,
    threshold: Value,
    animating: bool,
    time: f32,
    dirty: bool,
}

impl Default for LevelSetSettings {
    fn default() -> Self {
        Self {
            dimension: Dimension::Three,
            resolution: 32,
            field: ScalarField::Sphere,
            threshold: 0.0,
            animating: false,
            time: 0.0,
            // Dirty from the start so the first frame extracts.
            dirty: true,
        }
    }
}

impl LevelSetSettings {
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn field(&self) -> ScalarField {
        self.field
    }

    pub fn threshold(&self) -> Value {
        self.threshold
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Field time of the next recomputation, in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Switches the grid dimension, and with it the primitive kind.
    pub fn set_dimension(&mut self, dimension: Dimension) {
        if self.dimension != dimension {
            self.dimension = dimension;
            self.dirty = true;
        }
    }

    /// Sets the samples per axis. Anything below the two samples needed to
    /// form a cell is rejected and the current value stays in place.
    pub fn set_resolution(&mut self, resolution: u32) -> Result<()> {
        if resolution < 2 {
            return Err(LevelSetError::ResolutionTooSmall(resolution));
        }
        if self.resolution != resolution {
            self.resolution = resolution;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn set_field(&mut self, field: ScalarField) {
        if self.field != field {
            self.field = field;
            self.dirty = true;
        }
    }

    /// Cycles to the next built-in field.
    pub fn next_field(&mut self) {
        self.set_field(self.field.next());
    }

    /// Selects a field by its index in the cyclic order, rejecting unknown
    /// indices with the current field retained.
    pub fn set_field_index(&mut self, index: usize) -> Result<()> {
        self.set_field(ScalarField::from_index(index)?);
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: Value) {
        if self.threshold != threshold {
            self.threshold = threshold;
            self.dirty = true;
        }
    }

    /// Starts or stops animation. Not a dirty-making change: animation
    /// refreshes are spawned between recomputations instead of superseding
    /// them.
    pub fn set_animating(&mut self, animating: bool) {
        self.animating = animating;
    }

    pub fn toggle_animating(&mut self) {
        self.animating = !self.animating;
    }

    pub(crate) fn advance_time(&mut self, delta: f32) {
        self.time += delta;
    }

    /// Whether a settings change is still waiting for a recomputation.
    ///
    /// Results staged while this is `true` are discarded at the swap.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Consumes the pending-change flag, claiming any unsnapshotted change
    /// for the caller's recomputation.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// Fixed limits of the pipeline, inserted by [`LevelSetPlugin`].
#[derive(Resource, Debug, Clone, Copy)]
pub struct LevelSetConfig {
    /// Upper bound on the bytes one recomputation may upload.
    pub max_buffer_bytes: usize,
}

/// Handles to the three persistent meshes plus bookkeeping from the most
/// recent upload.
///
/// The handles are created once at startup and never replaced; uploads swap
/// the asset behind each handle, so every entity rendering them follows
/// each recomputation automatically.
#[derive(Resource, Debug)]
pub struct LevelSetBuffers {
    /// The grid wireframe mesh.
    pub grid: Handle<Mesh>,
    /// The sample-point mesh.
    pub points: Handle<Mesh>,
    /// The extracted-surface mesh.
    pub surface: Handle<Mesh>,
    /// Sizes of the last successful upload.
    pub counts: BufferCounts,
    /// The most recent extraction failure, cleared by the next success.
    pub last_error: Option<LevelSetError>,
}

/// Vertex counts of the most recently uploaded buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferCounts {
    pub grid_vertices: usize,
    pub point_vertices: usize,
    pub surface_vertices: usize,
    pub surface_primitives: usize,
}

/// Marks the entity rendering the grid wireframe. Spawned hidden.
#[derive(Component)]
pub struct GridWireframe;

/// Marks the entity rendering the grid samples as points. Spawned hidden.
#[derive(Component)]
pub struct SamplePoints;

/// Marks the entity rendering the extracted surface.
#[derive(Component)]
pub struct ExtractedSurface;

/// Bookkeeping for the in-flight extraction task.
///
/// Every spawned task carries a generation number. Installing a new task
/// drops the superseded one, which cancels it, and a result that still
/// arrives from an older generation is discarded at poll time.
#[derive(Resource, Default)]
pub struct ExtractionState {
    generation: u64,
    inflight: Option<InFlightExtraction>,
}

struct InFlightExtraction {
    generation: u64,
    task: Task<Result<GeneratedBuffers>>,
}

impl ExtractionState {
    /// Whether a task is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.inflight.is_some()
    }

    /// Current generation, bumped by every [`begin`](Self::begin).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Installs a new in-flight task, superseding any previous one, and
    /// returns its generation.
    pub fn begin(&mut self, task: Task<Result<GeneratedBuffers>>) -> u64 {
        self.generation += 1;
        self.inflight = Some(InFlightExtraction {
            generation: self.generation,
            task,
        });
        self.generation
    }

    /// Whether a finished task of the given generation is still current.
    fn accepts(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

/// Staging slot between [`LevelSetSet::Poll`] and [`LevelSetSet::Upload`].
#[derive(Resource, Default)]
pub(crate) struct PendingUpload(Option<GeneratedBuffers>);

/// Snapshot of the settings one extraction task computes from.
#[derive(Debug, Clone, Copy)]
struct ExtractionRequest {
    dimension: Dimension,
    resolution: u32,
    field: ScalarField,
    threshold: Value,
    time: f32,
    max_buffer_bytes: usize,
}

/// Bevy plugin that keeps level-set geometry in sync with its settings.
///
/// The plugin owns three persistent mesh assets (grid wireframe, sample
/// points, extracted surface), recomputes them on Bevy's
/// `AsyncComputeTaskPool` whenever [`LevelSetSettings`] changes and swaps
/// the results in whole, so the main thread is never blocked and no frame
/// renders a half-updated buffer:
///
/// ```text
/// Settings change
///   → task spawned                 (LevelSetSet::Queue)
///   → [async compute runs]
///   → buffers staged               (LevelSetSet::Poll, once the task completes)
///   → [your systems here]
///   → mesh assets replaced         (LevelSetSet::Upload)
/// ```
///
/// Rendering is left to the app: query the [`GridWireframe`],
/// [`SamplePoints`] and [`ExtractedSurface`] marker entities and attach
/// whatever materials fit.
pub struct LevelSetPlugin {
    /// Settings inserted at build time.
    pub settings: LevelSetSettings,
    /// Initial value for [`LevelSetConfig::max_buffer_bytes`].
    pub max_buffer_bytes: usize,
}

impl Default for LevelSetPlugin {
    fn default() -> Self {
        Self {
            settings: LevelSetSettings::default(),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }
}

impl Plugin for LevelSetPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.settings.clone())
            .insert_resource(LevelSetConfig {
                max_buffer_bytes: self.max_buffer_bytes,
            })
            .init_resource::<ExtractionState>()
            .init_resource::<PendingUpload>()
            .configure_sets(
                Update,
                (LevelSetSet::Queue, LevelSetSet::Poll, LevelSetSet::Upload).chain(),
            )
            .add_systems(Startup, create_buffers)
            .add_systems(
                Update,
                (
                    advance_animation.before(LevelSetSet::Queue),
                    poll_extractions.in_set(LevelSetSet::Poll),
                    upload_buffers.in_set(LevelSetSet::Upload),
                ),
            );

        #[cfg(feature = "auto_extract")]
        app.add_systems(Update, queue_extractions.in_set(LevelSetSet::Queue));
    }
}

/// Creates the three persistent meshes, empty until the first extraction
/// lands, and spawns an entity rendering each one.
fn create_buffers(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    let grid = meshes.add(grid_mesh(Vec::new(), Vec::new()));
    let points = meshes.add(points_mesh(Vec::new()));
    let surface = meshes.add(surface_mesh(Dimension::default(), Vec::new(), Vec::new()));

    commands.spawn((GridWireframe, Mesh3d(grid.clone()), Visibility::Hidden));
    commands.spawn((SamplePoints, Mesh3d(points.clone()), Visibility::Hidden));
    commands.spawn((ExtractedSurface, Mesh3d(surface.clone()), Visibility::Visible));

    commands.insert_resource(LevelSetBuffers {
        grid,
        points,
        surface,
        counts: BufferCounts::default(),
        last_error: None,
    });
}

fn advance_animation(time: Res<Time>, mut settings: ResMut<LevelSetSettings>) {
    if settings.animating {
        settings.advance_time(time.delta_secs());
    }
}

/// Snapshots dirty settings and spawns the extraction task, superseding any
/// in-flight one. Animation spawns a refresh only while idle, so a slow
/// extraction is never cancelled by the frames ticking past it.
///
/// Registered automatically under the `auto_extract` feature; without it,
/// add this system (or a custom one driving [`ExtractionState::begin`]) to
/// [`LevelSetSet::Queue`]. A custom queue must consume
/// [`LevelSetSettings::take_dirty`] when it snapshots the settings, or the
/// swap gate will treat its results as superseded.
pub fn queue_extractions(
    config: Res<LevelSetConfig>,
    mut settings: ResMut<LevelSetSettings>,
    mut state: ResMut<ExtractionState>,
) {
    let refresh = settings.animating && !state.is_busy();
    if !settings.take_dirty() && !refresh {
        return;
    }

    let request = ExtractionRequest {
        dimension: settings.dimension,
        resolution: settings.resolution,
        field: settings.field,
        threshold: settings.threshold,
        time: settings.time,
        max_buffer_bytes: config.max_buffer_bytes,
    };
    let task = AsyncComputeTaskPool::get().spawn(async move { run_extraction(request) });
    let generation = state.begin(task);
    debug!("queued extraction generation {generation}: {request:?}");
}

/// Polls the in-flight task each frame and stages its buffers on
/// completion.
///
/// Non-blocking: an unfinished task is put back and retried next frame.
fn poll_extractions(
    mut state: ResMut<ExtractionState>,
    mut buffers: ResMut<LevelSetBuffers>,
    mut pending: ResMut<PendingUpload>,
) {
    let Some(mut inflight) = state.inflight.take() else {
        return;
    };
    let Some(result) = block_on(future::poll_once(&mut inflight.task)) else {
        state.inflight = Some(inflight);
        return;
    };

    if !state.accepts(inflight.generation) {
        debug!(
            "discarding extraction result from superseded generation {}",
            inflight.generation
        );
        return;
    }

    match result {
        Ok(generated) => pending.0 = Some(generated),
        Err(error) => {
            error!("extraction failed, keeping previous buffers: {error}");
            buffers.last_error = Some(error);
        }
    }
}

/// Moves staged buffers into the persistent mesh assets.
///
/// The vertex data Vecs are **moved** into the new meshes with no copies,
/// and each asset is replaced whole behind its stable handle. Buffers
/// staged under settings that changed later in the same frame are dropped
/// unswapped; the dirty settings queue a fresh extraction next frame.
fn upload_buffers(
    settings: Res<LevelSetSettings>,
    mut pending: ResMut<PendingUpload>,
    mut buffers: ResMut<LevelSetBuffers>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let Some(generated) = pending.0.take() else {
        return;
    };
    if settings.is_dirty() {
        debug!("discarding staged buffers, the settings changed before the swap");
        return;
    }

    buffers.counts = BufferCounts {
        grid_vertices: generated.grid_vertices.len(),
        point_vertices: generated.point_vertices.len(),
        surface_vertices: generated.surface_vertices.len(),
        surface_primitives: generated.surface_primitives,
    };
    buffers.last_error = None;
    debug!(
        "uploading {} bytes: {} grid vertices, {} sample points, {} surface vertices",
        generated.buffer_bytes(),
        buffers.counts.grid_vertices,
        buffers.counts.point_vertices,
        buffers.counts.surface_vertices,
    );

    if let Err(error) = meshes.insert(
        &buffers.grid,
        grid_mesh(generated.grid_vertices, generated.grid_indices),
    ) {
        warn!("grid wireframe swap failed, keeping the previous mesh: {error}");
    }
    if let Err(error) = meshes.insert(&buffers.points, points_mesh(generated.point_vertices)) {
        warn!("sample point swap failed, keeping the previous mesh: {error}");
    }
    if let Err(error) = meshes.insert(
        &buffers.surface,
        surface_mesh(
            generated.dimension,
            generated.surface_vertices,
            generated.surface_normals,
        ),
    ) {
        warn!("surface swap failed, keeping the previous mesh: {error}");
    }
}

/// Runs one full recomputation for a settings snapshot.
///
/// The deterministic buffers are costed against the budget before anything
/// is sampled, and the surface buffer is costed as soon as classification
/// knows its size, before any vertex is written. On failure the previous
/// buffers stay in place.
fn run_extraction(request: ExtractionRequest) -> Result<GeneratedBuffers> {
    let started = Instant::now();

    let base_bytes = predicted_buffer_bytes(request.dimension, request.resolution, 0);
    if base_bytes > request.max_buffer_bytes {
        return Err(LevelSetError::BufferBudgetExceeded {
            requested: base_bytes,
            budget: request.max_buffer_bytes,
        });
    }

    let grid = SampleGrid::sample(
        request.dimension,
        request.resolution,
        request.field,
        request.time,
    )?;
    let classified = classify_cells(&grid, request.threshold);

    let surface_vertex_count =
        classified.total_primitives() * request.dimension.primitive_vertices();
    let total_bytes =
        predicted_buffer_bytes(request.dimension, request.resolution, surface_vertex_count);
    if total_bytes > request.max_buffer_bytes {
        return Err(LevelSetError::BufferBudgetExceeded {
            requested: total_bytes,
            budget: request.max_buffer_bytes,
        });
    }

    let surface = emit_primitives(&grid, request.threshold, &classified);
    let (grid_vertices, grid_indices) = grid_wireframe(&grid);
    let point_vertices = sample_points(&grid);
    let normals = surface_normals(request.dimension, &surface.vertices);

    debug!(
        "extracted {} primitives from {} cells in {:.2?}",
        surface.primitive_count,
        grid.cell_count(),
        started.elapsed(),
    );

    Ok(GeneratedBuffers {
        dimension: request.dimension,
        resolution: request.resolution,
        grid_vertices,
        grid_indices,
        point_vertices,
        surface_vertices: surface.vertices,
        surface_normals: normals,
        surface_primitives: surface.primitive_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::wireframe_counts;
    use bevy::tasks::TaskPool;

    #[test]
    fn setters_mark_the_settings_dirty_once() {
        let mut settings = LevelSetSettings::default();
        assert_eq!(settings.dimension(), Dimension::Three);
        assert_eq!(settings.resolution(), 32);
        assert!(settings.take_dirty());
        assert!(!settings.take_dirty());

        settings.set_dimension(Dimension::Two);
        assert_eq!(settings.dimension(), Dimension::Two);
        assert!(settings.take_dirty());
        settings.set_dimension(Dimension::Two);
        assert!(!settings.take_dirty(), "unchanged values must not redirty");

        settings.set_resolution(48).unwrap();
        assert_eq!(settings.resolution(), 48);
        assert!(settings.take_dirty());

        settings.next_field();
        assert_eq!(settings.field(), ScalarField::Gyroid);
        assert!(settings.take_dirty());

        settings.set_field_index(3).unwrap();
        assert_eq!(settings.field(), ScalarField::Ripple);
        assert!(settings.take_dirty());

        assert_eq!(
            settings.set_field_index(9),
            Err(LevelSetError::UnknownField(9))
        );
        assert_eq!(settings.field(), ScalarField::Ripple);
        assert!(!settings.take_dirty());

        settings.set_threshold(0.2);
        assert!(settings.take_dirty());
    }

    #[test]
    fn rejected_resolutions_change_nothing() {
        let mut settings = LevelSetSettings::default();
        settings.take_dirty();

        assert_eq!(
            settings.set_resolution(1),
            Err(LevelSetError::ResolutionTooSmall(1))
        );
        assert_eq!(settings.resolution(), 32);
        assert!(!settings.take_dirty());
    }

    #[test]
    fn animation_advances_time_without_dirtying() {
        let mut settings = LevelSetSettings::default();
        settings.take_dirty();

        settings.toggle_animating();
        assert!(settings.is_animating());
        settings.advance_time(0.25);
        settings.advance_time(0.25);
        assert_eq!(settings.time(), 0.5);
        assert!(!settings.take_dirty());

        settings.set_animating(false);
        assert!(!settings.is_animating());
        assert!(!settings.take_dirty());
    }

    #[test]
    fn results_from_superseded_generations_are_rejected() {
        let pool = AsyncComputeTaskPool::get_or_init(TaskPool::new);
        let mut state = ExtractionState::default();
        assert!(!state.is_busy());

        let first = state.begin(pool.spawn(async { Err(LevelSetError::UnknownDimension(9)) }));
        let second = state.begin(pool.spawn(async { Err(LevelSetError::UnknownDimension(9)) }));
        assert!(state.is_busy());
        assert!(first < second);
        assert!(!state.accepts(first));
        assert!(state.accepts(second));
        assert_eq!(state.generation(), second);
    }

    #[test]
    fn extraction_buffers_match_their_closed_forms() {
        let generated = run_extraction(ExtractionRequest {
            dimension: Dimension::Three,
            resolution: 8,
            field: ScalarField::Sphere,
            threshold: 0.0,
            time: 0.0,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        })
        .unwrap();

        let (wire_vertices, wire_indices) = wireframe_counts(Dimension::Three, 8);
        assert_eq!(generated.grid_vertices.len(), wire_vertices);
        assert_eq!(generated.grid_indices.len(), wire_indices);
        assert_eq!(generated.point_vertices.len(), 512);
        assert!(generated.surface_primitives > 0);
        assert_eq!(
            generated.surface_vertices.len(),
            generated.surface_primitives * 3
        );
        assert_eq!(
            generated.surface_normals.len(),
            generated.surface_vertices.len()
        );
        assert_eq!(
            generated.buffer_bytes(),
            predicted_buffer_bytes(Dimension::Three, 8, generated.surface_vertices.len())
        );
    }

    #[test]
    fn budget_overruns_fail_before_sampling() {
        let error = run_extraction(ExtractionRequest {
            dimension: Dimension::Three,
            resolution: 64,
            field: ScalarField::Sphere,
            threshold: 0.0,
            time: 0.0,
            max_buffer_bytes: 1,
        })
        .unwrap_err();
        assert!(matches!(
            error,
            LevelSetError::BufferBudgetExceeded { budget: 1, .. }
        ));
    }

    #[test]
    fn extreme_resolutions_are_rejected_before_sampling() {
        // Buffer sizes for two million samples per axis exceed usize; the
        // saturated prediction must fail the budget gate, not overflow.
        let error = run_extraction(ExtractionRequest {
            dimension: Dimension::Three,
            resolution: 2_000_000,
            field: ScalarField::Sphere,
            threshold: 0.0,
            time: 0.0,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        })
        .unwrap_err();
        assert_eq!(
            error,
            LevelSetError::BufferBudgetExceeded {
                requested: usize::MAX,
                budget: DEFAULT_MAX_BUFFER_BYTES,
            }
        );
    }

    #[test]
    fn surface_growth_is_costed_before_emission() {
        // At resolution 3 the fixed buffers cost 728 bytes and the four
        // contour segments push the total to 952.
        let error = run_extraction(ExtractionRequest {
            dimension: Dimension::Two,
            resolution: 3,
            field: ScalarField::Sphere,
            threshold: 0.6,
            time: 0.0,
            max_buffer_bytes: 800,
        })
        .unwrap_err();
        assert_eq!(
            error,
            LevelSetError::BufferBudgetExceeded {
                requested: 952,
                budget: 800
            }
        );
    }

    #[test]
    fn resolution_changes_resize_every_buffer() {
        let at = |resolution| {
            run_extraction(ExtractionRequest {
                dimension: Dimension::Two,
                resolution,
                field: ScalarField::Sphere,
                threshold: 0.0,
                time: 0.0,
                max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            })
            .unwrap()
        };
        let coarse = at(10);
        let fine = at(20);

        assert_eq!(coarse.grid_vertices.len(), 81 * 4);
        assert_eq!(fine.grid_vertices.len(), 361 * 4);
        assert_eq!(coarse.point_vertices.len(), 100);
        assert_eq!(fine.point_vertices.len(), 400);
        assert!(fine.surface_primitives > coarse.surface_primitives);
    }

    #[test]
    fn identical_requests_yield_identical_buffers() {
        let request = ExtractionRequest {
            dimension: Dimension::Three,
            resolution: 6,
            field: ScalarField::Gyroid,
            threshold: 0.0,
            time: 1.5,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        };
        assert_eq!(
            run_extraction(request).unwrap(),
            run_extraction(request).unwrap()
        );
    }

    #[test]
    fn stable_handles_accept_whole_asset_swaps() {
        let mut meshes = Assets::<Mesh>::default();
        let handle = meshes.add(points_mesh(Vec::new()));

        let swap = meshes.insert(&handle, points_mesh(vec![[0.0, 0.0, 0.0]]));

        assert!(swap.is_ok());
        assert_eq!(meshes.get(&handle).map(Mesh::count_vertices), Some(1));
    }

    #[test]
    fn staged_buffers_are_dropped_when_settings_change_before_the_swap() {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<PendingUpload>()
            .add_systems(Update, upload_buffers);

        let mut settings = LevelSetSettings::default();
        settings.take_dirty();
        app.insert_resource(settings);

        let (grid, points, surface) = {
            let mut meshes = app.world_mut().resource_mut::<Assets<Mesh>>();
            (
                meshes.add(grid_mesh(Vec::new(), Vec::new())),
                meshes.add(points_mesh(Vec::new())),
                meshes.add(surface_mesh(Dimension::One, Vec::new(), Vec::new())),
            )
        };
        app.insert_resource(LevelSetBuffers {
            grid,
            points,
            surface,
            counts: BufferCounts::default(),
            last_error: None,
        });

        let generated = run_extraction(ExtractionRequest {
            dimension: Dimension::One,
            resolution: 4,
            field: ScalarField::Sphere,
            threshold: 2.0,
            time: 0.0,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        })
        .unwrap();

        // A settings change after the result was staged drops the result.
        app.world_mut().resource_mut::<PendingUpload>().0 = Some(generated.clone());
        app.world_mut()
            .resource_mut::<LevelSetSettings>()
            .set_threshold(0.5);
        app.update();

        {
            let world = app.world();
            let buffers = world.resource::<LevelSetBuffers>();
            assert_eq!(buffers.counts, BufferCounts::default());
            assert!(world.resource::<PendingUpload>().0.is_none());
            let meshes = world.resource::<Assets<Mesh>>();
            assert_eq!(meshes.get(&buffers.points).map(Mesh::count_vertices), Some(0));
        }

        // Once the queue has consumed the change, the next result swaps in.
        app.world_mut()
            .resource_mut::<LevelSetSettings>()
            .take_dirty();
        app.world_mut().resource_mut::<PendingUpload>().0 = Some(generated);
        app.update();

        let world = app.world();
        let buffers = world.resource::<LevelSetBuffers>();
        assert_eq!(buffers.counts.grid_vertices, 6);
        assert_eq!(buffers.counts.point_vertices, 4);
        let meshes = world.resource::<Assets<Mesh>>();
        assert_eq!(meshes.get(&buffers.points).map(Mesh::count_vertices), Some(4));
    }
}
