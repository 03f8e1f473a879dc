use rayon::prelude::*;

use crate::grid::{CellIndexer, SampleGrid};
use crate::interp::crossing_point;
use crate::tables::CaseTable;
use crate::types::{Dimension, Point, Value};

/// Compact geometry produced by one extraction pass.
///
/// Vertices are grouped per primitive: single points for 1D grids, segment
/// pairs for 2D, triangle triples for 3D. There are no unused slots; the
/// buffer length is always `primitive_count * dimension.primitive_vertices()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGeometry {
    pub dimension: Dimension,
    pub vertices: Vec<[f32; 3]>,
    pub primitive_count: usize,
}

/// Per-cell configurations and primitive counts for one sampled grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCells {
    /// Corner-sign configuration of each cell, bit `i` set when corner `i`
    /// is above the threshold.
    pub configs: Vec<u8>,
    /// Primitives each cell will emit, straight from the case table.
    pub counts: Vec<u32>,
}

impl ClassifiedCells {
    pub fn total_primitives(&self) -> usize {
        self.counts.iter().map(|&count| count as usize).sum()
    }
}

/// Classifies every cell of the grid against the threshold in parallel.
///
/// A corner counts as above only when its value is strictly greater than
/// the threshold, so a flat field sitting exactly on the threshold stays
/// empty.
pub fn classify_cells(grid: &SampleGrid, threshold: Value) -> ClassifiedCells {
    let table = CaseTable::of(grid.dimension());
    let indexer = CellIndexer::new(grid.dimension(), grid.resolution());
    let values = grid.values();
    let (configs, counts): (Vec<u8>, Vec<u32>) = (0..grid.cell_count())
        .into_par_iter()
        .map(|cell| {
            let base = indexer.base_sample(cell);
            let mut config = 0u8;
            for corner in 0..indexer.corner_count() {
                if values[indexer.corner_sample(base, corner)] > threshold {
                    config |= 1 << corner;
                }
            }
            (config, table.primitive_count(config) as u32)
        })
        .unzip();
    ClassifiedCells { configs, counts }
}

/// Exclusive prefix sum over per-cell primitive counts.
///
/// Returns the write offset of each cell's first primitive and the total,
/// which is what makes the compacted output deterministic regardless of the
/// order cells finish in.
pub fn exclusive_scan(counts: &[u32]) -> (Vec<usize>, usize) {
    let mut offsets = Vec::with_capacity(counts.len());
    let mut running = 0usize;
    for &count in counts {
        offsets.push(running);
        running += count as usize;
    }
    (offsets, running)
}

/// Interpolates and writes the primitives of every active cell into a dense
/// vertex buffer.
///
/// The buffer is carved into one disjoint span per active cell at the scan
/// offsets, so the per-cell writes can run in parallel without touching
/// each other.
pub fn emit_primitives(
    grid: &SampleGrid,
    threshold: Value,
    classified: &ClassifiedCells,
) -> SurfaceGeometry {
    let dimension = grid.dimension();
    let table = CaseTable::of(dimension);
    let indexer = CellIndexer::new(dimension, grid.resolution());
    let arity = dimension.primitive_vertices();
    let (offsets, total) = exclusive_scan(&classified.counts);
    let mut vertices = vec![[0.0f32; 3]; total * arity];

    let mut spans: Vec<(usize, &mut [[f32; 3]])> = Vec::new();
    let mut rest = vertices.as_mut_slice();
    let mut carved = 0usize;
    for (cell, &count) in classified.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        debug_assert_eq!(carved, offsets[cell] * arity);
        let (span, tail) = rest.split_at_mut(count as usize * arity);
        carved += span.len();
        spans.push((cell, span));
        rest = tail;
    }
    debug_assert!(rest.is_empty());

    spans.into_par_iter().for_each(|(cell, span)| {
        emit_cell(
            grid,
            threshold,
            &table,
            &indexer,
            cell,
            classified.configs[cell],
            span,
        );
    });

    SurfaceGeometry {
        dimension,
        vertices,
        primitive_count: total,
    }
}

/// Classification and emission in one call.
pub fn extract_surface(grid: &SampleGrid, threshold: Value) -> SurfaceGeometry {
    let classified = classify_cells(grid, threshold);
    emit_primitives(grid, threshold, &classified)
}

/// Emits one cell's primitives into its span of the output buffer.
///
/// Gathers the corner samples, interpolates every crossed edge once, then
/// writes the case row's vertices in table order.
fn emit_cell(
    grid: &SampleGrid,
    threshold: Value,
    table: &CaseTable,
    indexer: &CellIndexer,
    cell: usize,
    config: u8,
    span: &mut [[f32; 3]],
) {
    let base = indexer.base_sample(cell);
    let mut corner_positions = [Point::origin(); 8];
    let mut corner_values: [Value; 8] = [0.0; 8];
    for corner in 0..indexer.corner_count() {
        let sample = indexer.corner_sample(base, corner);
        corner_positions[corner] = grid.position(sample);
        corner_values[corner] = grid.value(sample);
    }

    let mask = table.edge_mask(config);
    let mut crossings = [[0.0f32; 3]; 12];
    for (edge, &[a, b]) in table.edges().iter().enumerate() {
        if mask & (1 << edge) == 0 {
            continue;
        }
        let point = crossing_point(
            corner_positions[a],
            corner_positions[b],
            corner_values[a],
            corner_values[b],
            threshold,
        );
        crossings[edge] = point.into();
    }

    for (slot, &edge) in table.case_vertices(config).iter().enumerate() {
        span[slot] = crossings[edge as usize];
    }
}
