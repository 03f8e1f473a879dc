use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, Mesh, PrimitiveTopology},
};

use crate::grid::{CellIndexer, SampleGrid};
use crate::types::{Dimension, Vector};

/// CPU-side vertex data produced by one recomputation, staged for upload.
///
/// Every buffer is rebuilt from scratch and sized exactly to the counts of
/// the settings snapshot it was computed from, so data from a previous
/// configuration can never leak into a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedBuffers {
    pub dimension: Dimension,
    pub resolution: u32,
    /// Cell outline vertices for the grid wireframe.
    pub grid_vertices: Vec<[f32; 3]>,
    /// Line-list index pairs into `grid_vertices`.
    pub grid_indices: Vec<u32>,
    /// One vertex per grid sample.
    pub point_vertices: Vec<[f32; 3]>,
    /// Compacted primitive vertices, grouped per primitive.
    pub surface_vertices: Vec<[f32; 3]>,
    /// One normal per surface vertex.
    pub surface_normals: Vec<[f32; 3]>,
    pub surface_primitives: usize,
}

impl GeneratedBuffers {
    /// Total bytes of vertex attributes and indices these buffers upload.
    pub fn buffer_bytes(&self) -> usize {
        let vertex = size_of::<[f32; 3]>();
        let index = size_of::<u32>();
        let vertices =
            self.grid_vertices.len() + self.point_vertices.len() + self.surface_vertices.len();
        // Positions and normals for every vertex, line indices for the
        // grid, sequential indices for the surface.
        vertices * 2 * vertex + (self.grid_indices.len() + self.surface_vertices.len()) * index
    }
}

/// Upload size of a recomputation at the given resolution once
/// `surface_vertices` vertices have been extracted.
///
/// Matches [`GeneratedBuffers::buffer_bytes`], which lets the budget be
/// enforced before any buffer is allocated: the grid and point parts are
/// closed-form, and the surface part is known as soon as cells are
/// classified. Saturates at `usize::MAX` for resolutions whose buffers
/// cannot be sized, which no budget admits.
pub fn predicted_buffer_bytes(
    dimension: Dimension,
    resolution: u32,
    surface_vertices: usize,
) -> usize {
    let vertex = size_of::<[f32; 3]>();
    let index = size_of::<u32>();
    let (wire_vertices, wire_indices) = wireframe_counts(dimension, resolution);
    let points = dimension.sample_count(resolution);
    let attributes = wire_vertices
        .saturating_add(points)
        .saturating_add(surface_vertices)
        .saturating_mul(2 * vertex);
    let indices = wire_indices
        .saturating_add(surface_vertices)
        .saturating_mul(index);
    attributes.saturating_add(indices)
}

/// Vertex and index counts of the grid wireframe: an outline pair per 1D
/// cell, a quad outline per 2D cell, four face outlines per 3D cell.
///
/// Saturates at `usize::MAX` when a count does not fit.
pub fn wireframe_counts(dimension: Dimension, resolution: u32) -> (usize, usize) {
    let cells = dimension.cell_count(resolution);
    match dimension {
        Dimension::One => (cells.saturating_mul(2), cells.saturating_mul(2)),
        Dimension::Two => (cells.saturating_mul(4), cells.saturating_mul(8)),
        Dimension::Three => (cells.saturating_mul(16), cells.saturating_mul(32)),
    }
}

/// Builds the cell-outline wireframe of the sampled grid.
///
/// 3D cells draw their bottom, top, front and back faces; the two side
/// faces are implied by the neighbouring cells.
pub fn grid_wireframe(grid: &SampleGrid) -> (Vec<[f32; 3]>, Vec<u32>) {
    let dimension = grid.dimension();
    let indexer = CellIndexer::new(dimension, grid.resolution());
    let loops: &[&[usize]] = match dimension {
        Dimension::One => &[&[0, 1]],
        Dimension::Two => &[&[0, 1, 2, 3]],
        Dimension::Three => &[&[0, 1, 2, 3], &[4, 5, 6, 7], &[0, 1, 5, 4], &[3, 2, 6, 7]],
    };

    let (vertex_count, index_count) = wireframe_counts(dimension, grid.resolution());
    let mut vertices = Vec::with_capacity(vertex_count);
    let mut indices = Vec::with_capacity(index_count);
    for cell in 0..grid.cell_count() {
        let base = indexer.base_sample(cell);
        for corners in loops {
            let start = vertices.len() as u32;
            for &corner in *corners {
                vertices.push(grid.position(indexer.corner_sample(base, corner)).into());
            }
            if corners.len() == 2 {
                indices.extend_from_slice(&[start, start + 1]);
            } else {
                for i in 0..corners.len() as u32 {
                    indices.push(start + i);
                    indices.push(start + (i + 1) % corners.len() as u32);
                }
            }
        }
    }
    debug_assert_eq!(vertices.len(), vertex_count);
    debug_assert_eq!(indices.len(), index_count);
    (vertices, indices)
}

/// One renderable vertex per grid sample.
pub fn sample_points(grid: &SampleGrid) -> Vec<[f32; 3]> {
    grid.positions()
        .iter()
        .map(|&position| position.into())
        .collect()
}

/// Normals for the surface buffer: flat face normals for triangles,
/// out-of-plane for points and segments.
pub fn surface_normals(dimension: Dimension, vertices: &[[f32; 3]]) -> Vec<[f32; 3]> {
    match dimension {
        Dimension::Three => flat_normals(vertices),
        _ => out_of_plane_normals(vertices.len()),
    }
}

/// Flat-shaded normals: the face normal of each triangle, once per vertex.
pub fn flat_normals(vertices: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let mut normals = Vec::with_capacity(vertices.len());
    for triangle in vertices.chunks_exact(3) {
        let normal = triangle_normal(triangle[0], triangle[1], triangle[2]);
        normals.push(normal);
        normals.push(normal);
        normals.push(normal);
    }
    normals
}

/// Face normal of one triangle, or the zero vector if it is degenerate.
fn triangle_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let ab = Vector::new(b[0] - a[0], b[1] - a[1], b[2] - a[2]);
    let bc = Vector::new(c[0] - b[0], c[1] - b[1], c[2] - b[2]);
    let cross = ab.cross(&bc);
    let norm = cross.norm();
    if norm == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        (cross / norm).into()
    }
}

/// 1D and 2D geometry lives in the z = 0 plane, so +z is its normal. The
/// wireframe and point buffers reuse the same convention.
fn out_of_plane_normals(count: usize) -> Vec<[f32; 3]> {
    vec![[0.0, 0.0, 1.0]; count]
}

/// Builds the wireframe line mesh from staged vertex data.
pub fn grid_mesh(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Mesh {
    let normals = out_of_plane_normals(vertices.len());
    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vertices);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Builds the sample-point mesh.
pub fn points_mesh(vertices: Vec<[f32; 3]>) -> Mesh {
    let normals = out_of_plane_normals(vertices.len());
    let mut mesh = Mesh::new(
        PrimitiveTopology::PointList,
        RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vertices);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh
}

/// Builds the extracted-surface mesh with the topology of the dimension's
/// primitive kind and sequential indices.
pub fn surface_mesh(dimension: Dimension, vertices: Vec<[f32; 3]>, normals: Vec<[f32; 3]>) -> Mesh {
    let topology = match dimension {
        Dimension::One => PrimitiveTopology::PointList,
        Dimension::Two => PrimitiveTopology::LineList,
        Dimension::Three => PrimitiveTopology::TriangleList,
    };
    let indices = (0..vertices.len() as u32).collect();
    let mut mesh = Mesh::new(topology, RenderAssetUsages::RENDER_WORLD);
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vertices);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}
