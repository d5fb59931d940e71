//! Stitched chunk geometry.
//!
//! Vertices are undisplaced cube-surface points relative to the patch
//! centre. Where an edge borders a coarser neighbour, every boundary vertex
//! off the coarse grid is tied to its two aligned anchors so that, once
//! displaced, it lies on the straight segment between them. The coarse
//! neighbour draws exactly that segment, so the two patches share the edge.

use glam::DVec3;
use lithos_cubesphere::FaceDirection;
use lithos_render::ChunkVertex;
use lithos_terrain::{MapRequest, edge_vertices, stitch_anchors};

use crate::error::GeometryError;

/// Vertex data of one patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkGeometry {
    /// Patch centre on the cube surface.
    pub offset: DVec3,
    /// `(resolution + 1)²` vertices, row-major.
    pub vertices: Vec<ChunkVertex>,
}

fn validate(request: &MapRequest) -> Result<(), GeometryError> {
    let res = request.resolution;
    if res < 2 || !res.is_power_of_two() {
        return Err(GeometryError::InvalidResolution(res));
    }
    if !(request.width > 0.0) {
        return Err(GeometryError::InvalidWidth(request.width));
    }
    for dir in FaceDirection::ALL {
        let stride = request.strides[dir.index()];
        if stride == 0 || res % stride != 0 {
            return Err(GeometryError::InvalidStride {
                dir,
                stride,
                resolution: res,
            });
        }
    }
    Ok(())
}

/// Build the vertex grid for `request`.
pub fn build_geometry(request: &MapRequest) -> Result<ChunkGeometry, GeometryError> {
    validate(request)?;

    let res = request.resolution;
    let side = res + 1;
    let offset = request.offset();
    let point = |i: u32, j: u32| {
        request
            .face
            .cube_point(request.vertex_local(i as i64, j as i64), request.half_extent)
    };

    let mut vertices = Vec::with_capacity((side * side) as usize);
    for j in 0..side {
        for i in 0..side {
            let p = point(i, j);
            let index = j * side + i;
            vertices.push(ChunkVertex {
                position: (p - offset).as_vec3().to_array(),
                normal: p.normalize().as_vec3().to_array(),
                anchors: [index, index],
                blend: 0.0,
            });
        }
    }

    for dir in FaceDirection::ALL {
        let stride = request.strides[dir.index()];
        if stride <= 1 {
            continue;
        }
        let edge = edge_vertices(dir, res);
        let index = |k: u32| {
            let (i, j) = edge[k as usize];
            j * side + i
        };
        for k in 0..=res {
            let (a, b, t) = stitch_anchors(k, stride);
            if t == 0.0 {
                continue;
            }
            let (ia, ib) = (index(a), index(b));
            let (pa, pb) = (edge[a as usize], edge[b as usize]);
            let p = point(pa.0, pa.1).lerp(point(pb.0, pb.1), t as f64);
            let v = &mut vertices[index(k) as usize];
            v.position = (p - offset).as_vec3().to_array();
            v.anchors = [ia, ib];
            v.blend = t;
        }
    }

    Ok(ChunkGeometry { offset, vertices })
}
