//! End-to-end behaviour of the terrain cube driven through the host loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{DVec2, DVec3};
use lithos_config::Config;
use lithos_cubesphere::{ChunkAddress, CubeFace, FaceDirection, face_adjacency};
use lithos_lod::resolve;
use lithos_planet::{
    HeadlessRenderGroup, InlineWorkerPool, TerrainCube, ThreadWorkerPool, WorkerPool,
};
use lithos_terrain::{CpuMapGenerator, HeightField, edge_vertices};

const RESOLUTION: u32 = 8;

fn config(displacement: f64) -> Config {
    let mut config = Config::default();
    config.lod.resolution = RESOLUTION;
    config.lod.coarse_resolution = 8;
    config.shape.displacement = displacement;
    config
}

fn cube<W: WorkerPool>(config: &Config, worker: W) -> TerrainCube<W, HeadlessRenderGroup> {
    let field = Arc::new(HeightField::new(config.shape.clone()));
    TerrainCube::new(
        config,
        Arc::clone(&field),
        Box::new(CpuMapGenerator::new(field)),
        worker,
        HeadlessRenderGroup::new(),
    )
    .expect("terrain cube")
}

/// Run the host loop until the batch started by `camera` is committed.
fn drive<W: WorkerPool>(cube: &mut TerrainCube<W, HeadlessRenderGroup>, camera: DVec3) {
    cube.set_camera_position(camera).expect("not busy");
    let start = Instant::now();
    while cube.is_busy() {
        cube.update();
        cube.update_maps(Instant::now() + Duration::from_millis(4));
        assert!(start.elapsed() < Duration::from_secs(60), "batch never committed");
        if cube.is_busy() {
            std::thread::sleep(Duration::from_micros(200));
        }
    }
}

fn face_zero() -> CubeFace {
    CubeFace::from_index(0).expect("face 0")
}

fn leaf_at(
    cube: &TerrainCube<impl WorkerPool, HeadlessRenderGroup>,
    face: CubeFace,
    local: DVec2,
) -> ChunkAddress {
    let f = cube.faces().iter().find(|f| f.face() == face).expect("face");
    f.leaves()
        .find(|(_, n)| n.bounds.contains(local))
        .map(|(_, n)| n.address)
        .expect("leaf under point")
}

fn distance_to_segment(p: DVec3, a: DVec3, b: DVec3) -> f64 {
    let ab = b - a;
    let t = ((p - a).dot(ab) / ab.length_squared().max(f64::MIN_POSITIVE)).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[test]
fn test_far_camera_gives_one_root_per_face() {
    let config = config(120.0);
    let mut cube = cube(&config, InlineWorkerPool::new());
    drive(&mut cube, DVec3::new(30_000.0, 40_000.0, -20_000.0));

    let stats = cube.stats();
    assert_eq!(stats.active_chunks, 6);
    assert!(cube.active_keys().all(|k| k.address.level == 0));
    assert!(cube.active_keys().all(|k| k.strides == [1; 4]));
    assert_eq!(cube.manager().group().visible_count(), 6);
}

#[test]
fn test_surface_camera_reaches_min_size_and_antipode_stays_coarse() {
    let config = config(1.0);
    let mut cube = cube(&config, InlineWorkerPool::new());
    let face = face_zero();
    drive(&mut cube, face.normal() * config.shape.radius);

    let min = config.lod.min_chunk_size;
    let under = leaf_at(&cube, face, DVec2::new(1e-3, 1e-3));
    assert!(
        (under.size(config.shape.radius) - min).abs() < 1e-9,
        "leaf under the camera is {} wide",
        under.size(config.shape.radius)
    );
    let reported = cube.min_active_chunk_size().expect("active chunks");
    assert!((reported - min).abs() < 1e-9);

    let antipode = leaf_at(&cube, face.opposite(), DVec2::new(1e-3, 1e-3));
    assert!(antipode.level <= 1, "antipode split to level {}", antipode.level);
}

#[test]
fn test_unchanged_camera_allocates_nothing() {
    let config = config(120.0);
    let mut cube = cube(&config, InlineWorkerPool::new());
    let camera = DVec3::new(1.0, 0.6, 0.2).normalize() * 1350.0;
    drive(&mut cube, camera);
    let first = cube.stats();
    assert!(first.last_allocations > 6);

    drive(&mut cube, camera);
    let second = cube.stats();
    assert_eq!(second.last_allocations, 0);
    assert_eq!(second.last_recycled, 0);
    assert_eq!(second.active_chunks, first.active_chunks);
    assert_eq!(second.constructed_chunks, first.constructed_chunks);
}

#[test]
fn test_one_chunk_per_key() {
    let config = config(120.0);
    let mut cube = cube(&config, InlineWorkerPool::new());
    for camera in [
        DVec3::new(0.0, 1400.0, 0.0),
        DVec3::new(900.0, 900.0, 300.0),
        DVec3::new(-1300.0, 100.0, 50.0),
    ] {
        drive(&mut cube, camera);

        let ids: HashSet<_> = cube
            .active_keys()
            .map(|k| cube.active_chunk(k).expect("chunk"))
            .collect();
        assert_eq!(ids.len(), cube.stats().active_chunks, "a chunk serves two keys");

        let manager = cube.manager();
        let visible: Vec<_> = manager
            .chunks()
            .filter(|c| manager.group().is_visible(c.id()))
            .collect();
        assert_eq!(visible.len(), ids.len());
        let keys: HashSet<_> = visible.iter().filter_map(|c| c.key().copied()).collect();
        assert_eq!(keys.len(), visible.len(), "two visible chunks share a key");
        assert!(visible.iter().all(|c| c.is_complete()));
    }
}

#[test]
fn test_neighbouring_chunks_share_edges() {
    let config = config(120.0);
    let mut cube = cube(&config, InlineWorkerPool::new());
    // Near a cube corner so that face seams see level changes.
    drive(&mut cube, DVec3::new(1.0, 0.85, 0.7).normalize() * 1300.0);

    let field = Arc::clone(cube.field());
    let manager = cube.manager();
    let chunk_at = |address: &ChunkAddress| {
        let key = cube
            .active_keys()
            .find(|k| &k.address == address)
            .expect("active key");
        let id = cube.active_chunk(key).expect("chunk id");
        let positions = manager
            .chunk(id)
            .and_then(|c| c.displaced_positions(&field))
            .expect("displaced positions");
        (key.strides, positions)
    };
    let side = RESOLUTION + 1;
    let index = |(i, j): (u32, u32)| (j * side + i) as usize;

    let mut checked = 0;
    let mut cross_face = 0;
    for face in cube.faces() {
        for (_, node) in face.leaves() {
            let (_, fine) = chunk_at(&node.address);
            for dir in FaceDirection::ALL {
                let Some(other) = node.neighbors[dir.index()].and_then(|r| resolve(cube.faces(), r))
                else {
                    continue;
                };
                if !other.is_leaf() || other.level() > node.level() {
                    continue;
                }
                let diff = u32::from(node.level() - other.level());
                if 1u32 << diff > RESOLUTION {
                    continue;
                }
                let facing = if other.face() == node.face() {
                    dir.opposite()
                } else {
                    face_adjacency(node.face(), dir).neighbor_edge
                };
                let (strides, coarse) = chunk_at(&other.address);
                if strides[facing.index()] > 1 {
                    // Stitched from both sides; only possible across a face seam.
                    continue;
                }

                let edge = edge_vertices(facing, RESOLUTION);
                for k in edge_vertices(dir, RESOLUTION) {
                    let p = fine[index(k)];
                    let gap = edge
                        .windows(2)
                        .map(|w| distance_to_segment(p, coarse[index(w[0])], coarse[index(w[1])]))
                        .fold(f64::INFINITY, f64::min);
                    assert!(
                        gap < 1e-3,
                        "crack of {gap} between {} and {} on {dir:?}",
                        node.address,
                        other.address
                    );
                }
                checked += 1;
                if other.face() != node.face() {
                    cross_face += 1;
                }
            }
        }
    }
    assert!(checked > 0);
    assert!(cross_face > 0, "no face seam was checked");
}

#[test]
fn test_retreating_camera_only_merges() {
    let config = config(120.0);
    let mut cube = cube(&config, InlineWorkerPool::new());
    let dir = DVec3::new(0.3, 1.0, -0.2).normalize();

    let mut previous: Option<HashSet<ChunkAddress>> = None;
    for step in 0..8 {
        let distance = 1300.0 * 1.4f64.powi(step);
        drive(&mut cube, dir * distance);
        let leaves: HashSet<ChunkAddress> = cube.active_keys().map(|k| k.address).collect();

        if let Some(previous) = &previous {
            for address in &leaves {
                let mut ancestor = address.parent();
                while let Some(a) = ancestor {
                    assert!(
                        !previous.contains(&a),
                        "{address} was split again at distance {distance}"
                    );
                    ancestor = a.parent();
                }
            }
            assert!(leaves.len() <= previous.len());
        }
        previous = Some(leaves);
    }
    assert_eq!(cube.stats().active_chunks, 6, "far enough to collapse to roots");
}

#[test]
fn test_threaded_workers_drive_the_same_result() {
    let config = config(120.0);
    let camera = DVec3::new(-0.4, -0.2, 1.0).normalize() * 1400.0;

    let mut inline = cube(&config, InlineWorkerPool::new());
    drive(&mut inline, camera);
    let mut threaded = cube(&config, ThreadWorkerPool::new(4));
    drive(&mut threaded, camera);

    let a: HashSet<_> = inline.active_keys().copied().collect();
    let b: HashSet<_> = threaded.active_keys().copied().collect();
    assert_eq!(a, b);
    assert_eq!(threaded.manager().group().visible_count(), b.len());
    assert_eq!(threaded.manager().worker().in_flight(), 0);
}
