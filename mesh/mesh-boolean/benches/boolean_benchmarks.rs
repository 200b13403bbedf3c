//! Benchmarks for mesh-boolean operations.
//!
//! Run with: cargo bench -p mesh-boolean

#![allow(missing_docs, clippy::cast_possible_truncation)]

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_boolean::{Bvh, intersection};
use mesh_boolean::intersect::triangles_intersect;
use mesh_types::{IndexedMesh, MeshTopology, Point3, Vertex, cuboid};
use std::collections::HashMap;

// =============================================================================
// Test Mesh Generation
// =============================================================================

fn create_cube_at(x: f64, y: f64, z: f64) -> IndexedMesh {
    cuboid(
        Point3::new(x - 0.5, y - 0.5, z - 0.5),
        Point3::new(x + 0.5, y + 0.5, z + 0.5),
    )
}

/// Icosphere with the given subdivision level (20 · 4^n faces).
fn create_sphere(subdivisions: u32) -> IndexedMesh {
    let phi = f64::midpoint(1.0, 5.0_f64.sqrt());
    let (a, b) = (1.0, 1.0 / phi);

    let ico_verts = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];
    let ico_faces: [[u32; 3]; 20] = [
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ];

    let mut mesh = IndexedMesh::new();
    for v in &ico_verts {
        let p = Point3::new(v[0], v[1], v[2]);
        mesh.vertices.push(Vertex::new(p / p.coords.norm()));
    }
    mesh.faces.extend_from_slice(&ico_faces);

    for _ in 0..subdivisions {
        let mut next = IndexedMesh::new();
        next.vertices = mesh.vertices.clone();
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |i: u32, j: u32, verts: &mut Vec<Vertex>| {
            let key = (i.min(j), i.max(j));
            *midpoints.entry(key).or_insert_with(|| {
                let m = nalgebra::center(&verts[i as usize].position, &verts[j as usize].position);
                verts.push(Vertex::new(m / m.coords.norm()));
                (verts.len() - 1) as u32
            })
        };
        for &[v0, v1, v2] in &mesh.faces {
            let m01 = midpoint(v0, v1, &mut next.vertices);
            let m12 = midpoint(v1, v2, &mut next.vertices);
            let m20 = midpoint(v2, v0, &mut next.vertices);
            next.faces.push([v0, m01, m20]);
            next.faces.push([v1, m12, m01]);
            next.faces.push([v2, m20, m12]);
            next.faces.push([m01, m12, m20]);
        }
        mesh = next;
    }

    mesh
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_bvh_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("BvhOverlap");

    let sphere_a = create_sphere(3);
    let mut sphere_b = create_sphere(3);
    for v in &mut sphere_b.vertices {
        v.position.x += 0.5;
    }
    group.throughput(Throughput::Elements(
        (sphere_a.face_count() + sphere_b.face_count()) as u64,
    ));

    group.bench_function("build_1280tri", |b| {
        b.iter(|| Bvh::build(black_box(&sphere_a), 4));
    });

    let bvh_a = Bvh::build(&sphere_a, 4);
    let bvh_b = Bvh::build(&sphere_b, 4);
    group.bench_function("overlap_spheres_1280tri", |b| {
        b.iter(|| {
            bvh_a.overlap_with(black_box(&bvh_b), 0.0, |fa, fb| {
                match (sphere_a.triangle(fa as usize), sphere_b.triangle(fb as usize)) {
                    (Some(ta), Some(tb)) => triangles_intersect(&ta, &tb, 1e-9),
                    _ => false,
                }
            })
        });
    });

    group.finish();
}

fn bench_intersection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Intersection");
    group.sample_size(10);

    let cube_a = create_cube_at(0.0, 0.0, 0.0);
    let cube_b = create_cube_at(0.25, 0.25, 0.25);
    group.bench_function("intersection_cubes", |b| {
        b.iter(|| intersection(black_box(&cube_a), black_box(&cube_b)));
    });

    let sphere_a = create_sphere(2);
    let mut sphere_b = create_sphere(2);
    for v in &mut sphere_b.vertices {
        v.position.x += 0.5;
    }
    group.bench_function("intersection_spheres_320tri", |b| {
        b.iter(|| intersection(black_box(&sphere_a), black_box(&sphere_b)));
    });

    group.finish();
}

criterion_group!(benches, bench_bvh_overlap, bench_intersection);
criterion_main!(benches);
