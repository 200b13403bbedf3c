//! Small-hole filling for welded meshes.
//!
//! A hole is a closed loop of boundary half-edges, i.e. edges whose reverse
//! is not used by any face. Only loops with a few sides are capped.

use hashbrown::{HashMap, HashSet};
use mesh_types::IndexedMesh;
use tracing::debug;

/// Cap every boundary loop with at most `max_sides` edges.
///
/// Cap triangles follow the loop's reversed orientation, so they wind the
/// same way as the faces around the hole. Quads are split along their
/// shorter diagonal. Loops through a vertex with more than one outgoing
/// boundary edge are left open. Returns the number of holes filled.
///
/// # Example
///
/// ```
/// use mesh_boolean::holes::fill_small_holes;
/// use mesh_types::unit_cube;
///
/// let mut open = unit_cube();
/// open.faces.truncate(10); // drop the +X side
///
/// assert_eq!(fill_small_holes(&mut open, 4), 1);
/// assert_eq!(open.faces.len(), 12);
/// assert!((open.signed_volume() - 1.0).abs() < 1e-12);
/// ```
pub fn fill_small_holes(mesh: &mut IndexedMesh, max_sides: usize) -> usize {
    if max_sides < 3 || mesh.faces.is_empty() {
        return 0;
    }

    let half_edges = |f: &[u32; 3]| [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])];
    let used: HashSet<(u32, u32)> = mesh.faces.iter().flat_map(half_edges).collect();
    let boundary: Vec<(u32, u32)> = mesh
        .faces
        .iter()
        .flat_map(half_edges)
        .filter(|&(a, b)| !used.contains(&(b, a)))
        .collect();
    if boundary.is_empty() {
        return 0;
    }

    // The hole runs against its neighbours: a face edge a -> b is b -> a on
    // the loop. `None` marks a vertex the loop cannot pass through uniquely.
    let mut next: HashMap<u32, Option<u32>> = HashMap::new();
    for &(a, b) in &boundary {
        next.entry(b).and_modify(|n| *n = None).or_insert(Some(a));
    }

    let mut done: HashSet<u32> = HashSet::new();
    let mut caps = Vec::new();
    let mut filled = 0;
    for &(_, start) in &boundary {
        if done.contains(&start) {
            continue;
        }
        let Some(ring) = trace_loop(&next, start, max_sides) else {
            continue;
        };
        let Some(tris) = cap(mesh, &ring) else {
            continue;
        };
        done.extend(ring.iter().copied());
        caps.extend(tris);
        filled += 1;
    }

    debug!(
        boundary_edges = boundary.len(),
        filled,
        faces_added = caps.len(),
        "small holes filled"
    );
    mesh.faces.extend(caps);
    filled
}

fn trace_loop(next: &HashMap<u32, Option<u32>>, start: u32, max_sides: usize) -> Option<Vec<u32>> {
    let mut ring = vec![start];
    let mut current = start;
    loop {
        let n = (*next.get(&current)?)?;
        if n == start {
            break;
        }
        if ring.len() >= max_sides || ring.contains(&n) {
            return None;
        }
        ring.push(n);
        current = n;
    }
    (ring.len() >= 3).then_some(ring)
}

fn cap(mesh: &IndexedMesh, ring: &[u32]) -> Option<Vec<[u32; 3]>> {
    let positions = ring
        .iter()
        .map(|&i| mesh.vertices.get(i as usize).map(|v| v.position))
        .collect::<Option<Vec<_>>>()?;

    let n = ring.len();
    let mut origin = 0;
    if n == 4 && (positions[1] - positions[3]).norm() < (positions[0] - positions[2]).norm() {
        origin = 1;
    }
    Some(
        (1..n - 1)
            .map(|i| [ring[origin], ring[(origin + i) % n], ring[(origin + i + 1) % n]])
            .collect(),
    )
}
