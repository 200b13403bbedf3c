//! Vertex welding and result cleanup.

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, Point3};

/// Merge vertices closer than `epsilon` using a spatial hash.
///
/// Faces are remapped to the surviving vertices, faces that collapse
/// (two equal indices) are removed, and vertices no longer referenced are
/// dropped. Returns the number of vertices merged.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_boolean::weld::weld_vertices;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0001, 0.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([0, 3, 2]);
///
/// assert_eq!(weld_vertices(&mut mesh, 0.001), 1);
/// assert_eq!(mesh.vertices.len(), 3);
/// ```
pub fn weld_vertices(mesh: &mut IndexedMesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() || epsilon <= 0.0 {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(&vertex.position, cell_size))
            .or_default()
            .push(idx as u32);
    }

    let mut remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if remap[idx as usize] != idx {
            continue;
        }
        let cell = pos_to_cell(&vertex.position, cell_size);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other as usize] != other {
                            continue;
                        }
                        let other_pos = &mesh.vertices[other as usize].position;
                        if (vertex.position - other_pos).norm() < epsilon {
                            remap[other as usize] = idx;
                            merged += 1;
                        }
                    }
                }
            }
        }
    }

    if merged > 0 {
        for face in &mut mesh.faces {
            for i in face.iter_mut() {
                *i = remap[*i as usize];
            }
        }
        mesh.faces
            .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);
    }
    remove_unreferenced_vertices(mesh);

    merged
}

/// Drop vertices not referenced by any face, compacting indices.
pub fn remove_unreferenced_vertices(mesh: &mut IndexedMesh) {
    let mut referenced = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &i in face {
            if let Some(r) = referenced.get_mut(i as usize) {
                *r = true;
            }
        }
    }
    if referenced.iter().all(|&r| r) {
        return;
    }

    let mut new_index = vec![u32::MAX; mesh.vertices.len()];
    let mut kept = Vec::with_capacity(mesh.vertices.len());
    for (old, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old] {
            new_index[old] = kept.len() as u32;
            kept.push(*vertex);
        }
    }

    mesh.faces
        .retain(|f| f.iter().all(|&i| (i as usize) < new_index.len()));
    for face in &mut mesh.faces {
        for i in face.iter_mut() {
            *i = new_index[*i as usize];
        }
    }
    mesh.vertices = kept;
}

fn pos_to_cell(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{Vertex, unit_cube};

    #[test]
    fn test_weld_triangle_soup_cube() {
        let cube = unit_cube();
        let mut soup = IndexedMesh::new();
        for &[a, b, c] in &cube.faces {
            let base = soup.vertices.len() as u32;
            soup.vertices.push(cube.vertices[a as usize]);
            soup.vertices.push(cube.vertices[b as usize]);
            soup.vertices.push(cube.vertices[c as usize]);
            soup.faces.push([base, base + 1, base + 2]);
        }
        assert_eq!(soup.vertices.len(), 36);

        let merged = weld_vertices(&mut soup, 1e-9);
        assert_eq!(merged, 28);
        assert_eq!(soup.vertices.len(), 8);
        assert_eq!(soup.faces.len(), 12);
        assert!((soup.signed_volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weld_removes_collapsed_faces() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1e-6, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);

        weld_vertices(&mut mesh, 1e-3);
        assert!(mesh.faces.is_empty());
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn test_remove_unreferenced() {
        let mut mesh = unit_cube();
        mesh.vertices.push(Vertex::from_coords(9.0, 9.0, 9.0));
        remove_unreferenced_vertices(&mut mesh);
        assert_eq!(mesh.vertices.len(), 8);
    }
}
