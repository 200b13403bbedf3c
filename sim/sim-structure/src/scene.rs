//! Scene access for structure synthesis.
//!
//! The synthesizer only needs read access to bodies and the current
//! selection, so hosts implement [`Scene`] over whatever they store.
//! [`MemoryScene`] is a self-contained implementation for tools and tests.

use crate::body::{Body, BodyId};
use hashbrown::HashMap;
use mesh_types::IndexedMesh;

/// Read-only view of a scene.
pub trait Scene {
    /// Whether the scene has a rigid-body world to attach joints to.
    fn has_rigid_body_world(&self) -> bool;

    /// Selected bodies in selection order. Index order in a run follows this.
    fn selected(&self) -> Vec<BodyId>;

    /// Look up a body.
    fn body(&self, id: BodyId) -> Option<&Body>;
}

/// Scene stored in memory.
///
/// # Example
///
/// ```
/// use sim_structure::{MemoryScene, Scene};
/// use mesh_types::{unit_cube, Vector3};
///
/// let mut scene = MemoryScene::new();
/// let a = scene.add_body("a", unit_cube());
/// let b = scene.add_body("b", unit_cube());
/// scene.translate(b, Vector3::new(0.5, 0.0, 0.0));
/// scene.select_all();
///
/// assert_eq!(scene.selected(), vec![a, b]);
/// assert!(scene.has_rigid_body_world());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryScene {
    bodies: Vec<Body>,
    lookup: HashMap<BodyId, usize>,
    selection: Vec<BodyId>,
    rigid_body_world: bool,
    next_id: u64,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    /// Create an empty scene with a rigid-body world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            lookup: HashMap::new(),
            selection: Vec::new(),
            rigid_body_world: true,
            next_id: 0,
        }
    }

    /// Enable or disable the rigid-body world.
    #[must_use]
    pub fn with_rigid_body_world(mut self, enabled: bool) -> Self {
        self.rigid_body_world = enabled;
        self
    }

    /// Add a body at the origin under a fresh id.
    pub fn add_body(&mut self, name: impl Into<String>, mesh: IndexedMesh) -> BodyId {
        let id = BodyId::new(self.next_id);
        self.insert(Body::new(id, name, mesh));
        id
    }

    /// Insert a prepared body, replacing any body with the same id.
    pub fn insert(&mut self, body: Body) -> BodyId {
        let id = body.id;
        self.next_id = self.next_id.max(id.raw() + 1);
        if let Some(&slot) = self.lookup.get(&id) {
            self.bodies[slot] = body;
        } else {
            self.lookup.insert(id, self.bodies.len());
            self.bodies.push(body);
        }
        id
    }

    /// Remove a body, dropping it from the selection.
    pub fn remove(&mut self, id: BodyId) -> Option<Body> {
        let slot = self.lookup.remove(&id)?;
        let body = self.bodies.remove(slot);
        for index in self.lookup.values_mut() {
            if *index > slot {
                *index -= 1;
            }
        }
        self.selection.retain(|other| *other != id);
        Some(body)
    }

    /// Id the next [`add_body`](Self::add_body) call will use.
    #[must_use]
    pub fn next_body_id(&self) -> BodyId {
        BodyId::new(self.next_id)
    }

    /// Mutable access to a body.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        let slot = *self.lookup.get(&id)?;
        self.bodies.get_mut(slot)
    }

    /// Translate a body's world transform.
    pub fn translate(&mut self, id: BodyId, offset: nalgebra::Vector3<f64>) {
        if let Some(body) = self.body_mut(id) {
            body.world = nalgebra::Matrix4::new_translation(&offset) * body.world;
        }
    }

    /// All bodies in insertion order.
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Replace the selection. Unknown and repeated ids are dropped.
    pub fn select(&mut self, ids: impl IntoIterator<Item = BodyId>) {
        self.selection.clear();
        for id in ids {
            if self.lookup.contains_key(&id) && !self.selection.contains(&id) {
                self.selection.push(id);
            }
        }
    }

    /// Select every body in insertion order.
    pub fn select_all(&mut self) {
        self.selection = self.bodies.iter().map(|b| b.id).collect();
    }
}

impl Scene for MemoryScene {
    fn has_rigid_body_world(&self) -> bool {
        self.rigid_body_world
    }

    fn selected(&self) -> Vec<BodyId> {
        self.selection.clone()
    }

    fn body(&self, id: BodyId) -> Option<&Body> {
        self.lookup.get(&id).and_then(|&slot| self.bodies.get(slot))
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use mesh_types::unit_cube;

    #[test]
    fn test_ids_are_unique() {
        let mut scene = MemoryScene::new();
        let a = scene.add_body("a", unit_cube());
        scene.insert(Body::new(BodyId::new(10), "manual", unit_cube()));
        let b = scene.add_body("b", unit_cube());
        assert_eq!(a, BodyId::new(0));
        assert_eq!(b, BodyId::new(11));
        assert_eq!(scene.bodies().len(), 3);
    }

    #[test]
    fn test_select_filters_unknown_and_repeats() {
        let mut scene = MemoryScene::new();
        let a = scene.add_body("a", unit_cube());
        let b = scene.add_body("b", unit_cube());
        scene.select([b, BodyId::new(99), a, b]);
        assert_eq!(scene.selected(), vec![b, a]);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut scene = MemoryScene::new();
        let a = scene.add_body("a", unit_cube());
        scene.insert(Body::new(a, "renamed", unit_cube()).with_mass(2.0));
        assert_eq!(scene.bodies().len(), 1);
        assert_eq!(scene.body(a).map(|b| b.mass), Some(2.0));
    }

    #[test]
    fn test_remove_keeps_lookup_consistent() {
        let mut scene = MemoryScene::new();
        let a = scene.add_body("a", unit_cube());
        let b = scene.add_body("b", unit_cube());
        let c = scene.add_body("c", unit_cube());
        scene.select_all();

        assert_eq!(scene.remove(b).map(|body| body.name), Some("b".to_string()));
        assert!(scene.remove(b).is_none());
        assert_eq!(scene.body(c).map(|body| body.name.as_str()), Some("c"));
        assert_eq!(scene.selected(), vec![a, c]);
        assert_eq!(scene.next_body_id(), BodyId::new(3));
    }

    #[test]
    fn test_translate_moves_origin() {
        let mut scene = MemoryScene::new();
        let a = scene.add_body("a", unit_cube());
        scene.translate(a, nalgebra::Vector3::new(0.0, 2.0, 0.0));
        scene.translate(a, nalgebra::Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(scene.body(a).map(Body::origin), Some(nalgebra::Point3::new(1.0, 2.0, 0.0)));
    }
}
