//! Rigid bodies as seen by structure synthesis.
//!
//! A [`Body`] is a mesh with a world placement and a mass. Bodies are
//! addressed by stable [`BodyId`] handles so joints and registries never hold
//! references into the scene.

use mesh_types::{IndexedMesh, Matrix4, MeshTopology, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a rigid body in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for BodyId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// A rigid body with local mesh geometry and a world transform.
///
/// # Example
///
/// ```
/// use sim_structure::{Body, BodyId};
/// use mesh_types::{unit_cube, Vector3};
///
/// let body = Body::new(BodyId::new(1), "Brick", unit_cube())
///     .with_translation(Vector3::new(2.0, 0.0, 0.0))
///     .with_mass(3.5);
///
/// assert_eq!(body.origin().x, 2.0);
/// assert!(!body.is_collider);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    /// Stable handle.
    pub id: BodyId,
    /// Display name.
    pub name: String,
    /// Geometry in local coordinates.
    pub mesh: IndexedMesh,
    /// Local-to-world transform.
    pub world: Matrix4<f64>,
    /// Collider proxies never act as overlap sources.
    pub is_collider: bool,
    /// Rigid-body mass.
    pub mass: f64,
    /// The body a collider proxy or edge segment was generated from.
    pub parent: Option<BodyId>,
    /// Passive bodies are simulated as fixed and are ignored by collider
    /// checks.
    pub passive: bool,
}

impl Body {
    /// Create a body at the origin with unit mass.
    #[must_use]
    pub fn new(id: BodyId, name: impl Into<String>, mesh: IndexedMesh) -> Self {
        Self {
            id,
            name: name.into(),
            mesh,
            world: Matrix4::identity(),
            is_collider: false,
            mass: 1.0,
            parent: None,
            passive: false,
        }
    }

    /// Set the world transform.
    #[must_use]
    pub fn with_world(mut self, world: Matrix4<f64>) -> Self {
        self.world = world;
        self
    }

    /// Place the body with a pure translation.
    #[must_use]
    pub fn with_translation(mut self, offset: Vector3<f64>) -> Self {
        self.world = Matrix4::new_translation(&offset);
        self
    }

    /// Set the mass.
    #[must_use]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Mark the body passive or active.
    #[must_use]
    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    /// Record the body this one was generated from.
    #[must_use]
    pub fn with_parent(mut self, parent: BodyId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Mark this body as a collider proxy for `parent`.
    #[must_use]
    pub fn as_collider_of(mut self, parent: BodyId) -> Self {
        self.is_collider = true;
        self.parent = Some(parent);
        self
    }

    /// World-space position of the local origin.
    #[must_use]
    pub fn origin(&self) -> Point3<f64> {
        self.world.transform_point(&Point3::origin())
    }

    /// The mesh transformed into world space.
    #[must_use]
    pub fn world_mesh(&self) -> IndexedMesh {
        self.mesh.transformed(&self.world)
    }

    /// Whether this body can take part in overlap detection.
    #[must_use]
    pub fn is_overlap_source(&self) -> bool {
        !self.is_collider && !self.mesh.is_empty()
    }
}
