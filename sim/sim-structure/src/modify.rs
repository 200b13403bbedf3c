//! Re-applying joint settings to existing joints.

use crate::body::BodyId;
use crate::config::JointSettings;
use crate::error::StructureResult;
use crate::joint::ConstraintParams;
use crate::registry::JointRegistry;
use crate::scene::Scene;
use hashbrown::HashSet;
use tracing::debug;

/// Rewrite the constraint parameters of every live joint attached to
/// `bodies`, without touching anchors or geometry.
///
/// Volume-scaled thresholds use each joint's recorded overlap volume; mass
/// scaling uses the bodies' current masses (1.0 for bodies no longer in the
/// scene). Returns the number of joints updated.
///
/// # Errors
///
/// Returns [`StructureError::InvalidSettings`](crate::StructureError::InvalidSettings)
/// if `settings` fails validation.
///
/// # Example
///
/// ```
/// use sim_structure::{modify_joints, ConstraintKind, Joint, JointRegistry, JointSettings, MemoryScene};
/// use mesh_types::unit_cube;
/// use nalgebra::Point3;
///
/// let mut scene = MemoryScene::new();
/// let a = scene.add_body("a", unit_cube());
/// let b = scene.add_body("b", unit_cube());
///
/// let mut registry = JointRegistry::new();
/// let id = registry.insert(Joint::new("a-b", a, b, Point3::origin()))?;
///
/// let settings = JointSettings::default().with_kind(ConstraintKind::Ball);
/// assert_eq!(modify_joints(&mut registry, &scene, &[a], &settings)?, 1);
/// assert_eq!(registry.get(id).map(|j| j.params.kind), Some(ConstraintKind::Ball));
/// # Ok::<(), sim_structure::StructureError>(())
/// ```
pub fn modify_joints<S: Scene + ?Sized>(
    registry: &mut JointRegistry,
    scene: &S,
    bodies: &[BodyId],
    settings: &JointSettings,
) -> StructureResult<usize> {
    settings.validate()?;

    let mut seen = HashSet::new();
    let ids: Vec<_> = bodies
        .iter()
        .flat_map(|&body| registry.joints_of(body))
        .filter(|id| seen.insert(*id))
        .collect();

    let mass_of = |id: BodyId| scene.body(id).map_or(1.0, |b| b.mass);
    let mut updated = 0;
    for id in ids {
        let Some(joint) = registry.get_mut(id) else {
            continue;
        };
        joint.params = ConstraintParams::from_settings(
            settings,
            joint.overlap_volume,
            mass_of(joint.body_a),
            mass_of(joint.body_b),
        );
        updated += 1;
    }

    debug!(updated, "joint settings re-applied");
    Ok(updated)
}
