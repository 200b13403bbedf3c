//! Live joint collection with per-body back-references.
//!
//! The registry owns every [`Joint`] and keeps, for each body, the ordered
//! list of joint ids that reference it. Records can disappear without the
//! lists being updated (see [`JointRegistry::discard`]); stale ids are
//! pruned the next time a body's list is read.

use crate::body::BodyId;
use crate::error::{StructureError, StructureResult};
use crate::joint::{Joint, JointId};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Joint store and back-reference index.
///
/// # Example
///
/// ```
/// use sim_structure::{BodyId, Joint, JointRegistry};
/// use nalgebra::Point3;
///
/// let (a, b) = (BodyId::new(1), BodyId::new(2));
/// let mut registry = JointRegistry::new();
/// let id = registry.insert(Joint::new("a-b", a, b, Point3::origin()))?;
///
/// assert!(registry.exists(a, b));
/// assert_eq!(registry.joints_of(b), vec![id]);
/// assert_eq!(registry.remove(a, b), 1);
/// assert_eq!(registry.remove(a, b), 0);
/// # Ok::<(), sim_structure::StructureError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct JointRegistry {
    joints: BTreeMap<JointId, Joint>,
    by_body: HashMap<BodyId, SmallVec<[JointId; 4]>>,
    next_id: u64,
}

impl JointRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live joints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether there are no live joints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Look up a joint.
    #[must_use]
    pub fn get(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(&id)
    }

    /// Look up a joint mutably.
    pub fn get_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        self.joints.get_mut(&id)
    }

    /// Iterate live joints in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.values()
    }

    /// Joint ids referencing `body`, with stale references pruned.
    pub fn joints_of(&mut self, body: BodyId) -> Vec<JointId> {
        let Some(ids) = self.by_body.get_mut(&body) else {
            return Vec::new();
        };
        let joints = &self.joints;
        ids.retain(|id| joints.get(id).is_some_and(|j| j.involves(body)));
        let live = ids.to_vec();
        if ids.is_empty() {
            self.by_body.remove(&body);
        }
        live
    }

    /// Ids of joints connecting `a` and `b`.
    pub fn joints_between(&mut self, a: BodyId, b: BodyId) -> Vec<JointId> {
        self.joints_of(a)
            .into_iter()
            .filter(|id| self.joints.get(id).is_some_and(|j| j.connects(a, b)))
            .collect()
    }

    /// Whether any joint connects `a` and `b`.
    pub fn exists(&mut self, a: BodyId, b: BodyId) -> bool {
        !self.joints_between(a, b).is_empty()
    }

    /// Delete every joint between `a` and `b`. Returns how many were removed;
    /// a second call returns 0.
    pub fn remove(&mut self, a: BodyId, b: BodyId) -> usize {
        let ids = self.joints_between(a, b);
        for id in &ids {
            self.joints.remove(id);
            self.unregister(*id, a);
            self.unregister(*id, b);
        }
        ids.len()
    }

    /// Record `id` on both bodies' reference lists. Ids already present on a
    /// body are not added twice.
    pub fn register(&mut self, id: JointId, a: BodyId, b: BodyId) {
        for body in [a, b] {
            let ids = self.by_body.entry(body).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    /// Store a joint under a fresh id and register it on both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::SelfJoint`] if both endpoints are the same
    /// body.
    pub fn insert(&mut self, mut joint: Joint) -> StructureResult<JointId> {
        if joint.body_a == joint.body_b {
            return Err(StructureError::SelfJoint(joint.body_a.raw()));
        }
        let id = JointId::new(self.next_id);
        self.next_id += 1;

        joint.id = id;
        let (a, b) = (joint.body_a, joint.body_b);
        self.joints.insert(id, joint);
        self.register(id, a, b);
        Ok(id)
    }

    /// Delete a record without touching back-references.
    ///
    /// Models a host deleting the joint object directly; the dangling ids
    /// are dropped on the next [`joints_of`](Self::joints_of).
    pub fn discard(&mut self, id: JointId) -> Option<Joint> {
        self.joints.remove(&id)
    }

    /// Number of references stored for `body`, including stale ones.
    #[must_use]
    pub fn reference_count(&self, body: BodyId) -> usize {
        self.by_body.get(&body).map_or(0, SmallVec::len)
    }

    fn unregister(&mut self, id: JointId, body: BodyId) {
        if let Some(ids) = self.by_body.get_mut(&body) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_body.remove(&body);
            }
        }
    }
}
