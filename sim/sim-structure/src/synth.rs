//! Structure synthesis: joints for every overlapping pair of selected bodies.
//!
//! A run walks through these phases, each logged at debug level:
//!
//! 1. **Indexing** - snapshot and BVH per eligible body
//! 2. **Pairing** - existing-joint policy applied to the selection
//! 3. **Resolving** - overlap query and contact resolution per pair `i < j`
//! 4. **Reporting** - summary handed to the progress sink
//!
//! Nothing persists between runs except the joints written to the
//! [`JointRegistry`].

use crate::body::{Body, BodyId};
use crate::config::{ExistingPolicy, JointSettings, StructureSettings};
use crate::contact::{BooleanEngine, ContactOutcome, ContactResolver, ExactBoolean};
use crate::error::StructureResult;
use crate::index::SpatialIndex;
use crate::joint::{ConstraintParams, Joint, JointId};
use crate::progress::ProgressSink;
use crate::registry::JointRegistry;
use crate::scene::Scene;
use crate::snapshot::MeshSnapshot;
use hashbrown::HashSet;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared between a run and its caller.
///
/// Checked between outer iterations; a cancelled run keeps the joints it
/// already created.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stage of a synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No run in progress.
    Idle,
    /// Building snapshots and indices.
    Indexing,
    /// Applying the existing-joint policy.
    Pairing,
    /// Querying and resolving pairs.
    Resolving,
    /// Summarizing.
    Reporting,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Indexing => "indexing",
            Self::Pairing => "pairing",
            Self::Resolving => "resolving",
            Self::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Summary of a synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Joints created.
    pub created: usize,
    /// Pairs skipped because a joint already existed (`NewOnly`).
    pub already_existing: usize,
    /// Joints removed up front (`Overwrite`).
    pub removed: usize,
    /// Overlapping pairs whose contact turned out empty.
    pub skipped_no_contact: usize,
    /// Exact-volume pairs below the minimum volume.
    pub skipped_below_threshold: usize,
    /// Pairs skipped by engine errors or non-finite anchors.
    pub skipped_errors: usize,
    /// Selected bodies excluded from indexing.
    pub skipped_bodies: usize,
    /// Bodies that were indexed.
    pub indexed_bodies: usize,
    /// Pairs whose BVH query returned face pairs.
    pub overlapping_pairs: usize,
    /// The run stopped on a cancellation request.
    pub cancelled: bool,
    /// No rigid-body world or empty selection.
    pub nothing_to_do: bool,
    /// Ids of created joints, in creation order.
    pub joints: Vec<JointId>,
}

impl SynthesisReport {
    fn nothing_to_do() -> Self {
        Self {
            nothing_to_do: true,
            ..Self::default()
        }
    }

    /// Total pairs that overlapped but produced no joint.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_no_contact + self.skipped_below_threshold + self.skipped_errors
    }
}

impl std::fmt::Display for SynthesisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nothing_to_do {
            return f.write_str("nothing to do");
        }
        write!(
            f,
            "created {} joints ({} already existing, {} removed; skipped {} no contact, {} below threshold, {} errors)",
            self.created,
            self.already_existing,
            self.removed,
            self.skipped_no_contact,
            self.skipped_below_threshold,
            self.skipped_errors,
        )?;
        if self.cancelled {
            f.write_str(" [cancelled]")?;
        }
        Ok(())
    }
}

/// Result of one pair in the parallel stage.
enum PairTask {
    Existing,
    Disjoint,
    Resolved(ContactOutcome),
    Cancelled,
}

/// Creates joints between overlapping bodies.
///
/// # Example
///
/// ```
/// use sim_structure::{
///     CancelToken, JointRegistry, JointSettings, MemoryScene, NullProgress,
///     StructureSettings, StructureSynthesizer,
/// };
/// use mesh_types::{unit_cube, Vector3};
///
/// let mut scene = MemoryScene::new();
/// let a = scene.add_body("a", unit_cube());
/// let b = scene.add_body("b", unit_cube());
/// scene.translate(b, Vector3::new(0.9, 0.0, 0.0));
/// scene.select_all();
///
/// let synth = StructureSynthesizer::new(StructureSettings::precise(), JointSettings::default());
/// let mut registry = JointRegistry::new();
/// let report = synth.run(&scene, &mut registry, &mut NullProgress, &CancelToken::new())?;
///
/// assert_eq!(report.created, 1);
/// assert!(registry.exists(a, b));
/// # Ok::<(), sim_structure::StructureError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StructureSynthesizer<E: BooleanEngine = ExactBoolean> {
    settings: StructureSettings,
    joint_settings: JointSettings,
    engine: E,
}

impl StructureSynthesizer<ExactBoolean> {
    /// Create a synthesizer with the built-in boolean engine, configured by
    /// [`ExactBoolean::for_settings`].
    #[must_use]
    pub fn new(settings: StructureSettings, joint_settings: JointSettings) -> Self {
        let engine = ExactBoolean::for_settings(&settings);
        Self::with_engine(settings, joint_settings, engine)
    }
}

impl<E: BooleanEngine> StructureSynthesizer<E> {
    /// Create a synthesizer with a custom boolean engine.
    #[must_use]
    pub fn with_engine(settings: StructureSettings, joint_settings: JointSettings, engine: E) -> Self {
        Self {
            settings,
            joint_settings,
            engine,
        }
    }

    /// Run settings.
    #[must_use]
    pub fn settings(&self) -> &StructureSettings {
        &self.settings
    }

    /// Joint settings.
    #[must_use]
    pub fn joint_settings(&self) -> &JointSettings {
        &self.joint_settings
    }

    /// Synthesize joints for the scene's selection.
    ///
    /// Bodies are indexed in selection order; colliders, empty meshes and
    /// unknown ids are skipped. Each pair `i < j` is handled once according
    /// to the existing-joint policy, and progress `(i + 1) / N` is reported
    /// after each outer iteration.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::InvalidSettings`](crate::StructureError::InvalidSettings)
    /// if either settings struct fails validation. Per-pair failures are
    /// counted in the report instead.
    pub fn run<S: Scene + ?Sized>(
        &self,
        scene: &S,
        registry: &mut JointRegistry,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> StructureResult<SynthesisReport> {
        self.settings.validate()?;
        self.joint_settings.validate()?;

        let mut selection = scene.selected();
        let mut unique = HashSet::new();
        selection.retain(|id| unique.insert(*id));

        if !scene.has_rigid_body_world() || selection.is_empty() {
            warn!(
                rigid_body_world = scene.has_rigid_body_world(),
                selected = selection.len(),
                "structure run has nothing to do"
            );
            let report = SynthesisReport::nothing_to_do();
            progress.finished(&report);
            return Ok(report);
        }

        info!(
            selected = selection.len(),
            mode = ?self.settings.contact_mode,
            policy = ?self.settings.existing_policy,
            parallel = self.settings.parallel,
            "structure run started"
        );

        let mut report = SynthesisReport::default();

        enter(Phase::Indexing);
        let (bodies, indices) = self.index_bodies(scene, &selection, &mut report);
        report.indexed_bodies = indices.len();

        enter(Phase::Pairing);
        if self.settings.existing_policy == ExistingPolicy::Overwrite {
            for (i, &a) in selection.iter().enumerate() {
                for &b in &selection[i + 1..] {
                    report.removed += registry.remove(a, b);
                }
            }
            debug!(removed = report.removed, "existing joints removed");
        }

        enter(Phase::Resolving);
        if self.settings.parallel {
            self.resolve_parallel(&bodies, &indices, registry, progress, cancel, &mut report)?;
        } else {
            self.resolve_sequential(&bodies, &indices, registry, progress, cancel, &mut report)?;
        }

        enter(Phase::Reporting);
        info!(%report, "structure run complete");
        progress.finished(&report);
        enter(Phase::Idle);
        Ok(report)
    }

    fn index_bodies<'s, S: Scene + ?Sized>(
        &self,
        scene: &'s S,
        selection: &[BodyId],
        report: &mut SynthesisReport,
    ) -> (Vec<&'s Body>, Vec<SpatialIndex>) {
        let mut candidates = Vec::with_capacity(selection.len());
        for &id in selection {
            match scene.body(id) {
                None => {
                    warn!(body = %id, "selected body not found in scene");
                    report.skipped_bodies += 1;
                }
                Some(body) if body.is_collider => {
                    debug!(body = %id, name = %body.name, "skipping collider proxy");
                    report.skipped_bodies += 1;
                }
                Some(body) => candidates.push(body),
            }
        }

        let build = |body: &&'s Body| {
            MeshSnapshot::capture(body, &self.settings)
                .and_then(|snapshot| SpatialIndex::build(snapshot, self.settings.bvh_leaf_size))
        };
        let built: Vec<Option<SpatialIndex>> = if self.settings.parallel {
            candidates.par_iter().map(build).collect()
        } else {
            candidates.iter().map(build).collect()
        };

        let mut bodies = Vec::with_capacity(candidates.len());
        let mut indices = Vec::with_capacity(candidates.len());
        for (body, index) in candidates.into_iter().zip(built) {
            if let Some(index) = index {
                bodies.push(body);
                indices.push(index);
            } else {
                report.skipped_bodies += 1;
            }
        }
        (bodies, indices)
    }

    fn resolve_sequential(
        &self,
        bodies: &[&Body],
        indices: &[SpatialIndex],
        registry: &mut JointRegistry,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
        report: &mut SynthesisReport,
    ) -> StructureResult<()> {
        let resolver = ContactResolver::new(&self.settings, &self.engine);
        let n = indices.len();
        for i in 0..n {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!(row = i, "structure run cancelled");
                break;
            }
            for j in (i + 1)..n {
                if self.settings.existing_policy == ExistingPolicy::NewOnly
                    && registry.exists(bodies[i].id, bodies[j].id)
                {
                    report.already_existing += 1;
                    continue;
                }
                let pairs = indices[i].overlap(&indices[j]);
                if pairs.is_empty() {
                    continue;
                }
                report.overlapping_pairs += 1;
                let outcome = resolver.resolve(&indices[i], &indices[j], &pairs);
                self.commit(bodies[i], bodies[j], outcome, registry, report)?;
            }
            progress.progress((i + 1) as f64 / n as f64);
        }
        Ok(())
    }

    fn resolve_parallel(
        &self,
        bodies: &[&Body],
        indices: &[SpatialIndex],
        registry: &mut JointRegistry,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
        report: &mut SynthesisReport,
    ) -> StructureResult<()> {
        let n = indices.len();
        let tasks: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();

        let existing: HashSet<(usize, usize)> = if self.settings.existing_policy == ExistingPolicy::NewOnly {
            tasks
                .iter()
                .copied()
                .filter(|&(i, j)| registry.exists(bodies[i].id, bodies[j].id))
                .collect()
        } else {
            HashSet::new()
        };

        let resolver = ContactResolver::new(&self.settings, &self.engine);
        let results: Vec<PairTask> = tasks
            .par_iter()
            .map(|&(i, j)| {
                if existing.contains(&(i, j)) {
                    return PairTask::Existing;
                }
                if cancel.is_cancelled() {
                    return PairTask::Cancelled;
                }
                let pairs = indices[i].overlap(&indices[j]);
                if pairs.is_empty() {
                    PairTask::Disjoint
                } else {
                    PairTask::Resolved(resolver.resolve(&indices[i], &indices[j], &pairs))
                }
            })
            .collect();

        // Rows are committed whole or not at all.
        let mut results = tasks.iter().zip(results).peekable();
        for i in 0..n {
            let row: Vec<_> =
                std::iter::from_fn(|| results.next_if(|((r, _), _)| *r == i)).collect();
            if cancel.is_cancelled() || row.iter().any(|(_, task)| matches!(task, PairTask::Cancelled)) {
                report.cancelled = true;
                info!(row = i, "structure run cancelled");
                break;
            }
            for (&(_, j), task) in row {
                match task {
                    PairTask::Existing => report.already_existing += 1,
                    PairTask::Disjoint | PairTask::Cancelled => {}
                    PairTask::Resolved(outcome) => {
                        report.overlapping_pairs += 1;
                        self.commit(bodies[i], bodies[j], outcome, registry, report)?;
                    }
                }
            }
            progress.progress((i + 1) as f64 / n as f64);
        }
        Ok(())
    }

    fn commit(
        &self,
        a: &Body,
        b: &Body,
        outcome: ContactOutcome,
        registry: &mut JointRegistry,
        report: &mut SynthesisReport,
    ) -> StructureResult<()> {
        match outcome {
            ContactOutcome::Contact { anchor, volume } => {
                let params = ConstraintParams::from_settings(&self.joint_settings, volume, a.mass, b.mass);
                let joint = Joint::new(format!("{}-{}", a.name, b.name), a.id, b.id, anchor)
                    .with_params(params)
                    .with_overlap_volume(volume);
                let id = registry.insert(joint)?;
                debug!(joint = %id, a = %a.id, b = %b.id, volume, "joint created");
                report.created += 1;
                report.joints.push(id);
            }
            ContactOutcome::NoContact => {
                debug!(a = %a.id, b = %b.id, "overlap resolved to no contact");
                report.skipped_no_contact += 1;
            }
            ContactOutcome::BelowThreshold { volume } => {
                debug!(a = %a.id, b = %b.id, volume, "overlap volume below threshold");
                report.skipped_below_threshold += 1;
            }
            ContactOutcome::Skipped(reason) => {
                warn!(a = %a.id, b = %b.id, %reason, "pair skipped");
                report.skipped_errors += 1;
            }
        }
        Ok(())
    }
}

fn enter(phase: Phase) {
    debug!(%phase, "phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContactMode;
    use crate::progress::{FnProgress, NullProgress};
    use crate::scene::MemoryScene;
    use mesh_types::{IndexedMesh, Vector3, unit_cube};

    fn row_scene(offsets: &[f64]) -> (MemoryScene, Vec<BodyId>) {
        let mut scene = MemoryScene::new();
        let ids: Vec<BodyId> = offsets
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let id = scene.add_body(format!("cube{i}"), unit_cube());
                scene.translate(id, Vector3::new(x, 0.0, 0.0));
                id
            })
            .collect();
        scene.select_all();
        (scene, ids)
    }

    fn fast() -> StructureSynthesizer {
        StructureSynthesizer::new(StructureSettings::fast(), JointSettings::default())
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_nothing_to_do_without_world() {
        let (scene, _) = row_scene(&[0.0, 0.5]);
        let scene = scene.with_rigid_body_world(false);
        let mut registry = JointRegistry::new();
        let report = fast()
            .run(&scene, &mut registry, &mut NullProgress, &CancelToken::new())
            .unwrap();
        assert!(report.nothing_to_do);
        assert_eq!(report.to_string(), "nothing to do");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nothing_to_do_without_selection() {
        let (mut scene, _) = row_scene(&[0.0, 0.5]);
        scene.select([]);
        let report = fast()
            .run(&scene, &mut JointRegistry::new(), &mut NullProgress, &CancelToken::new())
            .unwrap();
        assert!(report.nothing_to_do);
    }

    #[test]
    fn test_invalid_settings_fail_up_front() {
        let (scene, _) = row_scene(&[0.0, 0.5]);
        let synth = StructureSynthesizer::new(
            StructureSettings::default().with_margin(f64::NAN),
            JointSettings::default(),
        );
        assert!(synth
            .run(&scene, &mut JointRegistry::new(), &mut NullProgress, &CancelToken::new())
            .is_err());
    }

    #[test]
    fn test_chain_creates_adjacent_joints() {
        let (scene, ids) = row_scene(&[0.0, 0.9, 1.8, 5.0]);
        let mut registry = JointRegistry::new();
        let report = fast()
            .run(&scene, &mut registry, &mut NullProgress, &CancelToken::new())
            .unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.indexed_bodies, 4);
        assert!(registry.exists(ids[0], ids[1]));
        assert!(registry.exists(ids[1], ids[2]));
        assert!(!registry.exists(ids[0], ids[2]));
        assert!(!registry.exists(ids[2], ids[3]));
    }

    #[test]
    fn test_progress_reported_per_row() {
        let (scene, _) = row_scene(&[0.0, 0.9, 1.8, 5.0]);
        let mut seen = Vec::new();
        fast()
            .run(
                &scene,
                &mut JointRegistry::new(),
                &mut FnProgress::new(|f| seen.push(f)),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(seen, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_cancelled_before_start_creates_nothing() {
        let (scene, _) = row_scene(&[0.0, 0.9]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut registry = JointRegistry::new();
        let report = fast().run(&scene, &mut registry, &mut NullProgress, &cancel).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.created, 0);
        assert!(report.to_string().ends_with("[cancelled]"));
    }

    struct CancellingEngine {
        inner: ExactBoolean,
        cancel: CancelToken,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl BooleanEngine for CancellingEngine {
        fn intersect(&self, a: &IndexedMesh, b: &IndexedMesh) -> Result<IndexedMesh, mesh_boolean::BooleanError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                self.cancel.cancel();
            }
            self.inner.intersect(a, b)
        }
    }

    #[test]
    fn test_parallel_cancel_commits_whole_rows_only() {
        let (scene, ids) = row_scene(&[0.0, 0.9, 1.8, 2.7, 3.6]);
        let cancel = CancelToken::new();
        let engine = CancellingEngine {
            inner: ExactBoolean::default(),
            cancel: cancel.clone(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let settings = StructureSettings::precise().with_subdivision(0).with_parallel(true);
        let synth = StructureSynthesizer::with_engine(settings, JointSettings::default(), engine);

        let mut registry = JointRegistry::new();
        let report = synth.run(&scene, &mut registry, &mut NullProgress, &cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.overlapping_pairs, report.created);
        for (row, pair) in ids.windows(2).enumerate() {
            assert_eq!(registry.exists(pair[0], pair[1]), row < report.created);
        }
    }

    #[test]
    fn test_colliders_and_empty_meshes_are_skipped() {
        let (mut scene, ids) = row_scene(&[0.0]);
        let empty = scene.add_body("empty", IndexedMesh::new());
        let proxy = scene.insert(
            crate::body::Body::new(BodyId::new(50), "proxy", unit_cube()).as_collider_of(ids[0]),
        );
        scene.select([ids[0], empty, proxy, BodyId::new(77)]);

        let mut registry = JointRegistry::new();
        let report = fast()
            .run(&scene, &mut registry, &mut NullProgress, &CancelToken::new())
            .unwrap();
        assert_eq!(report.indexed_bodies, 1);
        assert_eq!(report.skipped_bodies, 2);
        assert_eq!(report.created, 0);
        assert!(!report.nothing_to_do);
    }

    #[test]
    fn test_nearest_mode_joint_params() {
        let (mut scene, ids) = row_scene(&[0.0, 0.9]);
        if let Some(body) = scene.body_mut(ids[1]) {
            body.mass = 0.5;
        }
        let settings = StructureSettings::default()
            .with_subdivision(0)
            .with_contact_mode(ContactMode::Nearest(crate::config::PointSource::Vertices));
        let joints = JointSettings::default()
            .with_break_threshold(10.0)
            .with_scale_by_min_mass(true);
        let synth = StructureSynthesizer::new(settings, joints);

        let mut registry = JointRegistry::new();
        let report = synth
            .run(&scene, &mut registry, &mut NullProgress, &CancelToken::new())
            .unwrap();
        let joint = registry.get(report.joints[0]).unwrap();
        assert_eq!(joint.name, "cube0-cube1");
        assert!((joint.anchor.x - 0.95).abs() < 1e-12);
        assert!((joint.params.breaking_threshold - 5.0).abs() < 1e-12);
        assert!((joint.overlap_volume - 1.0).abs() < 1e-12);
    }
}
