//! Property tests for contact resolution and synthesis runs.
//!
//! Run with: cargo test -p sim-structure -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mesh_types::{Point3, Vector3, cuboid};
use proptest::prelude::*;
use sim_structure::{
    CancelToken, ContactMode, JointRegistry, JointSettings, MemoryScene, NullProgress,
    PointSource, StructureSettings, StructureSynthesizer,
};

/// Axis-aligned box on a quarter grid, so touching and shared faces are
/// common.
fn grid_box() -> impl Strategy<Value = ([f64; 3], [f64; 3])> {
    (
        prop::array::uniform3(0_i32..6),
        prop::array::uniform3(1_i32..5),
    )
        .prop_map(|(lo, size)| {
            let min = lo.map(|v| f64::from(v) * 0.25);
            let max = [
                min[0] + f64::from(size[0]) * 0.25,
                min[1] + f64::from(size[1]) * 0.25,
                min[2] + f64::from(size[2]) * 0.25,
            ];
            (min, max)
        })
}

/// Boxes are built around their own centre and placed with the body
/// transform, so origins differ per body.
fn scene_of(boxes: &[([f64; 3], [f64; 3])]) -> MemoryScene {
    let mut scene = MemoryScene::new();
    for (i, (min, max)) in boxes.iter().enumerate() {
        let center = Vector3::new(
            (min[0] + max[0]) / 2.0,
            (min[1] + max[1]) / 2.0,
            (min[2] + max[2]) / 2.0,
        );
        let half = Point3::from(Vector3::from(*max) - center);
        let id = scene.add_body(format!("box{i}"), cuboid(-half, half));
        scene.translate(id, center);
    }
    scene.select_all();
    scene
}

fn analytic_overlap(a: &([f64; 3], [f64; 3]), b: &([f64; 3], [f64; 3])) -> f64 {
    (0..3)
        .map(|i| (a.1[i].min(b.1[i]) - a.0[i].max(b.0[i])).max(0.0))
        .product()
}

fn joints(scene: &MemoryScene, settings: &StructureSettings) -> JointRegistry {
    let mut registry = JointRegistry::new();
    StructureSynthesizer::new(settings.clone(), JointSettings::default())
        .run(scene, &mut registry, &mut NullProgress, &CancelToken::new())
        .unwrap();
    registry
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn proptest_exact_volume_matches_boxes(a in grid_box(), b in grid_box()) {
        let registry = joints(&scene_of(&[a, b]), &StructureSettings::precise());
        let expected = analytic_overlap(&a, &b);

        if let Some(joint) = registry.iter().next() {
            prop_assert!(joint.overlap_volume > 0.0);
            prop_assert!((joint.overlap_volume - expected).abs() < 1e-9);
            prop_assert!(joint.anchor.iter().all(|c| c.is_finite()));
        } else {
            prop_assert!(expected < 1e-9);
        }
    }

    #[test]
    fn proptest_selection_order_does_not_change_pairs(
        boxes in prop::collection::vec(grid_box(), 2..5),
    ) {
        let mut scene = scene_of(&boxes);
        let settings = StructureSettings::default()
            .with_subdivision(0)
            .with_contact_mode(ContactMode::Nearest(PointSource::Vertices));

        let forward = joints(&scene, &settings);
        let mut reversed_ids: Vec<_> = scene.bodies().iter().map(|b| b.id).collect();
        reversed_ids.reverse();
        scene.select(reversed_ids);
        let backward = joints(&scene, &settings);

        let pairs = |r: &JointRegistry| {
            let mut p: Vec<_> = r
                .iter()
                .map(|j| (j.body_a.min(j.body_b), j.body_a.max(j.body_b), j.anchor))
                .collect();
            p.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
            p
        };
        let (f, b) = (pairs(&forward), pairs(&backward));
        prop_assert_eq!(f.len(), b.len());
        for (x, y) in f.iter().zip(&b) {
            prop_assert_eq!((x.0, x.1), (y.0, y.1));
            prop_assert!((x.2 - y.2).norm() < 1e-9);
        }
    }

    #[test]
    fn proptest_runs_are_deterministic(boxes in prop::collection::vec(grid_box(), 2..5)) {
        let scene = scene_of(&boxes);
        let settings = StructureSettings::default().with_subdivision(1);
        let first: Vec<_> = joints(&scene, &settings).iter().map(|j| (j.body_a, j.body_b, j.anchor)).collect();
        let second: Vec<_> = joints(&scene, &settings.with_parallel(true))
            .iter()
            .map(|j| (j.body_a, j.body_b, j.anchor))
            .collect();
        prop_assert_eq!(first, second);
    }
}
