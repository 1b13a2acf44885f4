//! Skinning and collision demo
//!
//! Runs a three-bone arm animation on a logic thread and hands each finished
//! frame to the main thread through a single-slot channel. Afterwards it
//! scatters boxes with random placement and reports which ones touch.
//!
//! Usage: `skinning_demo [config.toml|config.ron]`

use std::thread;
use std::time::Duration;

use engine_core::animation::{
    frame_channel, AnimationClip, AnimationError, FramePublisher, FrameReceiver, JointMeshBinding, SkinnedMesh,
};
use engine_core::core::{Config, CoreConfig, CoreError};
use engine_core::foundation::logging;
use engine_core::foundation::math::{Quat, Transform, Vec3};
use engine_core::physics::{CollisionWorld, Ray};
use engine_core::scene::{GeometryError, TriMesh};
use rand::Rng;
use thiserror::Error;

const ARM_CLIP: &str = include_str!("../assets/arm.ron");

// Animation loop settings
const TICKS: usize = 240;
const TICK_SECONDS: f32 = 1.0 / 60.0;

// Box scatter settings
const NUM_BOXES: usize = 24;
const SCATTER_RADIUS: f32 = 6.0;
const BOX_HALF_SIZE: f32 = 0.75;

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("logic thread panicked")]
    LogicThread,
}

impl From<AnimationError> for DemoError {
    fn from(err: AnimationError) -> Self {
        Self::Core(err.into())
    }
}

impl From<GeometryError> for DemoError {
    fn from(err: GeometryError) -> Self {
        Self::Core(err.into())
    }
}

/// Axis-aligned box mesh centered on the origin
fn box_mesh(half: f32) -> Result<TriMesh, GeometryError> {
    let vertices = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { -half } else { half },
                if i & 2 == 0 { -half } else { half },
                if i & 4 == 0 { -half } else { half },
            )
        })
        .collect();
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    TriMesh::new(vertices, Vec::new(), indices)
}

/// Thin strip along +x split into three segments, one per bone
fn arm_mesh() -> Result<(TriMesh, Vec<i32>), GeometryError> {
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut joints = Vec::new();
    for i in 0..=6 {
        let x = i as f32 * 0.5;
        // Vertices at the joint seams follow the outer bone
        let joint = (i / 2).min(2) as i32;
        for y in [-0.1, 0.1] {
            vertices.push(Vec3::new(x, y, 0.0));
            normals.push(Vec3::z());
            joints.push(joint);
        }
    }
    let indices = (0..6u32)
        .flat_map(|i| {
            let a = 2 * i;
            [a, a + 2, a + 1, a + 1, a + 2, a + 3]
        })
        .collect();
    Ok((TriMesh::new(vertices, normals, indices)?.with_name("arm"), joints))
}

fn run_logic(config: CoreConfig, publisher: FramePublisher) -> Result<(), DemoError> {
    let clip = AnimationClip::from_ron_str(ARM_CLIP)?;
    log::info!("Loaded clip '{}' with {} joints", clip.name, clip.joints.len());

    let mut controller = clip.into_controller(&config.animation)?;
    let (mesh, joints) = arm_mesh()?;
    let binding = JointMeshBinding::from_import(&joints, &mesh)?;
    controller.add_skinned_mesh(SkinnedMesh::new(mesh.with_collision_config(config.collision), binding)?)?;
    controller.process()?;
    controller.play()?;

    for _ in 0..TICKS {
        controller.update(TICK_SECONDS)?;
        publisher.publish(controller.snapshot_frame());
        thread::sleep(Duration::from_millis(2));
    }

    let arm = controller.skinned_mesh_mut(0).map(SkinnedMesh::mesh_mut);
    if let Some(arm) = arm {
        let probe = Ray::new(Vec3::new(2.5, 0.0, 5.0), -Vec3::z());
        match arm.pick(&probe) {
            Some(hit) => log::info!("Probe ray hits arm triangle {} at distance {:.3}", hit.triangle, hit.distance),
            None => log::info!("Probe ray misses the arm in its final pose"),
        }
    }
    Ok(())
}

fn consume_frames(receiver: &FrameReceiver) -> usize {
    let mut received = 0;
    loop {
        let connected = receiver.is_connected();
        while let Some(frame) = receiver.take_latest() {
            received += 1;
            if received % 20 == 0 {
                let hand = frame
                    .meshes
                    .first()
                    .and_then(|m| m.positions.last())
                    .copied()
                    .unwrap_or_else(Vec3::zeros);
                log::info!(
                    "Frame {} at t = {:.3}: hand at ({:.2}, {:.2}, {:.2})",
                    frame.sequence,
                    frame.time,
                    hand.x,
                    hand.y,
                    hand.z
                );
            }
        }
        if !connected {
            return received;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn scatter_boxes(config: &CoreConfig) -> Result<(), DemoError> {
    let mut rng = rand::thread_rng();
    let mut world = CollisionWorld::new(config.collision);

    for i in 0..NUM_BOXES {
        let position = Vec3::new(
            rng.gen_range(-SCATTER_RADIUS..SCATTER_RADIUS),
            rng.gen_range(-SCATTER_RADIUS..SCATTER_RADIUS),
            rng.gen_range(-1.0..1.0),
        );
        let rotation = Quat::from_euler_angles(
            rng.gen_range(0.0..3.0),
            rng.gen_range(0.0..3.0),
            rng.gen_range(0.0..3.0),
        );
        let mut mesh = box_mesh(BOX_HALF_SIZE)?.with_name(format!("box_{i}"));
        mesh.set_world_transform(Transform::from_rotation_translation(rotation, position));
        world.insert(mesh);
    }

    let pairs = world.colliding_pairs();
    log::info!("{} boxes, {} touching pairs", world.len(), pairs.len());
    for pair in &pairs {
        let name = |id| world.get(id).map_or("?", TriMesh::name);
        log::info!(
            "  {} touches {} ({} triangle pairs)",
            name(pair.first),
            name(pair.second),
            pair.triangles.len()
        );
    }

    let down = Ray::new(Vec3::new(0.0, 0.0, 10.0), -Vec3::z());
    match world.ray_cast(&down) {
        Some(hit) => log::info!(
            "Downward ray hits {} at distance {:.3}",
            world.get(hit.mesh).map_or("?", TriMesh::name),
            hit.hit.distance
        ),
        None => log::info!("Downward ray hits nothing"),
    }
    Ok(())
}

fn main() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load_from_file(&path).map_err(CoreError::from)?,
        None => CoreConfig::default(),
    };
    config.validate().map_err(CoreError::from)?;
    logging::init_with_level(&config.engine.log_level);
    log::info!("Starting skinning demo (repeat mode {:?})", config.animation.repeat_mode);

    let (publisher, receiver) = frame_channel();
    let logic_config = config.clone();
    let logic = thread::spawn(move || run_logic(logic_config, publisher));

    let received = consume_frames(&receiver);
    logic.join().map_err(|_| DemoError::LogicThread)??;
    log::info!(
        "Consumed {} of {} frames ({} replaced before display)",
        received,
        TICKS,
        receiver.skipped_frames()
    );

    scatter_boxes(&config)
}
